use dental_assist::BotConfig;
use dental_assist::storage::DEFAULT_QUOTA_BYTES;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Which conversational runtime the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotBackend {
    /// Amazon Lex through the default AWS credential chain.
    Lex,
    /// Canned in-process replies, for running without AWS access.
    Offline,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub bot: BotConfig,
    pub backend: BotBackend,
    /// JSON file backing the store; in-memory when unset.
    pub store_path: Option<PathBuf>,
    pub store_quota_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bot: BotConfig::default(),
            backend: BotBackend::Lex,
            store_path: None,
            store_quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %value, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let backend = match get("BOT_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("lex") => BotBackend::Lex,
            Some("offline") | Some("scripted") => BotBackend::Offline,
            Some(other) => {
                warn!(backend = %other, "Unknown BOT_BACKEND, using lex");
                BotBackend::Lex
            }
        };

        Self {
            port: parse_or("PORT", get("PORT"), defaults.port),
            bot: BotConfig {
                bot_name: get("LEX_BOT_NAME").unwrap_or(defaults.bot.bot_name),
                bot_alias: get("LEX_BOT_ALIAS").unwrap_or(defaults.bot.bot_alias),
                region: get("AWS_REGION").unwrap_or(defaults.bot.region),
                user_id: get("LEX_USER_ID"),
            },
            backend,
            store_path: get("STORE_PATH").map(PathBuf::from),
            store_quota_bytes: parse_or(
                "STORE_QUOTA_BYTES",
                get("STORE_QUOTA_BYTES"),
                defaults.store_quota_bytes,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.bot.bot_name, "IAmigosBot");
        assert_eq!(config.bot.bot_alias, "Prod");
        assert_eq!(config.bot.region, "us-east-1");
        assert_eq!(config.backend, BotBackend::Lex);
        assert!(config.store_path.is_none());
        assert_eq!(config.store_quota_bytes, DEFAULT_QUOTA_BYTES);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("LEX_BOT_NAME", "OutroBot"),
            ("AWS_REGION", "sa-east-1"),
            ("BOT_BACKEND", "Offline"),
            ("STORE_PATH", "/tmp/iamigos.json"),
            ("STORE_QUOTA_BYTES", "1024"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.bot.bot_name, "OutroBot");
        assert_eq!(config.bot.region, "sa-east-1");
        assert_eq!(config.backend, BotBackend::Offline);
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/iamigos.json")));
        assert_eq!(config.store_quota_bytes, 1024);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = config(&[("PORT", "porta"), ("STORE_QUOTA_BYTES", "")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.store_quota_bytes, DEFAULT_QUOTA_BYTES);
    }
}
