use anyhow::Context;
use dental_assist::{
    AwsLexRuntime, BotRuntime, InMemoryKeyValueStore, JsonFileStore, KeyValueStore, LocalStorage,
    ScriptedRuntime,
};
use dental_assist_service::{AppState, BotBackend, ServiceConfig, build_router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "dental_assist_service=debug,dental_assist=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env();

    let file_store = match &config.store_path {
        Some(path) => {
            info!(path = %path.display(), quota = config.store_quota_bytes, "Using JSON file store");
            Some(Arc::new(
                JsonFileStore::open(path, Some(config.store_quota_bytes)).await,
            ))
        }
        None => {
            info!("Using in-memory store (set STORE_PATH to persist)");
            None
        }
    };
    let backend: Arc<dyn KeyValueStore> = match &file_store {
        Some(store) => store.clone(),
        None => Arc::new(InMemoryKeyValueStore::with_quota(config.store_quota_bytes)),
    };
    let storage = LocalStorage::new(backend);

    let runtime: Arc<dyn BotRuntime> = match config.backend {
        BotBackend::Lex => Arc::new(AwsLexRuntime::from_env(&config.bot.region).await),
        BotBackend::Offline => {
            info!("Using offline bot runtime");
            Arc::new(ScriptedRuntime::new())
        }
    };

    let state = AppState::new(config.bot.clone(), storage, runtime).await;
    let app = build_router(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    let addr = listener.local_addr()?;

    info!(
        %addr,
        bot = %config.bot.bot_name,
        alias = %config.bot.bot_alias,
        "Dental assistant service starting"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(store) = file_store {
        store
            .flush()
            .await
            .with_context(|| format!("failed to flush {}", store.path().display()))?;
        info!("Store flushed");
    }

    Ok(())
}
