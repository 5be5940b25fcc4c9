//! Display helpers for values shown to the patient (pt-BR conventions).

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Format `value` as Brazilian reais, e.g. `R$ 1.234,56`.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let (units, fraction) = (cents / 100, cents % 100);

    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}R$ {grouped},{fraction:02}")
}

/// `dd/mm/yyyy`
pub fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%d/%m/%Y").to_string()
}

/// Keep `visible` characters at each end and hide the middle. Short inputs
/// are returned unchanged.
pub fn mask_sensitive_text(text: &str, visible: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= visible * 2 {
        return text.to_string();
    }
    let first: String = chars[..visible].iter().collect();
    let last: String = chars[chars.len() - visible..].iter().collect();
    format!("{first}***{last}")
}

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("valid regex"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(.*?)_").expect("valid regex"));
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.*?)`").expect("valid regex"));

/// Turn the bot's lightweight markup (`*bold*`, `_italic_`, `` `code` ``,
/// newlines) into HTML. The text is escaped first.
pub fn format_message(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>");
    let html = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    let html = ITALIC.replace_all(&html, "<em>$1</em>");
    CODE.replace_all(&html, "<code>$1</code>").into_owned()
}

/// Human-readable size with up to two decimals, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn currency() {
        assert_eq!(format_currency(0.0), "R$ 0,00");
        assert_eq!(format_currency(150.5), "R$ 150,50");
        assert_eq!(format_currency(1234.56), "R$ 1.234,56");
        assert_eq!(format_currency(1_000_000.0), "R$ 1.000.000,00");
        assert_eq!(format_currency(-12.3), "-R$ 12,30");
    }

    #[test]
    fn date() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 15, 0, 0).unwrap();
        assert_eq!(format_date(&ts), "07/03/2024");
    }

    #[test]
    fn masking() {
        assert_eq!(mask_sensitive_text("short", 4), "short");
        assert_eq!(mask_sensitive_text("52998224725", 4), "5299***4725");
        assert_eq!(mask_sensitive_text("dor no dente", 4), "dor ***ente");
    }

    #[test]
    fn message_markup() {
        assert_eq!(
            format_message("*Urgente*\n_hoje_ `A1`"),
            "<strong>Urgente</strong><br><em>hoje</em> <code>A1</code>"
        );
        assert_eq!(format_message("<b>"), "&lt;b&gt;");
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }
}
