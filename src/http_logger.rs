//! HTTP exchange logger for the vector store client
//!
//! Appends every request/response pair to `http_requests.log` in the data
//! directory when `CONTEXT_INDEX_HTTP_LOG` is set to `1`, `true`, `yes` or `on`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use tracing::warn;

use crate::utils::data_dir::get_data_dir;

/// Environment variable to control HTTP logging
pub const ENV_HTTP_LOG: &str = "CONTEXT_INDEX_HTTP_LOG";

/// Log file name
const LOG_FILE_NAME: &str = "http_requests.log";

/// Maximum body size to log (10KB)
const MAX_BODY_SIZE: usize = 10_000;

/// Headers whose values are masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Serializes appends from concurrent uploads
static LOG_MUTEX: Mutex<()> = Mutex::new(());

/// Parse an environment flag value
pub fn flag_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Check if HTTP logging is enabled (read once per process)
pub fn is_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(ENV_HTTP_LOG)
            .map(|v| flag_enabled(&v))
            .unwrap_or(false)
    })
}

/// One logged request and its outcome
pub struct HttpExchange<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub headers: Vec<(String, String)>,
    pub request_body: Option<&'a str>,
    pub status: Option<u16>,
    pub response_body: Option<&'a str>,
    pub duration_ms: u64,
    pub error: Option<&'a str>,
}

/// Log an exchange if logging is enabled
pub fn log_exchange(exchange: &HttpExchange<'_>) {
    if !is_enabled() {
        return;
    }
    let path = get_data_dir().join(LOG_FILE_NAME);
    if let Err(e) = write_log(&path, &format_exchange(exchange)) {
        warn!("Failed to write HTTP log: {}", e);
    }
}

/// Render an exchange as a log block
pub fn format_exchange(exchange: &HttpExchange<'_>) -> String {
    let separator = "=".repeat(80);
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

    let mut out = format!(
        "\n{}\n[{}] {} {} ({}ms)\n{}\n",
        separator, timestamp, exchange.method, exchange.url, exchange.duration_ms, separator
    );

    out.push_str("\n--- Request Headers ---\n");
    for (name, value) in &exchange.headers {
        out.push_str(&format!("{}: {}\n", name, mask_sensitive_header(name, value)));
    }

    if let Some(body) = exchange.request_body {
        out.push_str("\n--- Request Body ---\n");
        out.push_str(&format_body(body));
        out.push('\n');
    }

    if let Some(status) = exchange.status {
        out.push_str(&format!("\n--- Response ---\nStatus: {}\n", status));
        if let Some(body) = exchange.response_body {
            out.push_str(&format_body(body));
            out.push('\n');
        }
    }

    if let Some(err) = exchange.error {
        out.push_str("\n--- Error ---\n");
        out.push_str(err);
        out.push('\n');
    }

    out
}

fn write_log(path: &Path, content: &str) -> std::io::Result<()> {
    let _guard = LOG_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(PathBuf::from(path))?;
    file.write_all(content.as_bytes())
}

pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_lowercase();
    SENSITIVE_HEADERS.iter().any(|h| name == *h)
}

fn mask_sensitive_header(name: &str, value: &str) -> String {
    if is_sensitive_header(name) {
        mask_token(value)
    } else {
        value.to_string()
    }
}

/// Keep the first and last four characters of a secret
pub fn mask_token(value: &str) -> String {
    let (prefix, secret) = match value.strip_prefix("Bearer ") {
        Some(token) => ("Bearer ", token),
        None => ("", value),
    };
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}...{}", prefix, head, tail)
    } else {
        format!("{}****", prefix)
    }
}

fn format_body(body: &str) -> String {
    let pretty = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| body.to_string());
    truncate_utf8_safe(&pretty, MAX_BODY_SIZE)
}

/// Truncate at a UTF-8 character boundary
pub fn truncate_utf8_safe(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...\n[truncated, total {} bytes]", &s[..end], s.len())
}
