use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::parse_bool;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "nutriscan.logs.jsonl";

fn observability_enabled(lookup: &impl Fn(&str) -> Option<String>) -> bool {
    for key in ["NUTRISCAN_OBSERVABILITY_ENABLED", "NUTRISCAN_OBSERVABILITY"] {
        if let Some(value) = lookup(key) {
            return parse_bool(&value).unwrap_or(true);
        }
    }
    true
}

fn resolve_env_filter(lookup: &impl Fn(&str) -> Option<String>) -> tracing_subscriber::EnvFilter {
    if let Some(level) = lookup("NUTRISCAN_LOG_LEVEL")
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Splits a JSON log path into the directory and file name for the appender.
fn log_file_target(path_raw: &str) -> (std::path::PathBuf, String) {
    let path = std::path::PathBuf::from(path_raw);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| std::path::PathBuf::from("."), std::path::Path::to_path_buf);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `NUTRISCAN_OBSERVABILITY_ENABLED` / `NUTRISCAN_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `NUTRISCAN_LOG_LEVEL`: optional level/filter override (`info`, `nutriscan_stream=debug`, etc.).
/// - `NUTRISCAN_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, logs are emitted to stderr in a compact console format.
/// - `RUST_LOG`: optional filter override.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let lookup = |key: &str| std::env::var(key).ok();
        if !observability_enabled(&lookup) {
            return;
        }

        let env_filter = resolve_env_filter(&lookup);
        if let Some(path_raw) = lookup("NUTRISCAN_JSON_LOG_PATH") {
            let (dir, file_name) = log_file_target(&path_raw);
            let _ = std::fs::create_dir_all(&dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
