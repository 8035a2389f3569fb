//! Logging configuration for threadrag

use std::path::Path;

use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::AppConfig;
use crate::Result;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "threadrag.log";

/// Initialize logging with the level and backtrace setting from configuration
pub fn init_logging_with_config(config: &AppConfig) -> Result<()> {
    apply_backtrace_setting(config);
    init_logging_with_level(&config.logging.level)
}

/// Export `RUST_BACKTRACE=1` when `logging.backtrace` is on.
///
/// Call before threads that read the environment are started.
pub fn apply_backtrace_setting(config: &AppConfig) {
    let current = std::env::var("RUST_BACKTRACE").ok();
    if let Some(value) = backtrace_env_value(config.logging.backtrace, current.as_deref()) {
        std::env::set_var("RUST_BACKTRACE", value);
    }
}

/// An explicit `RUST_BACKTRACE` from the environment is never overridden
fn backtrace_env_value(enabled: bool, current: Option<&str>) -> Option<&'static str> {
    (enabled && current.is_none()).then_some("1")
}

/// Initialize console + daily rolling file logging at the given level.
///
/// `RUST_LOG` still wins when it is set.
pub fn init_logging_with_level(level: &str) -> Result<()> {
    let logs_dir = Path::new(LOG_DIR);
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},threadrag={level}")));

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_ansi(false);

    // try_init: a second initialization (tests, embedded use) is not an error
    let _ = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    tracing::info!("Logging initialized with level: {level}");
    tracing::debug!("Log files are written to {LOG_DIR}/{LOG_FILE}.YYYY-MM-DD");

    // The writer must outlive every subscriber call for the whole process.
    std::mem::forget(guard);

    Ok(())
}

/// Initialize simple console logging for tests
pub fn init_simple_logging() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtrace_env_value() {
        assert_eq!(backtrace_env_value(true, None), Some("1"));
        assert_eq!(backtrace_env_value(true, Some("0")), None);
        assert_eq!(backtrace_env_value(false, None), None);
    }

    #[test]
    fn test_simple_logging_is_idempotent() {
        init_simple_logging();
        init_simple_logging();
    }
}
