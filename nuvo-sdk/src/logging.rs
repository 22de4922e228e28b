//! Logging infrastructure for nuvo-sdk
//!
//! Centralized tracing setup so embedding applications (particularly TUIs and
//! long-running bridges) control exactly what reaches stderr.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics with source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Initialize logging with the specified mode
///
/// Call early, before opening a session.
///
/// # Environment Variables
///
/// - `NUVO_LOG_LEVEL`: override the log level (error, warn, info, debug, trace)
/// - `RUST_LOG`: honored when `NUVO_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(env_filter("info"));
            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(env_filter("debug"));
            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from the `NUVO_LOG_MODE` environment variable
///
/// Accepts `development` or `debug`; anything else (or unset) stays silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("NUVO_LOG_MODE").as_deref() {
        Ok("development") => LoggingMode::Development,
        Ok("debug") => LoggingMode::Debug,
        _ => LoggingMode::Silent,
    };
    init_logging(mode)
}

fn env_filter(default_level: &str) -> EnvFilter {
    if let Ok(level) = std::env::var("NUVO_LOG_LEVEL") {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(default_level))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    }
}
