//! Logging setup for sessions and controllers
//!
//! All crates in the workspace log through `tracing`. Nothing is printed
//! until a subscriber is installed, which this module does for the common
//! cases.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// How much to log and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber; every event is dropped
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Pretty output at `debug` with thread ids and source locations
    Debug,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Install a global subscriber for `mode`
///
/// # Environment Variables
///
/// - `MEDIA_SESSION_LOG_LEVEL`: filter directive, e.g. `session_dispatch=trace`
/// - `RUST_LOG`: used when `MEDIA_SESSION_LOG_LEVEL` is unset
///
/// ```rust,ignore
/// media_session::logging::init_logging(LoggingMode::Development)?;
/// ```
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_names(true)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Install a subscriber chosen by `MEDIA_SESSION_LOG_MODE`
///
/// `development` and `debug` select those modes; anything else, including
/// an unset variable, is [`LoggingMode::Silent`].
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(mode_from_env())
}

fn mode_from_env() -> LoggingMode {
    match std::env::var("MEDIA_SESSION_LOG_MODE").as_deref() {
        Ok("development") => LoggingMode::Development,
        Ok("debug") => LoggingMode::Debug,
        _ => LoggingMode::Silent,
    }
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = match std::env::var("MEDIA_SESSION_LOG_LEVEL") {
        Ok(level) => level,
        Err(std::env::VarError::NotUnicode(_)) => {
            return Err(LoggingError::InvalidEnv(
                "MEDIA_SESSION_LOG_LEVEL is not valid unicode".to_string(),
            ))
        }
        Err(std::env::VarError::NotPresent) => {
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string())
        }
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{}: {}", directives, e)))
}

/// Whether a global subscriber is already installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_logging_mode_debug() {
        assert_eq!(format!("{:?}", LoggingMode::Debug), "Debug");
    }
}
