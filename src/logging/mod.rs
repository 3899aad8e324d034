//! Structured logging setup using tracing
//!
//! Console output is always enabled; an optional JSON file layer with daily
//! rotation can be switched on through [`LoggingConfig`]. The returned guard
//! must stay alive for the duration of the program so buffered file output
//! is flushed.

use crate::config::LoggingConfig;
use crate::domain::{RedactifyError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Keeps the non-blocking file writer alive until dropped
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the logging system
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// `redactify` target.
pub fn init_logging(level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    validate_level(level)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("redactify={level}")));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter);

    let mut layers = vec![console_layer.boxed()];

    let file_guard = if config.file_enabled {
        std::fs::create_dir_all(&config.file_path).map_err(|e| {
            RedactifyError::Configuration(format!(
                "failed to create log directory {}: {e}",
                config.file_path
            ))
        })?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &config.file_path, "redactify.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("redactify={level}")));
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_filter(file_filter);

        layers.push(file_layer.boxed());
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry().with(layers).try_init().ok();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn validate_level(level: &str) -> Result<()> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(RedactifyError::Configuration(format!(
            "invalid log level '{other}' (expected trace, debug, info, warn or error)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_validation() {
        assert!(validate_level("info").is_ok());
        assert!(validate_level("WARN").is_ok());
        assert!(validate_level("loud").is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        let _first = init_logging("info", &config).unwrap();
        // A second call must not panic even though a subscriber is installed
        let _second = init_logging("debug", &config).unwrap();
    }
}
