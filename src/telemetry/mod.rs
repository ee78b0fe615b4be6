//! Logging setup for processes embedding the renderer.
//!
//! Installs a `tracing` subscriber with an `EnvFilter` (from `RUST_LOG`, or
//! the configured level) and a `fmt` layer in pretty or JSON form.
//!
//! | Setting | Description | Default |
//! |---------|-------------|---------|
//! | `logging.level` | Filter directive when `RUST_LOG` is unset | `info` |
//! | `logging.format` | `pretty` or `json` | `pretty` |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry-specific error type
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> TelemetryResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

fn build_filter(config: &LoggingConfig) -> TelemetryResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| TelemetryError::InvalidFilter(e.to_string())),
    }
}

/// Initialize the global tracing subscriber.
///
/// Idempotent: if a subscriber is already installed the call is a no-op.
pub fn init_tracing(config: &LoggingConfig) -> TelemetryResult<()> {
    let env_filter = build_filter(config)?;
    let format = LogFormat::parse(&config.format)?;

    let result = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!(level = %config.level, format = ?format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty").unwrap(), LogFormat::Pretty);
        assert!(matches!(
            LogFormat::parse("xml"),
            Err(TelemetryError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_unknown_format_rejected_before_install() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "yaml".to_string(),
        };
        assert!(matches!(
            init_tracing(&config),
            Err(TelemetryError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }
}
