//! Logging bootstrap for applications embedding trellis.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the host, which can use [`init_logging`] for a sensible default.

use crate::config::{Environment, PluginManagerConfig};
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Plain,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level used when no filter is given
    pub level: String,
    pub format: LogFormat,
    /// Environment filter (supports directives like "trellis_core=debug,trellis_orm=info")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            env_filter: Some("trellis_core=info,trellis_orm=warn".to_string()),
        }
    }

    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            env_filter: Some("trellis_core=debug,trellis_orm=debug".to_string()),
        }
    }

    /// Minimal output for test runs
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            format: LogFormat::Plain,
            env_filter: Some("trellis_core=error,trellis_orm=error".to_string()),
        }
    }

    /// Pick a preset for the manager's environment, honouring its log level
    pub fn for_manager(config: &PluginManagerConfig) -> Self {
        let preset = match config.environment {
            Environment::Production => Self::production(),
            Environment::Test => Self::test(),
            _ => Self::development(),
        };
        Self {
            level: config.log_level.clone(),
            env_filter: None,
            ..preset
        }
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn filter_directives(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Install a global subscriber. `RUST_LOG` takes precedence over the config.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.filter_directives()))?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).pretty())
            .try_init()?,
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout))
            .try_init()?,
    }

    tracing::info!(
        target: "trellis::logging",
        "{} {} logging initialized (level: {}, format: {:?})",
        crate::FRAMEWORK_NAME,
        crate::VERSION,
        config.level,
        config.format
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LoggingConfig::production().format, LogFormat::Json);
        assert_eq!(LoggingConfig::test().level, "error");
        assert_eq!(
            LoggingConfig::default()
                .with_env_filter("trellis_core=trace")
                .filter_directives(),
            "trellis_core=trace"
        );
    }

    #[test]
    fn test_init_logging_installs_once() {
        assert!(init_logging(LoggingConfig::test()).is_ok());
        assert!(init_logging(LoggingConfig::test()).is_err());
    }

    #[test]
    fn test_for_manager_uses_configured_level() {
        let manager_config = PluginManagerConfig::production();
        let config = LoggingConfig::for_manager(&manager_config);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
        assert_eq!(config.filter_directives(), "info");
    }
}
