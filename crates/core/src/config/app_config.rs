use crate::config::validation::{ConfigValidator, LogLevelValidator, NonBlankValidator};
use crate::config::{BuildScope, ConfigError, ConfigSource, Environment};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Configuration trait for application configuration
pub trait AppConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Settings the plugin manager needs about the running application
#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    pub app_name: String,
    pub environment: Environment,
    pub build_scope: BuildScope,
    pub reload_enabled: bool,
    /// Extra base location searched for watched resources
    pub reload_location: Option<PathBuf>,
    /// Installed plugin directories searched for watched resources
    pub plugin_directories: Vec<PathBuf>,
    pub log_level: String,
}

impl PluginManagerConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            app_name: "trellis".to_string(),
            environment: Environment::Development,
            build_scope: BuildScope::Run,
            reload_enabled: true,
            reload_location: None,
            plugin_directories: Vec::new(),
            log_level: "info".to_string(),
        }
    }

    /// Create configuration for development
    pub fn development() -> Self {
        Self {
            log_level: "debug".to_string(),
            ..Self::new()
        }
    }

    /// Create configuration for testing
    pub fn testing() -> Self {
        Self {
            environment: Environment::Test,
            build_scope: BuildScope::Test,
            log_level: "warn".to_string(),
            ..Self::new()
        }
    }

    /// Create configuration for production
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            build_scope: BuildScope::War,
            reload_enabled: false,
            ..Self::new()
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_build_scope(mut self, scope: BuildScope) -> Self {
        self.build_scope = scope;
        self
    }

    pub fn with_reload_enabled(mut self, enabled: bool) -> Self {
        self.reload_enabled = enabled;
        self
    }

    pub fn with_reload_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.reload_location = Some(location.into());
        self
    }

    pub fn with_plugin_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.plugin_directories.push(directory.into());
        self
    }

    /// Base locations watched-resource patterns are resolved against, in search order
    pub fn resource_base_locations(&self) -> Vec<PathBuf> {
        let mut locations = self.plugin_directories.clone();
        locations.push(PathBuf::from("."));
        if let Some(reload_location) = &self.reload_location {
            locations.push(reload_location.clone());
        }
        locations
    }
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfigTrait for PluginManagerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(app_name) = env::var("TRELLIS_APP_NAME") {
            config.app_name = app_name;
        }

        if let Ok(env_str) = env::var("TRELLIS_ENV") {
            config.environment = env_str.parse()?;
        }

        if let Ok(scope_str) = env::var("TRELLIS_SCOPE") {
            config.build_scope = scope_str.parse()?;
        }

        // Reload defaults based on environment if not set
        config.reload_enabled = match env::var("TRELLIS_RELOAD") {
            Ok(reload_str) => reload_str.parse().map_err(|_| {
                ConfigError::invalid_value("reload_enabled", reload_str, "true or false")
            })?,
            Err(_) => config.environment.reload_by_default(),
        };

        config.reload_location = env::var("TRELLIS_RELOAD_LOCATION").ok().map(PathBuf::from);

        if let Ok(dirs) = env::var("TRELLIS_PLUGIN_DIRS") {
            config.plugin_directories = env::split_paths(&dirs).collect();
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        NonBlankValidator { field: "app_name" }.validate(&self.app_name)?;
        LogLevelValidator.validate(&self.log_level)?;

        if let Some(location) = &self.reload_location {
            if location.as_os_str().is_empty() {
                return Err(ConfigError::invalid_value(
                    "reload_location",
                    "",
                    "a non-empty path",
                ));
            }
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();

        let env_or_default = |var: &str, default: &str| {
            if env::var(var).is_ok() {
                ConfigSource::EnvVar(var.to_string())
            } else {
                ConfigSource::Default(default.to_string())
            }
        };

        sources.insert("app_name".to_string(), env_or_default("TRELLIS_APP_NAME", "trellis"));
        sources.insert("environment".to_string(), env_or_default("TRELLIS_ENV", "development"));
        sources.insert("build_scope".to_string(), env_or_default("TRELLIS_SCOPE", "run"));
        sources.insert(
            "reload_enabled".to_string(),
            env_or_default("TRELLIS_RELOAD", "enabled outside production"),
        );
        sources.insert(
            "reload_location".to_string(),
            env_or_default("TRELLIS_RELOAD_LOCATION", "none"),
        );
        sources.insert(
            "plugin_directories".to_string(),
            env_or_default("TRELLIS_PLUGIN_DIRS", "none"),
        );
        sources.insert("log_level".to_string(), env_or_default("LOG_LEVEL", "info"));

        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "TRELLIS_APP_NAME",
            "TRELLIS_ENV",
            "TRELLIS_SCOPE",
            "TRELLIS_RELOAD",
            "TRELLIS_RELOAD_LOCATION",
            "TRELLIS_PLUGIN_DIRS",
            "LOG_LEVEL",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = PluginManagerConfig::from_env().unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.build_scope, BuildScope::Run);
        assert!(config.reload_enabled);
        assert!(config.config_sources()["environment"].is_default());
    }

    #[test]
    #[serial]
    fn test_from_env_production_disables_reload() {
        clear_env();
        env::set_var("TRELLIS_ENV", "production");
        env::set_var("TRELLIS_SCOPE", "war");

        let config = PluginManagerConfig::from_env().unwrap();
        assert!(!config.reload_enabled);
        assert_eq!(config.build_scope, BuildScope::War);
        assert!(config.config_sources()["environment"].is_env_var());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_reload_flag() {
        clear_env();
        env::set_var("TRELLIS_RELOAD", "sometimes");

        assert!(PluginManagerConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_resource_base_locations_order() {
        let config = PluginManagerConfig::testing()
            .with_plugin_directory("plugins/audit")
            .with_reload_location("/srv/reload");

        let locations = config.resource_base_locations();
        assert_eq!(
            locations,
            vec![
                PathBuf::from("plugins/audit"),
                PathBuf::from("."),
                PathBuf::from("/srv/reload"),
            ]
        );
    }
}
