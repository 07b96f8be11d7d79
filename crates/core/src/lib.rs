pub mod config;
pub mod logging;
pub mod naming;
pub mod plugins;

// Re-export key types for convenience
pub use config::{AppConfigTrait, BuildScope, ConfigError, ConfigSource, Environment, PluginManagerConfig};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use naming::{logical_property_name, property_name, short_name};
pub use plugins::{
    ChangeReport, Listener, PluginDefinition, PluginDescriptor, PluginError, PluginEvent,
    PluginListeners, PluginManager, ResourceSource, TypeReloader,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework information
pub const FRAMEWORK_NAME: &str = "trellis";
