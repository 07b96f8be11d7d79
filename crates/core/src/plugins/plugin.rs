use crate::config::PluginManagerConfig;
use crate::plugins::definition::{PluginDefinition, PluginError};
use crate::plugins::descriptor::PluginDescriptor;
use crate::plugins::events::{ChangeSource, EventKind, PluginEvent, PluginListeners};
use crate::plugins::watch::{ResourceChange, ResourceSource, ResourceWatcher};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of re-checking a plugin's own defining resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionCheck {
    Unchanged,
    Reloaded,
    /// The reloaded definition is abstract and cannot be swapped in place
    RestartRequired,
}

#[derive(Debug, Clone)]
struct DefinitionFile {
    path: PathBuf,
    last_modified: Option<DateTime<Utc>>,
}

/// A registered plugin: its evaluated descriptor, lifecycle hooks and watched resources
#[derive(Debug)]
pub struct Plugin {
    definition: PluginDefinition,
    descriptor: PluginDescriptor,
    listeners: PluginListeners,
    watcher: Option<ResourceWatcher>,
    definition_file: Option<DefinitionFile>,
    source: Arc<dyn ResourceSource>,
}

impl Plugin {
    pub fn new(
        definition: PluginDefinition,
        listeners: PluginListeners,
        source: Arc<dyn ResourceSource>,
        config: &PluginManagerConfig,
    ) -> Result<Self, PluginError> {
        let descriptor = PluginDescriptor::evaluate(&definition)?;
        let watcher = Self::watcher_for(&descriptor, &listeners, &source, config);

        Ok(Self {
            definition,
            descriptor,
            listeners,
            watcher,
            definition_file: None,
            source,
        })
    }

    /// Load a plugin whose definition lives in a YAML file. The file itself is
    /// the plugin's root defining resource and is re-read when it changes.
    pub fn from_file(
        path: &Path,
        listeners: PluginListeners,
        source: Arc<dyn ResourceSource>,
        config: &PluginManagerConfig,
    ) -> Result<Self, PluginError> {
        let definition = PluginDefinition::from_yaml_file(path)?;
        let last_modified = source
            .last_modified(path)
            .map_err(|e| PluginError::definition(path, e))?;

        let mut plugin = Self::new(definition, listeners, source, config)?;
        plugin.definition_file = Some(DefinitionFile {
            path: path.to_path_buf(),
            last_modified,
        });
        Ok(plugin)
    }

    fn watcher_for(
        descriptor: &PluginDescriptor,
        listeners: &PluginListeners,
        source: &Arc<dyn ResourceSource>,
        config: &PluginManagerConfig,
    ) -> Option<ResourceWatcher> {
        let patterns = descriptor.watched_resource_patterns();
        if patterns.is_empty() || listeners.on_change.is_none() || !config.reload_enabled {
            return None;
        }
        Some(ResourceWatcher::new(patterns.to_vec(), source.clone()))
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn version(&self) -> &str {
        self.descriptor.version()
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut PluginDescriptor {
        &mut self.descriptor
    }

    pub fn definition(&self) -> &PluginDefinition {
        &self.definition
    }

    pub fn definition_path(&self) -> Option<&Path> {
        self.definition_file.as_ref().map(|file| file.path.as_path())
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn watched_resources(&self) -> Vec<&Path> {
        self.watcher
            .iter()
            .flat_map(|watcher| watcher.resources())
            .map(|resource| resource.path.as_path())
            .collect()
    }

    /// Re-read the defining file if its timestamp moved forward
    pub fn check_definition(
        &mut self,
        config: &PluginManagerConfig,
    ) -> Result<DefinitionCheck, PluginError> {
        let Some(file) = &self.definition_file else {
            return Ok(DefinitionCheck::Unchanged);
        };

        let current = match self.source.last_modified(&file.path) {
            Ok(Some(current)) => current,
            Ok(None) => return Ok(DefinitionCheck::Unchanged),
            Err(e) => {
                tracing::warn!(
                    "Unable to read modification time of plugin definition {}: {}",
                    file.path.display(),
                    e
                );
                return Ok(DefinitionCheck::Unchanged);
            }
        };
        if file.last_modified.is_some_and(|previous| current <= previous) {
            return Ok(DefinitionCheck::Unchanged);
        }

        let path = file.path.clone();
        let definition = PluginDefinition::from_yaml_file(&path)?;
        if definition.is_abstract {
            self.mark_definition_read(current);
            tracing::info!(
                "Plugin definition {} is now abstract, application restart required",
                path.display()
            );
            return Ok(DefinitionCheck::RestartRequired);
        }

        let descriptor = PluginDescriptor::evaluate(&definition)?;
        self.mark_definition_read(current);
        self.watcher = Self::watcher_for(&descriptor, &self.listeners, &self.source, config);
        self.definition = definition;
        self.descriptor = descriptor;

        tracing::info!("Reloaded plugin '{}' from {}", self.name(), path.display());
        Ok(DefinitionCheck::Reloaded)
    }

    fn mark_definition_read(&mut self, modified: DateTime<Utc>) {
        if let Some(file) = &mut self.definition_file {
            file.last_modified = Some(modified);
        }
    }

    /// Poll watched resources for additions and modifications
    pub fn poll_resources(&mut self) -> Vec<ResourceChange> {
        match &mut self.watcher {
            Some(watcher) => watcher.detect_changes(),
            None => Vec::new(),
        }
    }

    pub fn acknowledge(&mut self, path: &Path) {
        if let Some(watcher) = &mut self.watcher {
            watcher.acknowledge(path);
        }
    }

    /// Touch every watched resource, returning every watched path
    pub fn touch_watched_resources(&mut self) -> Vec<PathBuf> {
        match &mut self.watcher {
            Some(watcher) => watcher.touch_all(),
            None => Vec::new(),
        }
    }

    pub fn event(
        &self,
        kind: EventKind,
        source: ChangeSource,
        config: &PluginManagerConfig,
        context: &serde_json::Value,
    ) -> PluginEvent {
        PluginEvent {
            kind,
            source,
            plugin: self.name().to_string(),
            plugin_version: self.version().to_string(),
            application: config.app_name.clone(),
            manager: format!("{}:pluginManager", config.app_name),
            context: context.clone(),
        }
    }

    /// Deliver an event to this plugin's matching hook
    pub fn notify(&self, event: &PluginEvent) -> bool {
        self.listeners.dispatch(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::events::Listener;
    use crate::plugins::watch::MemoryResourceSource;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn definition() -> PluginDefinition {
        PluginDefinition::new("UrlMappingsPlugin")
            .with_version("0.1")
            .with_watched_resources(&["conf/*UrlMappings.yml"])
    }

    fn source() -> Arc<MemoryResourceSource> {
        let source = Arc::new(MemoryResourceSource::new());
        source.set_modified("conf/UrlMappings.yml", at(0));
        source
    }

    #[test]
    fn test_watching_requires_on_change_listener() {
        let config = PluginManagerConfig::new();
        let plugin = Plugin::new(definition(), PluginListeners::new(), source(), &config).unwrap();
        assert!(!plugin.is_watching());

        let listeners = PluginListeners::new().with_on_change(Listener::callback(|_| {}));
        let plugin = Plugin::new(definition(), listeners, source(), &config).unwrap();
        assert!(plugin.is_watching());
        assert_eq!(plugin.watched_resources(), vec![Path::new("conf/UrlMappings.yml")]);
    }

    #[test]
    fn test_watching_requires_reload_enabled() {
        let config = PluginManagerConfig::production();
        let listeners = PluginListeners::new().with_on_change(Listener::callback(|_| {}));
        let plugin = Plugin::new(definition(), listeners, source(), &config).unwrap();
        assert!(!plugin.is_watching());
    }

    #[test]
    fn test_event_carries_plugin_and_application() {
        let config = PluginManagerConfig::new().with_app_name("bookstore");
        let plugin = Plugin::new(definition(), PluginListeners::new(), source(), &config).unwrap();

        let event = plugin.event(
            EventKind::Change,
            ChangeSource::Application,
            &config,
            &serde_json::json!({"beans": ["urlMappingsRegistry"]}),
        );
        assert_eq!(event.plugin, "urlMappings");
        assert_eq!(event.plugin_version, "0.1");
        assert_eq!(event.application, "bookstore");
        assert_eq!(event.context["beans"][0], "urlMappingsRegistry");
    }

    #[test]
    fn test_broken_definition_is_retried_until_it_parses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("AuditPlugin.yml");
        std::fs::write(&path, "type: AuditPlugin\nversion: \"1.0\"\n").unwrap();

        let source = source();
        source.set_modified(path.clone(), at(0));
        let config = PluginManagerConfig::new();
        let mut plugin = Plugin::from_file(&path, PluginListeners::new(), source.clone(), &config).unwrap();

        std::fs::write(&path, "type: [AuditPlugin\n").unwrap();
        source.set_modified(path.clone(), at(10));
        assert!(plugin.check_definition(&config).is_err());
        assert!(plugin.check_definition(&config).is_err());

        std::fs::write(&path, "type: AuditPlugin\nversion: \"1.1\"\n").unwrap();
        assert_eq!(plugin.check_definition(&config).unwrap(), DefinitionCheck::Reloaded);
        assert_eq!(plugin.version(), "1.1");
        assert_eq!(plugin.check_definition(&config).unwrap(), DefinitionCheck::Unchanged);
    }

    #[test]
    fn test_programmatic_plugin_has_no_definition_to_check() {
        let config = PluginManagerConfig::new();
        let mut plugin = Plugin::new(definition(), PluginListeners::new(), source(), &config).unwrap();
        assert_eq!(plugin.check_definition(&config).unwrap(), DefinitionCheck::Unchanged);
    }
}
