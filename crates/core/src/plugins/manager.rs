use crate::config::PluginManagerConfig;
use crate::plugins::definition::{PluginDefinition, PluginError};
use crate::plugins::events::{ChangeSource, EventKind, PluginEvent, PluginListeners};
use crate::plugins::plugin::{DefinitionCheck, Plugin};
use crate::plugins::watch::{FileSystemSource, ResourceSource};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A type that a changed resource defined, as reported by a [`TypeReloader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadedType {
    pub name: String,
    pub is_abstract: bool,
}

/// Host hook that reloads the type behind a changed resource
pub trait TypeReloader: Send + Sync {
    /// `None` when the resource does not define a reloadable type
    fn reload(&self, resource: &Path) -> Option<ReloadedType>;
}

/// What a single [`PluginManager::check_for_changes`] pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeReport {
    /// Plugins whose defining file changed and was re-evaluated
    pub reloaded_plugins: Vec<String>,
    /// Changed watched resources, by owning plugin
    pub changed_resources: Vec<(String, PathBuf)>,
    /// Plugins refreshed because an influencing plugin changed
    pub refreshed_plugins: Vec<String>,
    pub restart_requested: bool,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.reloaded_plugins.is_empty()
            && self.changed_resources.is_empty()
            && self.refreshed_plugins.is_empty()
            && !self.restart_requested
    }
}

/// Registers plugins, orders them and drives their change notifications
pub struct PluginManager {
    config: PluginManagerConfig,
    source: Arc<dyn ResourceSource>,
    reloader: Option<Arc<dyn TypeReloader>>,
    plugins: IndexMap<String, Plugin>,
    context: serde_json::Value,
    restart_requested: bool,
    shut_down: bool,
}

impl PluginManager {
    /// Create a manager resolving watched resources on disk
    pub fn new(config: PluginManagerConfig) -> Self {
        let source = Arc::new(FileSystemSource::new(config.resource_base_locations()));
        Self::with_source(config, source)
    }

    pub fn with_source(config: PluginManagerConfig, source: Arc<dyn ResourceSource>) -> Self {
        Self {
            config,
            source,
            reloader: None,
            plugins: IndexMap::new(),
            context: serde_json::Value::Null,
            restart_requested: false,
            shut_down: false,
        }
    }

    pub fn with_type_reloader(mut self, reloader: Arc<dyn TypeReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// Shared application context passed along with every event
    pub fn set_context(&mut self, context: serde_json::Value) {
        self.context = context;
    }

    pub fn config(&self) -> &PluginManagerConfig {
        &self.config
    }

    /// Register a plugin from its definition
    pub fn register(
        &mut self,
        definition: PluginDefinition,
        listeners: PluginListeners,
    ) -> Result<&Plugin, PluginError> {
        let plugin = Plugin::new(definition, listeners, self.source.clone(), &self.config)?;
        self.insert(plugin)
    }

    /// Register a plugin defined by a YAML file, which is then watched for changes
    pub fn register_file(
        &mut self,
        path: &Path,
        listeners: PluginListeners,
    ) -> Result<&Plugin, PluginError> {
        let plugin = Plugin::from_file(path, listeners, self.source.clone(), &self.config)?;
        self.insert(plugin)
    }

    fn insert(&mut self, plugin: Plugin) -> Result<&Plugin, PluginError> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(PluginError::DuplicatePlugin { plugin: name });
        }

        tracing::info!(
            "Registered plugin '{}' version {} ({} watched resources)",
            name,
            plugin.version(),
            plugin.watched_resources().len()
        );

        let plugin: &Plugin = self.plugins.entry(name).or_insert(plugin);
        Ok(plugin)
    }

    pub fn plugin(&self, name: &str) -> Option<&Plugin> {
        self.plugins.get(name)
    }

    pub fn plugin_mut(&mut self, name: &str) -> Option<&mut Plugin> {
        self.plugins.get_mut(name)
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// All registered plugin names, in registration order
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    fn is_candidate(&self, plugin: &Plugin) -> bool {
        plugin.descriptor().is_enabled()
            && plugin
                .descriptor()
                .supports_current_scope_and_environment(&self.config)
    }

    /// Names evicted by enabled plugins supporting the current scope and environment
    pub fn evicted_plugin_names(&self) -> HashSet<&str> {
        self.plugins
            .values()
            .filter(|plugin| self.is_candidate(plugin))
            .flat_map(|plugin| plugin.descriptor().eviction_names())
            .map(String::as_str)
            .collect()
    }

    /// Whether a plugin takes part in loading and change handling
    pub fn is_active(&self, name: &str) -> bool {
        match self.plugins.get(name) {
            Some(plugin) => self.is_candidate(plugin) && !self.evicted_plugin_names().contains(name),
            None => false,
        }
    }

    pub fn active_plugin_names(&self) -> Vec<&str> {
        let evicted = self.evicted_plugin_names();
        self.plugins
            .iter()
            .filter(|(name, plugin)| self.is_candidate(plugin) && !evicted.contains(name.as_str()))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Check that every active plugin's hard dependencies are active too
    pub fn validate(&self) -> Result<(), PluginError> {
        let active: HashSet<&str> = self.active_plugin_names().into_iter().collect();

        for name in &active {
            if let Some(plugin) = self.plugins.get(*name) {
                for dependency in plugin.descriptor().dependency_names() {
                    if !active.contains(dependency) {
                        return Err(PluginError::MissingDependency {
                            plugin: name.to_string(),
                            dependency: dependency.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Active plugins ordered so that every plugin follows its dependencies,
    /// its `loadAfter` entries and any plugin declaring `loadBefore` on it
    pub fn load_order(&self) -> Result<Vec<String>, PluginError> {
        let names = self.active_plugin_names();
        let name_to_index: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, name)| (*name, i)).collect();

        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
        for (index, name) in names.iter().enumerate() {
            let Some(plugin) = self.plugins.get(*name) else {
                continue;
            };
            let descriptor = plugin.descriptor();

            for dependency in descriptor.dependency_names() {
                match name_to_index.get(dependency) {
                    Some(&dep_index) => predecessors[index].push(dep_index),
                    None => {
                        return Err(PluginError::MissingDependency {
                            plugin: name.to_string(),
                            dependency: dependency.to_string(),
                        })
                    }
                }
            }
            for after in descriptor.load_after_names() {
                if let Some(&after_index) = name_to_index.get(after.as_str()) {
                    predecessors[index].push(after_index);
                }
            }
            for before in descriptor.load_before_names() {
                if let Some(&before_index) = name_to_index.get(before.as_str()) {
                    predecessors[before_index].push(index);
                }
            }
        }

        let mut visited = vec![false; names.len()];
        let mut temp_mark = vec![false; names.len()];
        let mut order = Vec::with_capacity(names.len());

        for index in 0..names.len() {
            if !visited[index] {
                visit_plugin(
                    index,
                    &names,
                    &predecessors,
                    &mut visited,
                    &mut temp_mark,
                    &mut order,
                )?;
            }
        }

        tracing::debug!("Plugin load order: {:?}", order);
        Ok(order)
    }

    /// Poll every active plugin for definition and watched-resource changes
    pub fn check_for_changes(&mut self) -> ChangeReport {
        let mut report = ChangeReport::default();
        if self.shut_down {
            return report;
        }

        let names: Vec<String> = self
            .active_plugin_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        for name in names {
            let Some(plugin) = self.plugins.get_mut(&name) else {
                continue;
            };

            match plugin.check_definition(&self.config) {
                Ok(DefinitionCheck::Unchanged) => {}
                Ok(DefinitionCheck::Reloaded) => {
                    report.reloaded_plugins.push(name);
                    continue;
                }
                Ok(DefinitionCheck::RestartRequired) => {
                    self.restart_requested = true;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to reload plugin '{}': {}", name, e);
                    continue;
                }
            }

            for change in plugin.poll_resources() {
                tracing::info!(
                    "Plugin '{}' resource {:?}: {}",
                    name,
                    change.kind,
                    change.path.display()
                );
                self.fire_modified_event(&name, &change.path);
                if let Some(plugin) = self.plugins.get_mut(&name) {
                    plugin.acknowledge(&change.path);
                }

                let mut visited = HashSet::from([name.clone()]);
                self.refresh_influenced(&name, &mut visited, &mut report.refreshed_plugins);
                report.changed_resources.push((name.clone(), change.path));
            }
        }

        report.restart_requested = self.restart_requested;
        report
    }

    /// Touch a plugin's watched resources, re-fire their change events and
    /// propagate to the plugins it influences. Returns every refreshed plugin.
    pub fn refresh_plugin(&mut self, name: &str) -> Result<Vec<String>, PluginError> {
        if !self.plugins.contains_key(name) {
            return Err(PluginError::unknown_plugin(name));
        }

        let mut refreshed = vec![name.to_string()];
        self.refresh_resources(name);

        let mut visited = HashSet::from([name.to_string()]);
        self.refresh_influenced(name, &mut visited, &mut refreshed);
        Ok(refreshed)
    }

    fn refresh_resources(&mut self, name: &str) {
        let touched = match self.plugins.get_mut(name) {
            Some(plugin) => plugin.touch_watched_resources(),
            None => return,
        };
        for path in touched {
            self.fire_modified_event(name, &path);
        }
    }

    fn refresh_influenced(
        &mut self,
        origin: &str,
        visited: &mut HashSet<String>,
        refreshed: &mut Vec<String>,
    ) {
        let influenced = match self.plugins.get(origin) {
            Some(plugin) => plugin.descriptor().influenced_plugin_names().to_vec(),
            None => return,
        };

        for name in influenced {
            if !self.is_active(&name) {
                tracing::debug!("Plugin '{}' influenced by '{}' is not loaded", name, origin);
                continue;
            }
            if !visited.insert(name.clone()) {
                tracing::warn!(
                    "Influence cycle: plugin '{}' already refreshed after a change in '{}'",
                    name,
                    origin
                );
                continue;
            }

            tracing::debug!("Refreshing plugin '{}' influenced by '{}'", name, origin);
            self.refresh_resources(&name);
            refreshed.push(name.clone());
            self.refresh_influenced(&name, visited, refreshed);
        }
    }

    fn fire_modified_event(&mut self, name: &str, path: &Path) {
        let reloaded = self.reloader.as_ref().and_then(|reloader| reloader.reload(path));
        let source = match reloaded {
            Some(reloaded) if reloaded.is_abstract => {
                tracing::info!(
                    "Reloaded type '{}' is abstract, application restart required",
                    reloaded.name
                );
                self.restart_requested = true;
                return;
            }
            Some(reloaded) => ChangeSource::Type {
                name: reloaded.name,
                path: path.to_path_buf(),
            },
            None => ChangeSource::Resource {
                path: path.to_path_buf(),
            },
        };

        let Some(plugin) = self.plugins.get(name) else {
            return;
        };
        let event = plugin.event(EventKind::Change, source, &self.config, &self.context);
        plugin.notify(&event);
        self.inform_observers(&event);
    }

    fn inform_observers(&self, event: &PluginEvent) {
        for (name, plugin) in &self.plugins {
            if name != &event.plugin
                && plugin.descriptor().observes(&event.plugin)
                && self.is_active(name)
            {
                tracing::debug!("Notifying observer '{}' of change in '{}'", name, event.plugin);
                plugin.notify(event);
            }
        }
    }

    /// Deliver a configuration-change event to every active plugin.
    /// Returns how many plugins had a listener for it.
    pub fn inform_config_change(&self) -> usize {
        let mut notified = 0;
        for name in self.active_plugin_names() {
            if let Some(plugin) = self.plugins.get(name) {
                let event =
                    plugin.event(EventKind::ConfigChange, ChangeSource::Config, &self.config, &self.context);
                if plugin.notify(&event) {
                    notified += 1;
                }
            }
        }
        notified
    }

    /// Notify every plugin of shutdown, last registered first, then drop them
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }

        for plugin in self.plugins.values().rev() {
            let event = plugin.event(
                EventKind::Shutdown,
                ChangeSource::Application,
                &self.config,
                &self.context,
            );
            plugin.notify(&event);
        }

        tracing::info!("Plugin manager shut down ({} plugins)", self.plugins.len());
        self.plugins.clear();
        self.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Whether a change could not be applied in place and the host should restart
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn clear_restart_request(&mut self) {
        self.restart_requested = false;
    }
}

fn visit_plugin(
    index: usize,
    names: &[&str],
    predecessors: &[Vec<usize>],
    visited: &mut [bool],
    temp_mark: &mut [bool],
    order: &mut Vec<String>,
) -> Result<(), PluginError> {
    if temp_mark[index] {
        return Err(PluginError::CircularDependency {
            plugin: names[index].to_string(),
        });
    }
    if visited[index] {
        return Ok(());
    }

    temp_mark[index] = true;
    for &predecessor in &predecessors[index] {
        visit_plugin(predecessor, names, predecessors, visited, temp_mark, order)?;
    }
    temp_mark[index] = false;
    visited[index] = true;
    order.push(names[index].to_string());

    Ok(())
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(PluginManagerConfig::default())
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("app_name", &self.config.app_name)
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("restart_requested", &self.restart_requested)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildScope;
    use crate::plugins::definition::IncludeExcludeSlot;
    use crate::plugins::watch::MemoryResourceSource;

    fn manager() -> PluginManager {
        PluginManager::with_source(
            PluginManagerConfig::testing(),
            Arc::new(MemoryResourceSource::new()),
        )
    }

    fn plugin(type_name: &str) -> PluginDefinition {
        PluginDefinition::new(type_name).with_version("1.0")
    }

    #[test]
    fn test_register_and_lookup() {
        let mut manager = manager();
        manager.register(plugin("CorePlugin"), PluginListeners::new()).unwrap();
        manager.register(plugin("I18nGrailsPlugin"), PluginListeners::new()).unwrap();

        assert_eq!(manager.plugin_count(), 2);
        assert!(manager.has_plugin("i18n"));
        assert_eq!(manager.plugin_names(), vec!["core", "i18n"]);
    }

    #[test]
    fn test_duplicate_plugin() {
        let mut manager = manager();
        manager.register(plugin("CorePlugin"), PluginListeners::new()).unwrap();
        let err = manager.register(plugin("CorePlugin"), PluginListeners::new()).unwrap_err();
        assert!(matches!(err, PluginError::DuplicatePlugin { plugin } if plugin == "core"));
    }

    #[test]
    fn test_load_order_follows_dependencies() {
        let mut manager = manager();
        manager
            .register(plugin("DomainClassPlugin").with_dependency("core", Some("1.0")), PluginListeners::new())
            .unwrap();
        manager
            .register(plugin("ControllersPlugin").with_load_after(&["domainClass"]), PluginListeners::new())
            .unwrap();
        manager.register(plugin("CorePlugin"), PluginListeners::new()).unwrap();
        manager
            .register(plugin("LoggingPlugin").with_load_before(&["core"]), PluginListeners::new())
            .unwrap();

        let order = manager.load_order().unwrap();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();

        assert!(position("core") < position("domainClass"));
        assert!(position("domainClass") < position("controllers"));
        assert!(position("logging") < position("core"));
    }

    #[test]
    fn test_load_order_missing_dependency() {
        let mut manager = manager();
        manager
            .register(plugin("DomainClassPlugin").with_dependency("hibernate", Some("1.0")), PluginListeners::new())
            .unwrap();

        let err = manager.load_order().unwrap_err();
        assert!(matches!(err, PluginError::MissingDependency { dependency, .. } if dependency == "hibernate"));
        assert!(manager.validate().is_err());
    }

    #[test]
    fn test_load_order_circular_dependency() {
        let mut manager = manager();
        manager
            .register(plugin("APlugin").with_dependency("b", Some("1.0")), PluginListeners::new())
            .unwrap();
        manager
            .register(plugin("BPlugin").with_dependency("a", Some("1.0")), PluginListeners::new())
            .unwrap();

        assert!(matches!(
            manager.load_order(),
            Err(PluginError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_inactive_plugins_are_filtered() {
        let mut manager = manager();
        manager.register(plugin("CorePlugin"), PluginListeners::new()).unwrap();
        manager
            .register(plugin("AuditPlugin").with_status("disabled"), PluginListeners::new())
            .unwrap();
        manager
            .register(
                plugin("WarOnlyPlugin").with_scopes(IncludeExcludeSlot::includes(&["war"])),
                PluginListeners::new(),
            )
            .unwrap();
        manager
            .register(plugin("HibernatePlugin"), PluginListeners::new())
            .unwrap();
        manager
            .register(plugin("MongoPlugin").with_evict(&["hibernate"]), PluginListeners::new())
            .unwrap();

        assert_eq!(manager.config().build_scope, BuildScope::Test);
        assert_eq!(manager.active_plugin_names(), vec!["core", "mongo"]);
        assert_eq!(manager.load_order().unwrap(), vec!["core", "mongo"]);
    }

    #[test]
    fn test_refresh_unknown_plugin() {
        let mut manager = manager();
        assert!(matches!(
            manager.refresh_plugin("missing"),
            Err(PluginError::UnknownPlugin { .. })
        ));
    }

    #[test]
    fn test_shutdown_clears_plugins() {
        let mut manager = manager();
        manager.register(plugin("CorePlugin"), PluginListeners::new()).unwrap();
        manager.shutdown();

        assert!(manager.is_shut_down());
        assert_eq!(manager.plugin_count(), 0);
        assert!(manager.check_for_changes().is_empty());
    }
}
