use crate::config::{BuildScope, Environment, PluginManagerConfig};
use crate::naming::{logical_property_name, short_name};
use crate::plugins::definition::{IncludeExcludeSlot, OneOrMany, PluginDefinition, PluginError};
use crate::plugins::scope::IncludeExclude;
use indexmap::IndexMap;
use std::fmt;

/// Whether a plugin takes part in loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginStatus {
    #[default]
    Enabled,
    Disabled,
}

impl PluginStatus {
    /// Status slots are case-insensitive; anything but "enabled" disables the plugin
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("enabled") {
            PluginStatus::Enabled
        } else {
            PluginStatus::Disabled
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginStatus::Enabled => write!(f, "enabled"),
            PluginStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// Logical plugin name for a defining type: the short name minus a
/// `GrailsPlugin` or `Plugin` suffix, property-cased
pub fn plugin_name(type_name: &str) -> String {
    let short = short_name(type_name);
    if short.len() > "GrailsPlugin".len() && short.ends_with("GrailsPlugin") {
        logical_property_name(short, "GrailsPlugin")
    } else {
        logical_property_name(short, "Plugin")
    }
}

/// A plugin definition after evaluation: every slot normalized, the version verified
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    name: String,
    type_name: String,
    version: String,
    is_abstract: bool,
    dependencies: IndexMap<String, Option<String>>,
    load_after: Vec<String>,
    load_before: Vec<String>,
    evictions: Vec<String>,
    observed: Vec<String>,
    influenced: Vec<String>,
    status: PluginStatus,
    scopes: IncludeExclude<BuildScope>,
    environments: IncludeExclude<Environment>,
    watched_resource_patterns: Vec<String>,
    plugin_excludes: Vec<String>,
    artefacts: Vec<String>,
    provided_artefacts: Vec<String>,
}

impl PluginDescriptor {
    /// Evaluate a definition into a descriptor
    pub fn evaluate(definition: &PluginDefinition) -> Result<Self, PluginError> {
        let name = plugin_name(&definition.type_name);

        let version = match &definition.version {
            Some(version) if !version.to_string().trim().is_empty() => version.to_string(),
            _ => return Err(PluginError::MissingVersion { plugin: name }),
        };

        let dependencies = definition
            .depends_on
            .iter()
            .flatten()
            .map(|(dependency, version)| (dependency.clone(), version.as_ref().map(|v| v.to_string())))
            .collect();

        let scopes = evaluate_scopes(&name, definition.scopes.as_ref())?;
        let environments = evaluate_environments(definition.environments.as_ref());

        let status = definition
            .status
            .as_ref()
            .map(|status| PluginStatus::parse(&status.to_string()))
            .unwrap_or_default();

        let descriptor = Self {
            type_name: definition.type_name.clone(),
            version,
            is_abstract: definition.is_abstract,
            dependencies,
            load_after: definition.load_after.clone().unwrap_or_default(),
            load_before: definition.load_before.clone().unwrap_or_default(),
            evictions: definition
                .evict
                .iter()
                .flatten()
                .map(|entry| entry.clone().unwrap_or_default())
                .collect(),
            observed: definition.observe.clone().unwrap_or_default(),
            influenced: definition.influences.clone().unwrap_or_default(),
            status,
            scopes,
            environments,
            watched_resource_patterns: definition
                .watched_resources
                .as_ref()
                .map(|patterns| patterns.values().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
            plugin_excludes: definition.plugin_excludes.clone().unwrap_or_default(),
            artefacts: definition.artefacts.clone().unwrap_or_default(),
            provided_artefacts: definition.provided_artefacts.clone().unwrap_or_default(),
            name,
        };

        tracing::debug!(
            "Evaluated plugin descriptor '{}' version {} ({} dependencies)",
            descriptor.name,
            descriptor.version,
            descriptor.dependencies.len()
        );

        Ok(descriptor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies.keys().map(String::as_str).collect()
    }

    /// Version required of a dependency. A dependency declared without one is an error.
    pub fn dependent_version(&self, dependency: &str) -> Result<&str, PluginError> {
        match self.dependencies.get(dependency) {
            Some(Some(version)) => Ok(version),
            _ => Err(PluginError::MissingDependencyVersion {
                plugin: self.name.clone(),
                dependency: dependency.to_string(),
            }),
        }
    }

    pub fn load_after_names(&self) -> &[String] {
        &self.load_after
    }

    pub fn load_before_names(&self) -> &[String] {
        &self.load_before
    }

    pub fn eviction_names(&self) -> &[String] {
        &self.evictions
    }

    pub fn observed_plugin_names(&self) -> &[String] {
        &self.observed
    }

    /// Whether change events from `plugin` should reach this plugin
    pub fn observes(&self, plugin: &str) -> bool {
        self.observed.iter().any(|name| name == plugin || name == "*")
    }

    pub fn influenced_plugin_names(&self) -> &[String] {
        &self.influenced
    }

    pub fn status(&self) -> PluginStatus {
        self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.status == PluginStatus::Enabled
    }

    pub fn supports_scope(&self, scope: BuildScope) -> bool {
        self.scopes.supports(&scope)
    }

    pub fn supports_environment(&self, environment: &Environment) -> bool {
        self.environments.supports(environment)
    }

    pub fn supports_current_scope_and_environment(&self, config: &PluginManagerConfig) -> bool {
        self.supports_scope(config.build_scope) && self.supports_environment(&config.environment)
    }

    pub fn add_exclude_scope(&mut self, scope: BuildScope) {
        self.scopes.add_exclude(scope);
    }

    pub fn add_exclude_environment(&mut self, environment: Environment) {
        self.environments.add_exclude(environment);
    }

    pub fn scopes(&self) -> &IncludeExclude<BuildScope> {
        &self.scopes
    }

    pub fn environments(&self) -> &IncludeExclude<Environment> {
        &self.environments
    }

    pub fn watched_resource_patterns(&self) -> &[String] {
        &self.watched_resource_patterns
    }

    pub fn plugin_excludes(&self) -> &[String] {
        &self.plugin_excludes
    }

    pub fn artefacts(&self) -> &[String] {
        &self.artefacts
    }

    pub fn provided_artefacts(&self) -> &[String] {
        &self.provided_artefacts
    }
}

fn split_slot(slot: Option<&IncludeExcludeSlot>) -> (Vec<&str>, Vec<&str>) {
    match slot {
        None => (Vec::new(), Vec::new()),
        Some(IncludeExcludeSlot::Values(values)) => (values.values(), Vec::new()),
        Some(IncludeExcludeSlot::Rules { includes, excludes }) => (
            includes.as_ref().map(OneOrMany::values).unwrap_or_default(),
            excludes.as_ref().map(OneOrMany::values).unwrap_or_default(),
        ),
    }
}

fn evaluate_scopes(
    plugin: &str,
    slot: Option<&IncludeExcludeSlot>,
) -> Result<IncludeExclude<BuildScope>, PluginError> {
    let parse = |value: &str| {
        value.parse::<BuildScope>().map_err(|_| PluginError::InvalidScope {
            plugin: plugin.to_string(),
            scope: value.to_string(),
        })
    };

    let (includes, excludes) = split_slot(slot);
    let includes = includes.into_iter().map(parse).collect::<Result<Vec<_>, _>>()?;
    let excludes = excludes.into_iter().map(parse).collect::<Result<Vec<_>, _>>()?;

    Ok(IncludeExclude::from_rules(includes, excludes))
}

fn evaluate_environments(slot: Option<&IncludeExcludeSlot>) -> IncludeExclude<Environment> {
    let (includes, excludes) = split_slot(slot);
    let parse = |values: Vec<&str>| -> Vec<Environment> {
        values.into_iter().filter_map(|value| value.parse().ok()).collect()
    };
    IncludeExclude::from_rules(parse(includes), parse(excludes))
}
