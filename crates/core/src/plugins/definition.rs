use crate::config::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Core plugin error type
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin [{plugin}] must specify a version, e.g. `version: \"0.1\"`")]
    MissingVersion { plugin: String },

    #[error("Plugin [{plugin}] referenced dependency [{dependency}] with no version")]
    MissingDependencyVersion { plugin: String, dependency: String },

    #[error("Plugin [{plugin}] specifies invalid scope [{scope}]")]
    InvalidScope { plugin: String, scope: String },

    #[error("Duplicate plugin name: {plugin}")]
    DuplicatePlugin { plugin: String },

    #[error("Missing dependency '{dependency}' for plugin '{plugin}'")]
    MissingDependency { plugin: String, dependency: String },

    #[error("Circular dependency detected in plugin: {plugin}")]
    CircularDependency { plugin: String },

    #[error("Unknown plugin: {plugin}")]
    UnknownPlugin { plugin: String },

    #[error("Failed to read plugin definition '{path}': {message}")]
    Definition { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PluginError {
    pub fn unknown_plugin(plugin: impl Into<String>) -> Self {
        Self::UnknownPlugin {
            plugin: plugin.into(),
        }
    }

    pub fn definition(path: &Path, message: impl std::fmt::Display) -> Self {
        Self::Definition {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// A scalar slot value. Versions are often written as bare numbers (`version: 0.1`);
/// definitions loaded from YAML keep the written text of such numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Text(text) => write!(f, "{}", text),
            Scalar::Integer(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::Bool(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

fn restore_written(slot: &mut Scalar, written: &str) {
    let written = written.split(" #").next().unwrap_or_default().trim();
    if let Scalar::Float(value) = slot {
        if written.parse::<f64>().is_ok_and(|parsed| parsed == *value) {
            *slot = Scalar::Text(written.to_string());
        }
    }
}

/// A slot that accepts either a single value or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn values(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(value) => vec![value.as_str()],
            OneOrMany::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// `scopes` / `environments` slot: a bare value, a list, or an includes/excludes map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncludeExcludeSlot {
    Values(OneOrMany),
    Rules {
        #[serde(default)]
        includes: Option<OneOrMany>,
        #[serde(default)]
        excludes: Option<OneOrMany>,
    },
}

impl IncludeExcludeSlot {
    pub fn includes(values: &[&str]) -> Self {
        Self::Rules {
            includes: Some(OneOrMany::Many(values.iter().map(|v| v.to_string()).collect())),
            excludes: None,
        }
    }

    pub fn excludes(values: &[&str]) -> Self {
        Self::Rules {
            includes: None,
            excludes: Some(OneOrMany::Many(values.iter().map(|v| v.to_string()).collect())),
        }
    }
}

/// Declarative description of a plugin, as authored in code or in a YAML document.
///
/// Every slot is optional except `version`, which the descriptor evaluation
/// requires. Absent slots evaluate to empty collections / enabled status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginDefinition {
    /// Name of the defining type, e.g. `UrlMappingsPlugin`
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub version: Option<Scalar>,
    pub depends_on: Option<IndexMap<String, Option<Scalar>>>,
    pub load_after: Option<Vec<String>>,
    pub load_before: Option<Vec<String>>,
    pub evict: Option<Vec<Option<String>>>,
    pub scopes: Option<IncludeExcludeSlot>,
    pub environments: Option<IncludeExcludeSlot>,
    pub observe: Option<Vec<String>>,
    pub status: Option<Scalar>,
    pub influences: Option<Vec<String>>,
    pub watched_resources: Option<OneOrMany>,
    pub plugin_excludes: Option<Vec<String>>,
    pub artefacts: Option<Vec<String>>,
    pub provided_artefacts: Option<Vec<String>>,
}

impl PluginDefinition {
    /// Create a definition for the given defining type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Parse a definition from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PluginError> {
        let mut definition: Self =
            serde_yaml::from_str(yaml).map_err(|e| PluginError::Config(ConfigError::Yaml(e)))?;
        definition.restore_written_versions(yaml);
        Ok(definition)
    }

    /// Read a definition file, naming the file in any error
    pub fn from_yaml_file(path: &Path) -> Result<Self, PluginError> {
        let text = std::fs::read_to_string(path).map_err(|e| PluginError::definition(path, e))?;
        let mut definition: Self =
            serde_yaml::from_str(&text).map_err(|e| PluginError::definition(path, e))?;
        definition.restore_written_versions(&text);
        Ok(definition)
    }

    /// Floats drop their written form (`1.10` parses as `1.1`). Put the
    /// document's text back into `version` and `dependsOn` entries.
    fn restore_written_versions(&mut self, text: &str) {
        let mut in_depends_on = false;
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            if !line.starts_with([' ', '\t']) {
                in_depends_on = line.trim_end() == "dependsOn:";
                if let (Some(written), Some(version)) =
                    (line.strip_prefix("version:"), self.version.as_mut())
                {
                    restore_written(version, written);
                }
            } else if in_depends_on {
                let Some((name, written)) = line.trim().split_once(':') else {
                    continue;
                };
                if let Some(Some(version)) = self
                    .depends_on
                    .as_mut()
                    .and_then(|depends_on| depends_on.get_mut(name.trim()))
                {
                    restore_written(version, written);
                }
            }
        }
    }

    pub fn with_version(mut self, version: impl Into<Scalar>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, version: Option<&str>) -> Self {
        self.depends_on
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), version.map(Scalar::from));
        self
    }

    pub fn with_load_after(mut self, names: &[&str]) -> Self {
        self.load_after = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_load_before(mut self, names: &[&str]) -> Self {
        self.load_before = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_evict(mut self, names: &[&str]) -> Self {
        self.evict = Some(names.iter().map(|n| Some(n.to_string())).collect());
        self
    }

    pub fn with_scopes(mut self, scopes: IncludeExcludeSlot) -> Self {
        self.scopes = Some(scopes);
        self
    }

    pub fn with_environments(mut self, environments: IncludeExcludeSlot) -> Self {
        self.environments = Some(environments);
        self
    }

    pub fn with_observe(mut self, names: &[&str]) -> Self {
        self.observe = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(Scalar::from(status));
        self
    }

    pub fn with_influences(mut self, names: &[&str]) -> Self {
        self.influences = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_watched_resources(mut self, patterns: &[&str]) -> Self {
        self.watched_resources = Some(match patterns {
            [single] => OneOrMany::One(single.to_string()),
            many => OneOrMany::Many(many.iter().map(|p| p.to_string()).collect()),
        });
        self
    }
}
