//! Raw type definitions and property extraction

use crate::domain::hints::DomainHints;
use crate::domain::property::PropertyDescriptor;
use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use trellis_core::config::ConfigError;

pub const IDENTITY: &str = "id";
pub const VERSION: &str = "version";

/// Property names that describe the type rather than hold data
pub const CONFIGURATIONAL_PROPERTIES: &[&str] = &[
    "class",
    "metaClass",
    "log",
    "errors",
    "properties",
    "belongsTo",
    "hasMany",
    "hasOne",
    "mappedBy",
    "embedded",
    "transients",
    "constraints",
    "mapping",
    "mappingStrategy",
];

/// Whether a domain type is persisted on its own or only inside an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Entity,
    Component,
}

/// A domain type as declared, before hierarchy merging and resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub kind: TypeKind,
    /// Property name to declared type name, in declaration order
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    #[serde(flatten)]
    pub hints: DomainHints,
}

impl TypeDefinition {
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Component,
            ..Self::default()
        }
    }

    /// Entity with the standard `id` and `version` properties declared
    pub fn persistent(name: impl Into<String>) -> Self {
        Self::entity(name)
            .with_property(IDENTITY, "Long")
            .with_property(VERSION, "Long")
    }

    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_property(mut self, name: &str, type_name: &str) -> Self {
        self.properties.insert(name.to_string(), type_name.to_string());
        self
    }

    pub fn with_hints(mut self, hints: DomainHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn is_entity(&self) -> bool {
        self.kind == TypeKind::Entity
    }

    pub fn from_yaml_str(yaml: &str) -> ModelResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a YAML sequence of type definitions
    pub fn all_from_yaml_str(yaml: &str) -> ModelResult<Vec<Self>> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn all_from_yaml_file(path: impl AsRef<Path>) -> ModelResult<Vec<Self>> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::from)?;
        Self::all_from_yaml_str(&contents)
    }
}

type ConfigurationalFn = dyn Fn(&str) -> bool + Send + Sync;

/// Turns declared properties into descriptors, dropping configurational ones
#[derive(Clone)]
pub struct PropertyExtractor {
    is_configurational: Arc<ConfigurationalFn>,
}

impl PropertyExtractor {
    pub fn new() -> Self {
        Self {
            is_configurational: Arc::new(|name| CONFIGURATIONAL_PROPERTIES.contains(&name)),
        }
    }

    pub fn with_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            is_configurational: Arc::new(predicate),
        }
    }

    pub fn is_configurational(&self, name: &str) -> bool {
        (self.is_configurational)(name)
    }

    /// Extract the descriptors of `type_name`.
    ///
    /// Entities must declare both an identity and a version property.
    pub fn extract(
        &self,
        type_name: &str,
        declared: &IndexMap<String, String>,
        transients: &[String],
        require_identity: bool,
    ) -> ModelResult<IndexMap<String, PropertyDescriptor>> {
        let mut properties = IndexMap::new();

        for (name, declared_type) in declared {
            if self.is_configurational(name) {
                continue;
            }

            let mut property = PropertyDescriptor::new(name.as_str(), declared_type.as_str());
            property.identity = name == IDENTITY;
            property.version = name == VERSION;
            if transients.contains(name) {
                property.persistent = false;
            }
            properties.insert(name.clone(), property);
        }

        if require_identity {
            if !properties.values().any(|p| p.identity) {
                return Err(ModelError::MissingIdentifier {
                    type_name: type_name.to_string(),
                });
            }
            if !properties.values().any(|p| p.version) {
                return Err(ModelError::MissingVersion {
                    type_name: type_name.to_string(),
                });
            }
        }

        Ok(properties)
    }
}

impl Default for PropertyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyExtractor").finish_non_exhaustive()
    }
}
