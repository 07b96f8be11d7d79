//! Domain model configuration

use crate::constraints::ConstraintSpec;
use crate::error::ModelResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_core::config::{ConfigError, ConfigValidator, NonBlankValidator};

pub const DEFAULT_MAPPING_STRATEGY: &str = "GORM";

/// Settings shared by every domain class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrmConfig {
    /// Named constraint sets; `"*"` applies to every property
    pub default_constraints: IndexMap<String, ConstraintSpec>,
    pub mapping_strategy: String,
}

impl OrmConfig {
    pub fn new() -> Self {
        Self {
            default_constraints: IndexMap::new(),
            mapping_strategy: DEFAULT_MAPPING_STRATEGY.to_string(),
        }
    }

    pub fn with_default_constraint(mut self, name: &str, spec: ConstraintSpec) -> Self {
        self.default_constraints.insert(name.to_string(), spec);
        self
    }

    pub fn with_mapping_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.mapping_strategy = strategy.into();
        self
    }

    pub fn from_yaml_str(yaml: &str) -> ModelResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::from)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        NonBlankValidator {
            field: "mapping_strategy",
        }
        .validate(&self.mapping_strategy)
    }
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OrmConfig::default();
        assert_eq!(config.mapping_strategy, "GORM");
        assert!(config.default_constraints.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
defaultConstraints:
  "*":
    nullable: true
  code:
    matches: "[A-Z]{3}"
"#;
        let config = OrmConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.mapping_strategy, "GORM");
        assert_eq!(config.default_constraints["*"].nullable, Some(true));
        assert_eq!(config.default_constraints["code"].matches.as_deref(), Some("[A-Z]{3}"));
    }

    #[test]
    fn test_blank_mapping_strategy_rejected() {
        let result = OrmConfig::from_yaml_str("mappingStrategy: \"  \"");
        assert!(matches!(result, Err(ModelError::Config(_))));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mappingStrategy: JPA").unwrap();

        let config = OrmConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.mapping_strategy, "JPA");
    }
}
