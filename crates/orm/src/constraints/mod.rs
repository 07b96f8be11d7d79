//! Property constraints and instance validation
//!
//! Each persistent property of a domain class gets a [`ConstrainedProperty`]
//! built from, in order: the built-in default (`nullable: false`, collection
//! associations excepted), the `"*"` entry of the default table, a named
//! shared entry, the type's own `constraints` hint and finally any custom
//! validator.

pub mod constraint;
pub mod validator;

pub use constraint::*;
pub use validator::*;

use crate::domain::property::PropertyDescriptor;
use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key of the default-table entry applied to every property
pub const DEFAULT_CONSTRAINTS_KEY: &str = "*";

/// Declarative constraints for one property, as authored in YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstraintSpec {
    pub nullable: Option<bool>,
    pub blank: Option<bool>,
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub matches: Option<String>,
    pub in_list: Option<Vec<serde_json::Value>>,
    /// Name of an entry in the default table to apply first
    pub shared: Option<String>,
}

impl ConstraintSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn with_blank(mut self, blank: bool) -> Self {
        self.blank = Some(blank);
        self
    }

    pub fn with_min_size(mut self, min: usize) -> Self {
        self.min_size = Some(min);
        self
    }

    pub fn with_max_size(mut self, max: usize) -> Self {
        self.max_size = Some(max);
        self
    }

    pub fn with_matches(mut self, pattern: impl Into<String>) -> Self {
        self.matches = Some(pattern.into());
        self
    }

    pub fn with_in_list(mut self, values: Vec<serde_json::Value>) -> Self {
        self.in_list = Some(values);
        self
    }

    pub fn with_shared(mut self, name: impl Into<String>) -> Self {
        self.shared = Some(name.into());
        self
    }
}

/// Build the constrained properties of `owner`, keyed by property name
pub fn evaluate_constraints<'a>(
    owner: &str,
    properties: impl IntoIterator<Item = &'a PropertyDescriptor>,
    own: &IndexMap<String, ConstraintSpec>,
    validators: &IndexMap<String, CustomValidator>,
    defaults: &IndexMap<String, ConstraintSpec>,
) -> ModelResult<IndexMap<String, ConstrainedProperty>> {
    let mut constrained = IndexMap::new();

    for property in properties {
        let mut entry = ConstrainedProperty::new(owner, &property.name, &property.type_name);
        let collection = property.shape.is_collection() || property.shape.is_map();
        entry.apply(Constraint::Nullable(collection));

        if let Some(global) = defaults.get(DEFAULT_CONSTRAINTS_KEY) {
            entry.apply_spec(global)?;
        }

        if let Some(spec) = own.get(&property.name) {
            if let Some(shared) = &spec.shared {
                let shared_spec = defaults.get(shared).ok_or_else(|| {
                    ModelError::invalid_constraint(
                        owner,
                        &property.name,
                        format!("shared constraint [{}] is not defined", shared),
                    )
                })?;
                entry.apply_spec(shared_spec)?;
            }
            entry.apply_spec(spec)?;
        }

        if let Some(validator) = validators.get(&property.name) {
            entry.apply(Constraint::Validator(validator.clone()));
        }

        constrained.insert(property.name.clone(), entry);
    }

    Ok(constrained)
}
