//! Declarative hints a domain type carries alongside its properties

use crate::constraints::{ConstraintSpec, CustomValidator};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `belongsTo` declaration: a single owner, a list of owners, or a map of role to owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BelongsTo {
    Single(String),
    List(Vec<String>),
    Map(IndexMap<String, String>),
}

impl BelongsTo {
    /// Owner type names, in declaration order
    pub fn owners(&self) -> Vec<&str> {
        match self {
            BelongsTo::Single(owner) => vec![owner.as_str()],
            BelongsTo::List(owners) => owners.iter().map(String::as_str).collect(),
            BelongsTo::Map(roles) => roles.values().map(String::as_str).collect(),
        }
    }

    pub fn names(&self, type_name: &str) -> bool {
        self.owners().contains(&type_name)
    }
}

impl From<&str> for BelongsTo {
    fn from(owner: &str) -> Self {
        BelongsTo::Single(owner.to_string())
    }
}

impl From<&[&str]> for BelongsTo {
    fn from(owners: &[&str]) -> Self {
        BelongsTo::List(owners.iter().map(|o| o.to_string()).collect())
    }
}

/// The hint table of one domain type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DomainHints {
    pub belongs_to: Option<BelongsTo>,
    /// Collection property name to related type
    pub has_many: IndexMap<String, String>,
    /// Reference property name to related type, foreign key held by the related side
    pub has_one: IndexMap<String, String>,
    /// Property name to mirror property name on the related type
    pub mapped_by: IndexMap<String, String>,
    pub embedded: Vec<String>,
    pub transients: Vec<String>,
    pub mapping_strategy: Option<String>,
    pub constraints: IndexMap<String, ConstraintSpec>,
    #[serde(skip)]
    pub validators: IndexMap<String, CustomValidator>,
}

impl DomainHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_belongs_to(mut self, belongs_to: impl Into<BelongsTo>) -> Self {
        self.belongs_to = Some(belongs_to.into());
        self
    }

    pub fn with_has_many(mut self, property: &str, related: &str) -> Self {
        self.has_many.insert(property.to_string(), related.to_string());
        self
    }

    pub fn with_has_one(mut self, property: &str, related: &str) -> Self {
        self.has_one.insert(property.to_string(), related.to_string());
        self
    }

    pub fn with_mapped_by(mut self, property: &str, mirror: &str) -> Self {
        self.mapped_by.insert(property.to_string(), mirror.to_string());
        self
    }

    pub fn with_embedded(mut self, properties: &[&str]) -> Self {
        self.embedded.extend(properties.iter().map(|p| p.to_string()));
        self
    }

    pub fn with_transients(mut self, properties: &[&str]) -> Self {
        self.transients.extend(properties.iter().map(|p| p.to_string()));
        self
    }

    pub fn with_mapping_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.mapping_strategy = Some(strategy.into());
        self
    }

    pub fn with_constraint(mut self, property: &str, spec: ConstraintSpec) -> Self {
        self.constraints.insert(property.to_string(), spec);
        self
    }

    pub fn with_validator(mut self, property: &str, validator: CustomValidator) -> Self {
        self.validators.insert(property.to_string(), validator);
        self
    }

    pub fn owners(&self) -> Vec<&str> {
        self.belongs_to.as_ref().map(BelongsTo::owners).unwrap_or_default()
    }
}
