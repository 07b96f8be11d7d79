//! Error types for the domain model
//!
//! Construction and resolution errors are fatal to the type being built and
//! name the type, property and related type involved.

use trellis_core::config::ConfigError;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Error types for domain model construction and validation
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Identity property not found, but required in domain class [{type_name}]")]
    MissingIdentifier { type_name: String },

    #[error("Version property not found, but required in domain class [{type_name}]")]
    MissingVersion { type_name: String },

    #[error("Non-existent mapping property [{mapped_by}] specified for property [{property}] in class [{type_name}]")]
    InvalidMapping {
        type_name: String,
        property: String,
        mapped_by: String,
    },

    #[error(
        "Property [{property}] in class [{type_name}] is a bidirectional one-to-many with two possible \
         properties on the inverse side. Either name one of the properties on [{related_type}] \
         [{convention}] or use 'mappedBy' to define the property the relationship is mapped with"
    )]
    AmbiguousRelationship {
        type_name: String,
        property: String,
        related_type: String,
        convention: String,
    },

    #[error(
        "Domain classes [{type_name}] and [{related_type}] cannot own each other in a many-to-many \
         relationship. Both contain belongsTo definitions that reference each other"
    )]
    MutualOwnership {
        type_name: String,
        related_type: String,
    },

    #[error(
        "No owner defined between domain classes [{type_name}] and [{related_type}] in a many-to-many \
         relationship. Example: belongsTo: {related_type}"
    )]
    NoOwner {
        type_name: String,
        related_type: String,
    },

    #[error("No property found for name [{property}] for class [{type_name}]")]
    UnknownProperty { type_name: String, property: String },

    #[error("Unknown domain type: {type_name}")]
    UnknownType { type_name: String },

    #[error("Domain type registered twice: {type_name}")]
    DuplicateType { type_name: String },

    #[error("Domain class [{type_name}] inherits from itself")]
    CircularInheritance { type_name: String },

    #[error("Invalid constraint on [{type_name}.{property}]: {message}")]
    InvalidConstraint {
        type_name: String,
        property: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub fn unknown_property(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    pub fn invalid_constraint(
        type_name: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidConstraint {
            type_name: type_name.into(),
            property: property.into(),
            message: message.into(),
        }
    }
}
