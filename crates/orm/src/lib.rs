//! # trellis-orm: Domain model for trellis
//!
//! Convention-driven domain classes: relationship inference from property
//! shapes and declarative hints, identity/version/persistent-property views,
//! and property constraints with instance validation.

pub mod config;
pub mod constraints;
pub mod domain;
pub mod error;

pub use config::OrmConfig;
pub use constraints::{
    ConstrainedProperty, Constraint, ConstraintSpec, CustomValidator, FieldError,
};
pub use domain::{
    BelongsTo, DomainClass, DomainHints, DomainRegistry, PropertyDescriptor, PropertyExtractor,
    PropertyShape, RelationshipAnnotation, RelationshipResolver, RelationshipType, TypeDefinition,
    TypeHierarchy, TypeKind,
};
pub use error::{ModelError, ModelResult};
