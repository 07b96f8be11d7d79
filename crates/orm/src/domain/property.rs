//! Property descriptors and relationship annotations

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declared types stored as simple column values
static SCALAR_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "String", "Integer", "int", "Long", "long", "Short", "short", "Byte", "byte", "Boolean",
        "boolean", "Double", "double", "Float", "float", "Character", "char", "BigDecimal",
        "BigInteger", "Date", "Calendar", "Timestamp", "Time", "Currency", "Locale", "TimeZone",
        "URL", "URI", "UUID", "byte[]", "Byte[]", "char[]", "Character[]",
    ]
    .into_iter()
    .collect()
});

const COLLECTION_TYPES: &[&str] = &["Set", "List", "Collection", "SortedSet"];
const MAP_TYPES: &[&str] = &["Map", "SortedMap"];

/// Normalized shape of a declared property type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyShape {
    /// Simple value (string, number, date, ...)
    Scalar,
    /// Untyped `Object` property; never persisted
    Object,
    /// Collection of some related type named by `hasMany`
    Collection,
    /// Map of some related type named by `hasMany`
    Map,
    /// Single reference to another type
    Reference(String),
}

impl PropertyShape {
    /// Classify a declared type name
    pub fn classify(type_name: &str) -> Self {
        let type_name = type_name.trim();
        if COLLECTION_TYPES.contains(&type_name) {
            Self::Collection
        } else if MAP_TYPES.contains(&type_name) {
            Self::Map
        } else if type_name == "Object" {
            Self::Object
        } else if SCALAR_TYPES.contains(type_name) {
            Self::Scalar
        } else {
            Self::Reference(type_name.to_string())
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map)
    }

    /// The referenced type, for single references
    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            Self::Reference(type_name) => Some(type_name),
            _ => None,
        }
    }
}

/// Kind of relationship inferred for a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Not an association
    #[default]
    None,
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    /// Component stored inline with its owner
    Embedded,
    /// Collection of non-entity values
    BasicCollection,
}

impl RelationshipType {
    /// Returns true if this relationship holds many values
    pub fn is_collection(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany | Self::BasicCollection)
    }

    /// Returns true if this relationship links two entities
    pub fn is_association(self) -> bool {
        matches!(
            self,
            Self::OneToOne | Self::OneToMany | Self::ManyToOne | Self::ManyToMany
        )
    }
}

/// Relationship semantics resolved for one property
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipAnnotation {
    pub kind: RelationshipType,
    pub bidirectional: bool,
    /// Only meaningful for many-to-many
    pub owning_side: bool,
    /// Mirror property on the related type
    pub reference_property_name: Option<String>,
    pub has_one: bool,
}

impl RelationshipAnnotation {
    pub fn new(kind: RelationshipType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Pair this property with `mirror` on the related type
    pub fn with_mirror(mut self, mirror: impl Into<String>) -> Self {
        self.bidirectional = true;
        self.reference_property_name = Some(mirror.into());
        self
    }

    pub fn with_owning_side(mut self, owning_side: bool) -> Self {
        self.owning_side = owning_side;
        self
    }

    pub fn with_has_one(mut self, has_one: bool) -> Self {
        self.has_one = has_one;
        self
    }
}

/// A property of a domain type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Declared type name, as written
    pub type_name: String,
    pub shape: PropertyShape,
    pub persistent: bool,
    pub identity: bool,
    pub version: bool,
    /// Related type of an association, once resolved
    pub referenced_type: Option<String>,
    pub relationship: RelationshipAnnotation,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let shape = PropertyShape::classify(&type_name);
        Self {
            name: name.into(),
            referenced_type: shape.referenced_type().map(str::to_string),
            type_name,
            shape,
            persistent: true,
            identity: false,
            version: false,
            relationship: RelationshipAnnotation::default(),
        }
    }

    pub fn kind(&self) -> RelationshipType {
        self.relationship.kind
    }

    pub fn is_association(&self) -> bool {
        self.relationship.kind.is_association()
    }

    pub fn is_one_to_one(&self) -> bool {
        self.kind() == RelationshipType::OneToOne
    }

    pub fn is_one_to_many(&self) -> bool {
        self.kind() == RelationshipType::OneToMany
    }

    pub fn is_many_to_one(&self) -> bool {
        self.kind() == RelationshipType::ManyToOne
    }

    pub fn is_many_to_many(&self) -> bool {
        self.kind() == RelationshipType::ManyToMany
    }

    pub fn is_embedded(&self) -> bool {
        self.kind() == RelationshipType::Embedded
    }

    pub fn is_basic_collection(&self) -> bool {
        self.kind() == RelationshipType::BasicCollection
    }

    pub fn is_bidirectional(&self) -> bool {
        self.relationship.bidirectional
    }

    pub fn is_owning_side(&self) -> bool {
        self.relationship.owning_side
    }

    pub fn is_has_one(&self) -> bool {
        self.relationship.has_one
    }

    pub fn reference_property_name(&self) -> Option<&str> {
        self.relationship.reference_property_name.as_deref()
    }
}
