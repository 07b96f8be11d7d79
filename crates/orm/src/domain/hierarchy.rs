//! Inheritance resolution
//!
//! Each registered type is flattened once into a [`TypeModel`]: its own
//! declarations merged over those of its registered ancestors, root first.
//! A superclass that is not registered is treated as a framework base and
//! ends the chain.

use crate::domain::extractor::{TypeDefinition, TypeKind};
use crate::domain::hints::DomainHints;
use crate::domain::property::PropertyShape;
use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

/// A type with its hierarchy merged in
#[derive(Debug, Clone, PartialEq)]
pub struct TypeModel {
    pub name: String,
    pub superclass: Option<String>,
    /// Registered ancestors, nearest first
    pub ancestors: Vec<String>,
    pub is_abstract: bool,
    pub kind: TypeKind,
    /// Inherited and declared properties, root first
    pub properties: IndexMap<String, String>,
    pub hints: DomainHints,
}

impl TypeModel {
    pub fn is_entity(&self) -> bool {
        self.kind == TypeKind::Entity
    }

    pub fn owners(&self) -> Vec<&str> {
        self.hints.owners()
    }

    pub fn shape_of(&self, property: &str) -> Option<PropertyShape> {
        self.properties.get(property).map(|t| PropertyShape::classify(t))
    }

    /// Names of single-reference properties typed exactly `type_name`
    pub fn references_to(&self, type_name: &str) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, declared)| declared.as_str() == type_name)
            .filter(|(_, declared)| PropertyShape::classify(declared).referenced_type().is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Names of collection- or map-shaped properties
    pub fn collection_properties(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, declared)| {
                let shape = PropertyShape::classify(declared);
                shape.is_collection() || shape.is_map()
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// All registered types, flattened
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    models: IndexMap<String, TypeModel>,
}

impl TypeHierarchy {
    pub fn build(definitions: &IndexMap<String, TypeDefinition>) -> ModelResult<Self> {
        let mut models = IndexMap::new();

        for definition in definitions.values() {
            let chain = ancestry(definition, definitions)?;
            let model = merge(definition, &chain);
            debug!(
                "Resolved hierarchy of {}: {} properties, ancestors {:?}",
                model.name,
                model.properties.len(),
                model.ancestors
            );
            models.insert(definition.name.clone(), model);
        }

        Ok(Self { models })
    }

    pub fn get(&self, name: &str) -> Option<&TypeModel> {
        self.models.get(name)
    }

    /// The model of `name` if it is a registered entity
    pub fn entity(&self, name: &str) -> Option<&TypeModel> {
        self.get(name).filter(|model| model.is_entity())
    }

    pub fn is_entity(&self, name: &str) -> bool {
        self.entity(name).is_some()
    }

    /// Whether a value of `candidate` can be used where `target` is expected
    pub fn is_assignable(&self, target: &str, candidate: &str) -> bool {
        target == candidate
            || self
                .get(candidate)
                .is_some_and(|model| model.ancestors.iter().any(|a| a == target))
    }

    pub fn models(&self) -> impl Iterator<Item = &TypeModel> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Registered ancestors of `definition`, nearest first
fn ancestry<'a>(
    definition: &'a TypeDefinition,
    definitions: &'a IndexMap<String, TypeDefinition>,
) -> ModelResult<Vec<&'a TypeDefinition>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    seen.insert(definition.name.as_str());

    let mut current = definition;
    while let Some(parent) = current.superclass.as_deref().and_then(|s| definitions.get(s)) {
        if !seen.insert(parent.name.as_str()) {
            return Err(ModelError::CircularInheritance {
                type_name: definition.name.clone(),
            });
        }
        chain.push(parent);
        current = parent;
    }

    Ok(chain)
}

fn merge(definition: &TypeDefinition, ancestors: &[&TypeDefinition]) -> TypeModel {
    let mut properties = IndexMap::new();
    let mut hints = DomainHints::default();

    for level in ancestors.iter().rev().copied().chain(std::iter::once(definition)) {
        for (name, declared) in &level.properties {
            properties.insert(name.clone(), declared.clone());
        }

        let own = &level.hints;
        hints.has_many.extend(own.has_many.clone());
        hints.has_one.extend(own.has_one.clone());
        hints.mapped_by.extend(own.mapped_by.clone());
        hints.constraints.extend(own.constraints.clone());
        hints.validators.extend(own.validators.clone());

        if own.belongs_to.is_some() {
            hints.belongs_to = own.belongs_to.clone();
        }
        if own.mapping_strategy.is_some() {
            hints.mapping_strategy = own.mapping_strategy.clone();
        }

        for name in &own.embedded {
            if !hints.embedded.contains(name) {
                hints.embedded.push(name.clone());
            }
        }
        for name in &own.transients {
            if !hints.transients.contains(name) {
                hints.transients.push(name.clone());
            }
        }
    }

    TypeModel {
        name: definition.name.clone(),
        superclass: definition.superclass.clone(),
        ancestors: ancestors.iter().map(|a| a.name.clone()).collect(),
        is_abstract: definition.is_abstract,
        kind: definition.kind,
        properties,
        hints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(definitions: Vec<TypeDefinition>) -> IndexMap<String, TypeDefinition> {
        definitions.into_iter().map(|d| (d.name.clone(), d)).collect()
    }

    #[test]
    fn test_properties_merge_root_first() {
        let definitions = registry(vec![
            TypeDefinition::persistent("Publication")
                .with_property("title", "String")
                .with_property("owner", "Person")
                .with_hints(DomainHints::new().with_has_many("tags", "Tag").with_transients(&["cache"])),
            TypeDefinition::entity("Book")
                .with_superclass("Publication")
                .with_property("isbn", "String")
                .with_property("owner", "Author")
                .with_hints(DomainHints::new().with_has_many("tags", "Label").with_transients(&["cache"])),
        ]);

        let hierarchy = TypeHierarchy::build(&definitions).unwrap();
        let book = hierarchy.get("Book").unwrap();

        assert_eq!(
            book.properties.keys().collect::<Vec<_>>(),
            vec!["id", "version", "title", "owner", "isbn"]
        );
        assert_eq!(book.properties["owner"], "Author");
        assert_eq!(book.hints.has_many["tags"], "Label");
        assert_eq!(book.hints.transients, vec!["cache"]);
        assert_eq!(book.ancestors, vec!["Publication"]);
    }

    #[test]
    fn test_unregistered_superclass_is_a_root() {
        let definitions = registry(vec![TypeDefinition::persistent("Book").with_superclass("Object")]);
        let hierarchy = TypeHierarchy::build(&definitions).unwrap();
        assert!(hierarchy.get("Book").unwrap().ancestors.is_empty());
    }

    #[test]
    fn test_circular_inheritance() {
        let definitions = registry(vec![
            TypeDefinition::persistent("A").with_superclass("B"),
            TypeDefinition::persistent("B").with_superclass("A"),
        ]);
        assert!(matches!(
            TypeHierarchy::build(&definitions),
            Err(ModelError::CircularInheritance { .. })
        ));
    }

    #[test]
    fn test_assignability_and_references() {
        let definitions = registry(vec![
            TypeDefinition::persistent("Person"),
            TypeDefinition::persistent("Author").with_superclass("Person"),
            TypeDefinition::persistent("Book")
                .with_property("author", "Author")
                .with_property("editor", "Author")
                .with_property("chapters", "List"),
            TypeDefinition::component("Address"),
        ]);
        let hierarchy = TypeHierarchy::build(&definitions).unwrap();

        assert!(hierarchy.is_assignable("Person", "Author"));
        assert!(!hierarchy.is_assignable("Author", "Person"));
        assert!(hierarchy.is_entity("Book"));
        assert!(!hierarchy.is_entity("Address"));

        let book = hierarchy.get("Book").unwrap();
        assert_eq!(book.references_to("Author"), vec!["author", "editor"]);
        assert_eq!(book.collection_properties(), vec!["chapters"]);
    }
}
