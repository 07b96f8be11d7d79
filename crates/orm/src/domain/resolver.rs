//! Relationship inference
//!
//! Decides, for every persistent property of a type, which kind of
//! association it is, whether it is paired with a mirror property on the
//! related type and, for many-to-many, which side owns the relationship.
//! Everything is derived from property shapes and the merged hint tables
//! of the [`TypeHierarchy`].

use crate::domain::hierarchy::{TypeHierarchy, TypeModel};
use crate::domain::property::{PropertyDescriptor, PropertyShape, RelationshipAnnotation, RelationshipType};
use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use tracing::debug;
use trellis_core::naming::property_name;

pub struct RelationshipResolver<'a> {
    hierarchy: &'a TypeHierarchy,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(hierarchy: &'a TypeHierarchy) -> Self {
        Self { hierarchy }
    }

    /// Resolve every property of `owner` in place
    pub fn resolve(
        &self,
        owner: &TypeModel,
        properties: &mut IndexMap<String, PropertyDescriptor>,
    ) -> ModelResult<()> {
        for property in properties.values_mut() {
            *property = self.resolve_property(owner, property)?;
        }
        Ok(())
    }

    /// Resolve a single property of `owner`
    pub fn resolve_property(
        &self,
        owner: &TypeModel,
        property: &PropertyDescriptor,
    ) -> ModelResult<PropertyDescriptor> {
        let property = property.clone();
        if !property.persistent || property.identity || property.version {
            return Ok(property);
        }

        let resolved = match property.shape.clone() {
            PropertyShape::Collection | PropertyShape::Map => self.resolve_collection(owner, property)?,
            PropertyShape::Reference(_) if owner.hints.embedded.contains(&property.name) => {
                let mut property = property;
                property.relationship = RelationshipAnnotation::new(RelationshipType::Embedded);
                property
            }
            PropertyShape::Reference(related) if self.hierarchy.is_entity(&related) => {
                self.resolve_reference(owner, property, &related)?
            }
            _ => property,
        };

        if resolved.kind() != RelationshipType::None {
            debug!(
                "{}.{} resolved as {:?} (bidirectional: {}, mirror: {:?})",
                owner.name,
                resolved.name,
                resolved.kind(),
                resolved.is_bidirectional(),
                resolved.reference_property_name()
            );
        }
        Ok(resolved)
    }

    fn resolve_collection(
        &self,
        owner: &TypeModel,
        mut property: PropertyDescriptor,
    ) -> ModelResult<PropertyDescriptor> {
        let Some(related_name) = owner.hints.has_many.get(&property.name) else {
            // Maps are tolerated as unresolved associations
            if !property.shape.is_map() {
                property.persistent = false;
            }
            return Ok(property);
        };
        property.referenced_type = Some(related_name.clone());

        let Some(related) = self.hierarchy.entity(related_name) else {
            property.relationship = RelationshipAnnotation::new(RelationshipType::BasicCollection);
            return Ok(property);
        };

        let mirror = self.collection_mirror(owner, &property, related)?;
        property.relationship = match &mirror {
            None => RelationshipAnnotation::new(RelationshipType::OneToMany),
            Some(name) => match related.shape_of(name) {
                Some(PropertyShape::Collection | PropertyShape::Map) => {
                    RelationshipAnnotation::new(RelationshipType::ManyToMany).with_mirror(name.as_str())
                }
                _ => RelationshipAnnotation::new(RelationshipType::OneToMany).with_mirror(name.as_str()),
            },
        };

        if property.is_many_to_many() {
            property.relationship.owning_side = self.many_to_many_owner(owner, related)?;
        }
        Ok(property)
    }

    /// Mirror of a collection property on its related type
    fn collection_mirror(
        &self,
        owner: &TypeModel,
        property: &PropertyDescriptor,
        related: &TypeModel,
    ) -> ModelResult<Option<String>> {
        if let Some(mapped) = owner.hints.mapped_by.get(&property.name).filter(|m| !m.trim().is_empty()) {
            let found = related.references_to(&owner.name).contains(&mapped.as_str())
                || related.collection_properties().contains(&mapped.as_str());
            if !found {
                return Err(ModelError::InvalidMapping {
                    type_name: owner.name.clone(),
                    property: property.name.clone(),
                    mapped_by: mapped.clone(),
                });
            }
            return Ok(Some(mapped.clone()));
        }

        if !related.hints.has_many.is_empty() && related.name != owner.name {
            let back_reference = related.hints.has_many.iter().find(|(key, target)| {
                let redirected = related
                    .hints
                    .mapped_by
                    .get(*key)
                    .is_some_and(|m| *m != property.name);
                !redirected && self.hierarchy.is_assignable(target, &owner.name)
            });
            if let Some((key, _)) = back_reference {
                if related.properties.contains_key(key) {
                    return Ok(Some(key.clone()));
                }
            }
        }

        let candidates = related.references_to(&owner.name);
        match candidates.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(single.to_string())),
            _ => {
                let convention = property_name(&owner.name);
                if candidates.contains(&convention.as_str()) {
                    Ok(Some(convention))
                } else {
                    Err(ModelError::AmbiguousRelationship {
                        type_name: owner.name.clone(),
                        property: property.name.clone(),
                        related_type: related.name.clone(),
                        convention,
                    })
                }
            }
        }
    }

    /// Whether `owner` is the owning side of its many-to-many with `related`
    fn many_to_many_owner(&self, owner: &TypeModel, related: &TypeModel) -> ModelResult<bool> {
        let owning_side = related.owners().contains(&owner.name.as_str());
        let related_owner = owner.owners().contains(&related.name.as_str());
        let reflexive = owner.name == related.name;

        if related_owner && owning_side {
            return Err(ModelError::MutualOwnership {
                type_name: owner.name.clone(),
                related_type: related.name.clone(),
            });
        }
        if !related_owner && !owning_side && !reflexive {
            return Err(ModelError::NoOwner {
                type_name: owner.name.clone(),
                related_type: related.name.clone(),
            });
        }
        Ok(owning_side)
    }

    fn resolve_reference(
        &self,
        owner: &TypeModel,
        mut property: PropertyDescriptor,
        related_name: &str,
    ) -> ModelResult<PropertyDescriptor> {
        let Some(related) = self.hierarchy.entity(related_name) else {
            return Ok(property);
        };

        let mirror = self.reference_mirror(owner, &property, related);
        let has_one = owner.hints.has_one.contains_key(&property.name);

        property.relationship = match mirror.as_deref().map(|m| (m, related.shape_of(m))) {
            Some((name, Some(PropertyShape::Collection | PropertyShape::Map))) => {
                RelationshipAnnotation::new(RelationshipType::ManyToOne).with_mirror(name)
            }
            Some((name, Some(_))) if related.name != owner.name => {
                RelationshipAnnotation::new(RelationshipType::OneToOne)
                    .with_mirror(name)
                    .with_has_one(has_one)
            }
            _ => RelationshipAnnotation::new(RelationshipType::OneToOne).with_has_one(has_one),
        };
        Ok(property)
    }

    /// Mirror of a single reference on its related type
    fn reference_mirror(
        &self,
        owner: &TypeModel,
        property: &PropertyDescriptor,
        related: &TypeModel,
    ) -> Option<String> {
        let related_has_many = &related.hints.has_many;
        let related_mapped_by = &related.hints.mapped_by;
        let mut mirror = None;

        if !related_has_many.is_empty() {
            let back_reference = related_has_many
                .iter()
                .find(|(_, target)| target.as_str() == owner.name)
                .map(|(key, _)| key.as_str());
            let siblings = owner.references_to(&related.name).len();

            if siblings == 1 {
                let unmapped = back_reference.is_some_and(|key| {
                    related_mapped_by.get(key).map_or(true, |m| *m == property.name)
                });
                if unmapped {
                    mirror = back_reference.map(str::to_string);
                }
            } else if siblings > 1 {
                if related_mapped_by.values().any(|m| *m == property.name) {
                    mirror = related_mapped_by
                        .iter()
                        .filter(|(_, m)| **m == property.name)
                        .find(|(key, _)| {
                            related_has_many
                                .get(*key)
                                .is_some_and(|target| self.hierarchy.is_assignable(target, &owner.name))
                        })
                        .map(|(key, _)| key.clone());
                } else if property.name == property_name(&related.name) {
                    mirror = back_reference
                        .filter(|key| !related_mapped_by.contains_key(*key))
                        .map(str::to_string);
                }
            }
        }

        let mirror = mirror.filter(|name| related.properties.contains_key(name));
        if mirror.is_some() {
            return mirror;
        }

        match related.references_to(&owner.name).as_slice() {
            [single] => Some(single.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extractor::{PropertyExtractor, TypeDefinition};
    use crate::domain::hints::DomainHints;

    fn hierarchy(definitions: Vec<TypeDefinition>) -> TypeHierarchy {
        let definitions = definitions.into_iter().map(|d| (d.name.clone(), d)).collect();
        TypeHierarchy::build(&definitions).unwrap()
    }

    fn resolve(hierarchy: &TypeHierarchy, type_name: &str) -> ModelResult<IndexMap<String, PropertyDescriptor>> {
        let model = hierarchy.get(type_name).unwrap();
        let mut properties = PropertyExtractor::new().extract(
            type_name,
            &model.properties,
            &model.hints.transients,
            true,
        )?;
        RelationshipResolver::new(hierarchy).resolve(model, &mut properties)?;
        Ok(properties)
    }

    #[test]
    fn test_unmapped_collection_is_not_persistent() {
        let hierarchy = hierarchy(vec![TypeDefinition::persistent("Book")
            .with_property("tags", "Set")
            .with_property("metadata", "Map")]);

        let properties = resolve(&hierarchy, "Book").unwrap();
        assert!(!properties["tags"].persistent);
        assert!(properties["metadata"].persistent);
        assert_eq!(properties["metadata"].kind(), RelationshipType::None);
    }

    #[test]
    fn test_basic_collection() {
        let hierarchy = hierarchy(vec![TypeDefinition::persistent("Book")
            .with_property("keywords", "Set")
            .with_hints(DomainHints::new().with_has_many("keywords", "String"))]);

        let properties = resolve(&hierarchy, "Book").unwrap();
        assert!(properties["keywords"].is_basic_collection());
        assert_eq!(properties["keywords"].referenced_type.as_deref(), Some("String"));
    }

    #[test]
    fn test_unidirectional_one_to_many() {
        let hierarchy = hierarchy(vec![
            TypeDefinition::persistent("Author")
                .with_property("books", "Set")
                .with_hints(DomainHints::new().with_has_many("books", "Book")),
            TypeDefinition::persistent("Book").with_property("title", "String"),
        ]);

        let books = &resolve(&hierarchy, "Author").unwrap()["books"];
        assert!(books.is_one_to_many());
        assert!(!books.is_bidirectional());
        assert_eq!(books.reference_property_name(), None);
    }

    #[test]
    fn test_self_reference_stays_unidirectional() {
        let hierarchy = hierarchy(vec![TypeDefinition::persistent("Person")
            .with_property("spouse", "Person")]);

        let spouse = &resolve(&hierarchy, "Person").unwrap()["spouse"];
        assert!(spouse.is_one_to_one());
        assert!(!spouse.is_bidirectional());
    }

    #[test]
    fn test_bidirectional_one_to_one_with_has_one() {
        let hierarchy = hierarchy(vec![
            TypeDefinition::persistent("Book")
                .with_property("isbn", "Isbn")
                .with_hints(DomainHints::new().with_has_one("isbn", "Isbn")),
            TypeDefinition::persistent("Isbn").with_property("book", "Book"),
        ]);

        let isbn = &resolve(&hierarchy, "Book").unwrap()["isbn"];
        assert!(isbn.is_one_to_one());
        assert!(isbn.is_has_one());
        assert!(isbn.is_bidirectional());
        assert_eq!(isbn.reference_property_name(), Some("book"));

        let book = &resolve(&hierarchy, "Isbn").unwrap()["book"];
        assert!(book.is_one_to_one());
        assert!(!book.is_has_one());
        assert_eq!(book.reference_property_name(), Some("isbn"));
    }

    #[test]
    fn test_many_to_one_with_several_siblings_uses_mapped_by() {
        let hierarchy = hierarchy(vec![
            TypeDefinition::persistent("Person")
                .with_property("written", "Set")
                .with_property("edited", "Set")
                .with_hints(
                    DomainHints::new()
                        .with_has_many("written", "Book")
                        .with_has_many("edited", "Book")
                        .with_mapped_by("written", "author")
                        .with_mapped_by("edited", "editor"),
                ),
            TypeDefinition::persistent("Book")
                .with_property("author", "Person")
                .with_property("editor", "Person"),
        ]);

        let book = resolve(&hierarchy, "Book").unwrap();
        assert!(book["author"].is_many_to_one());
        assert_eq!(book["author"].reference_property_name(), Some("written"));
        assert!(book["editor"].is_many_to_one());
        assert_eq!(book["editor"].reference_property_name(), Some("edited"));

        let person = resolve(&hierarchy, "Person").unwrap();
        assert_eq!(person["written"].reference_property_name(), Some("author"));
        assert_eq!(person["edited"].reference_property_name(), Some("editor"));
    }
}
