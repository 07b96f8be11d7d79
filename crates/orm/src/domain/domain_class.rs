//! Resolved domain classes

use crate::config::OrmConfig;
use crate::constraints::{evaluate_constraints, ConstrainedProperty, ConstraintSpec, CustomValidator, FieldError};
use crate::domain::extractor::TypeKind;
use crate::domain::hierarchy::TypeModel;
use crate::domain::property::{PropertyDescriptor, PropertyShape};
use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use trellis_core::naming::property_name;

/// Instance-level validation run after the property constraints
pub type InstanceValidator = Arc<dyn Fn(&Value) -> Vec<FieldError> + Send + Sync>;

/// A domain type with its relationships resolved
#[derive(Clone)]
pub struct DomainClass {
    name: String,
    superclass: Option<String>,
    is_abstract: bool,
    kind: TypeKind,
    root: bool,
    properties: IndexMap<String, PropertyDescriptor>,
    identifier: String,
    version: String,
    owners: Vec<String>,
    embedded: Vec<String>,
    has_many: IndexMap<String, String>,
    mapped_by: IndexMap<String, String>,
    mapping_strategy: String,
    constraint_specs: IndexMap<String, ConstraintSpec>,
    property_validators: IndexMap<String, CustomValidator>,
    default_constraints: IndexMap<String, ConstraintSpec>,
    constraints: OnceCell<IndexMap<String, ConstrainedProperty>>,
    sub_classes: Vec<String>,
    validator: Option<InstanceValidator>,
}

impl DomainClass {
    /// Assemble a domain class from its merged model and resolved properties.
    ///
    /// `root` is false when the class extends a registered concrete type.
    pub fn new(
        model: &TypeModel,
        properties: IndexMap<String, PropertyDescriptor>,
        root: bool,
        config: &OrmConfig,
    ) -> ModelResult<Self> {
        let identifier = properties
            .values()
            .find(|p| p.identity)
            .map(|p| p.name.clone())
            .ok_or_else(|| ModelError::MissingIdentifier {
                type_name: model.name.clone(),
            })?;
        let version = properties
            .values()
            .find(|p| p.version)
            .map(|p| p.name.clone())
            .ok_or_else(|| ModelError::MissingVersion {
                type_name: model.name.clone(),
            })?;

        Ok(Self {
            name: model.name.clone(),
            superclass: model.superclass.clone(),
            is_abstract: model.is_abstract,
            kind: model.kind,
            root,
            properties,
            identifier,
            version,
            owners: model.owners().into_iter().map(str::to_string).collect(),
            embedded: model.hints.embedded.clone(),
            has_many: model.hints.has_many.clone(),
            mapped_by: model.hints.mapped_by.clone(),
            mapping_strategy: model
                .hints
                .mapping_strategy
                .clone()
                .unwrap_or_else(|| config.mapping_strategy.clone()),
            constraint_specs: model.hints.constraints.clone(),
            property_validators: model.hints.validators.clone(),
            default_constraints: config.default_constraints.clone(),
            constraints: OnceCell::new(),
            sub_classes: Vec::new(),
            validator: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-camel form of the class name, e.g. `bookAuthor`
    pub fn property_name(&self) -> String {
        property_name(&self.name)
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    /// All properties, in declaration order
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    pub fn identifier(&self) -> &PropertyDescriptor {
        &self.properties[&self.identifier]
    }

    pub fn version(&self) -> &PropertyDescriptor {
        &self.properties[&self.version]
    }

    /// Properties stored by the persistence layer, without identity and version
    pub fn persistent_properties(&self) -> Vec<&PropertyDescriptor> {
        self.properties
            .values()
            .filter(|p| p.persistent && !p.identity && !p.version && p.shape != PropertyShape::Object)
            .collect()
    }

    pub fn has_persistent_property(&self, name: &str) -> bool {
        self.persistent_properties().iter().any(|p| p.name == name)
    }

    pub fn get_property_by_name(&self, name: &str) -> ModelResult<&PropertyDescriptor> {
        self.properties
            .get(name)
            .ok_or_else(|| ModelError::unknown_property(&self.name, name))
    }

    pub fn is_one_to_many(&self, name: &str) -> ModelResult<bool> {
        Ok(self.get_property_by_name(name)?.is_one_to_many())
    }

    pub fn is_many_to_one(&self, name: &str) -> ModelResult<bool> {
        Ok(self.get_property_by_name(name)?.is_many_to_one())
    }

    pub fn is_bidirectional(&self, name: &str) -> ModelResult<bool> {
        Ok(self.get_property_by_name(name)?.is_bidirectional())
    }

    /// Related type of a collection property, from `hasMany`
    pub fn related_type(&self, name: &str) -> Option<&str> {
        self.has_many.get(name).map(String::as_str)
    }

    pub fn owners(&self) -> &[String] {
        &self.owners
    }

    pub fn is_owning_class(&self, type_name: &str) -> bool {
        self.owners.iter().any(|o| o == type_name)
    }

    pub fn embedded(&self) -> &[String] {
        &self.embedded
    }

    pub fn mapped_by(&self) -> &IndexMap<String, String> {
        &self.mapped_by
    }

    pub fn mapping_strategy(&self) -> &str {
        &self.mapping_strategy
    }

    pub fn set_mapping_strategy(&mut self, strategy: impl Into<String>) {
        self.mapping_strategy = strategy.into();
    }

    pub fn sub_classes(&self) -> &[String] {
        &self.sub_classes
    }

    pub fn has_sub_classes(&self) -> bool {
        !self.sub_classes.is_empty()
    }

    pub fn add_sub_class(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.sub_classes.contains(&name) {
            self.sub_classes.push(name);
        }
    }

    pub fn validator(&self) -> Option<&InstanceValidator> {
        self.validator.as_ref()
    }

    pub fn set_validator(&mut self, validator: InstanceValidator) {
        self.validator = Some(validator);
    }

    /// Constraints of the persistent properties, computed on first use
    pub fn constrained_properties(&self) -> ModelResult<&IndexMap<String, ConstrainedProperty>> {
        self.constraints.get_or_try_init(|| self.evaluate_constraints())
    }

    /// Recompute the constraint map from the current inputs
    pub fn refresh_constraints(&mut self) -> ModelResult<()> {
        let constraints = self.evaluate_constraints()?;
        self.constraints = OnceCell::with_value(constraints);
        Ok(())
    }

    /// Replace the default-constraints table; the constraint map is rebuilt on next use
    pub fn set_default_constraints(&mut self, defaults: IndexMap<String, ConstraintSpec>) {
        self.default_constraints = defaults;
        self.constraints = OnceCell::new();
    }

    /// Check `instance` against every constraint and the instance validator
    pub fn validate(&self, instance: &Value) -> ModelResult<Vec<FieldError>> {
        let mut errors = Vec::new();
        for constrained in self.constrained_properties()?.values() {
            errors.extend(constrained.validate(instance)?);
        }
        if let Some(validator) = &self.validator {
            errors.extend(validator(instance));
        }

        debug!("Validated {} instance: {} error(s)", self.name, errors.len());
        Ok(errors)
    }

    fn evaluate_constraints(&self) -> ModelResult<IndexMap<String, ConstrainedProperty>> {
        evaluate_constraints(
            &self.name,
            self.persistent_properties(),
            &self.constraint_specs,
            &self.property_validators,
            &self.default_constraints,
        )
    }
}

impl fmt::Debug for DomainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainClass")
            .field("name", &self.name)
            .field("superclass", &self.superclass)
            .field("root", &self.root)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("owners", &self.owners)
            .field("mapping_strategy", &self.mapping_strategy)
            .field("sub_classes", &self.sub_classes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extractor::{PropertyExtractor, TypeDefinition};
    use crate::domain::hierarchy::TypeHierarchy;
    use crate::domain::hints::DomainHints;
    use serde_json::json;

    fn build(definition: TypeDefinition, config: &OrmConfig) -> DomainClass {
        let definitions = IndexMap::from([(definition.name.clone(), definition)]);
        let hierarchy = TypeHierarchy::build(&definitions).unwrap();
        let model = hierarchy.models().next().unwrap();
        let properties = PropertyExtractor::new()
            .extract(&model.name, &model.properties, &model.hints.transients, true)
            .unwrap();
        DomainClass::new(model, properties, true, config).unwrap()
    }

    fn book() -> TypeDefinition {
        TypeDefinition::persistent("Book")
            .with_property("title", "String")
            .with_property("payload", "Object")
            .with_property("summary", "String")
            .with_hints(
                DomainHints::new()
                    .with_transients(&["summary"])
                    .with_constraint("title", ConstraintSpec::new().with_max_size(10)),
            )
    }

    #[test]
    fn test_persistent_properties() {
        let class = build(book(), &OrmConfig::default());

        assert_eq!(class.identifier().name, "id");
        assert_eq!(class.version().name, "version");
        let persistent: Vec<_> = class.persistent_properties().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(persistent, vec!["title"]);
        assert!(!class.has_persistent_property("id"));
        assert_eq!(class.property_name(), "book");
    }

    #[test]
    fn test_unknown_property() {
        let class = build(book(), &OrmConfig::default());
        let err = class.get_property_by_name("isbn").unwrap_err();
        assert_eq!(err.to_string(), "No property found for name [isbn] for class [Book]");
        assert!(class.is_one_to_many("isbn").is_err());
    }

    #[test]
    fn test_mapping_strategy() {
        let mut class = build(book(), &OrmConfig::default());
        assert_eq!(class.mapping_strategy(), "GORM");
        class.set_mapping_strategy("JPA");
        assert_eq!(class.mapping_strategy(), "JPA");

        let class = build(
            book().with_hints(DomainHints::new().with_mapping_strategy("Custom")),
            &OrmConfig::default(),
        );
        assert_eq!(class.mapping_strategy(), "Custom");
    }

    #[test]
    fn test_constraints_are_cached_and_refreshable() {
        let mut class = build(book(), &OrmConfig::default());

        let first = class.constrained_properties().unwrap().clone();
        assert!(!first["title"].is_nullable());
        assert_eq!(first.keys().collect::<Vec<_>>(), vec!["title"]);

        class.refresh_constraints().unwrap();
        assert_eq!(class.constrained_properties().unwrap(), &first);
        class.refresh_constraints().unwrap();
        assert_eq!(class.constrained_properties().unwrap(), &first);

        let mut defaults = IndexMap::new();
        defaults.insert("*".to_string(), ConstraintSpec::new().with_nullable(true));
        class.set_default_constraints(defaults);
        assert!(class.constrained_properties().unwrap()["title"].is_nullable());
    }

    #[test]
    fn test_validate_instance() {
        let mut class = build(book(), &OrmConfig::default());

        let errors = class.validate(&json!({"title": "A very long title"})).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "book.title.maxSize.error");

        let errors = class.validate(&json!({})).unwrap();
        assert_eq!(errors[0].code(), "book.title.nullable.error");

        class.set_validator(Arc::new(|instance| {
            if instance.get("title") == Some(&json!("Forbidden")) {
                vec![FieldError {
                    object_name: "Book".to_string(),
                    field: "title".to_string(),
                    rejected_value: json!("Forbidden"),
                    codes: vec!["book.title.forbidden".to_string()],
                    arguments: Vec::new(),
                    default_message: "Forbidden title".to_string(),
                }]
            } else {
                Vec::new()
            }
        }));
        assert!(class.validator().is_some());
        let errors = class.validate(&json!({"title": "Forbidden"})).unwrap();
        assert_eq!(errors[0].code(), "book.title.forbidden");
    }

    #[test]
    fn test_sub_classes() {
        let mut class = build(book(), &OrmConfig::default());
        assert!(!class.has_sub_classes());
        class.add_sub_class("Novel");
        class.add_sub_class("Novel");
        assert_eq!(class.sub_classes(), &["Novel".to_string()]);
    }
}
