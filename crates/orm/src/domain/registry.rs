//! Domain class registration and building

use crate::config::OrmConfig;
use crate::domain::domain_class::DomainClass;
use crate::domain::extractor::{PropertyExtractor, TypeDefinition};
use crate::domain::hierarchy::{TypeHierarchy, TypeModel};
use crate::domain::resolver::RelationshipResolver;
use crate::error::{ModelError, ModelResult};
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, info};

/// Holds raw type definitions and the domain classes built from them
#[derive(Debug, Default)]
pub struct DomainRegistry {
    config: OrmConfig,
    extractor: PropertyExtractor,
    definitions: IndexMap<String, TypeDefinition>,
    hierarchy: TypeHierarchy,
    classes: IndexMap<String, DomainClass>,
}

impl DomainRegistry {
    pub fn new(config: OrmConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_extractor(mut self, extractor: PropertyExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn register(&mut self, definition: TypeDefinition) -> ModelResult<()> {
        if self.definitions.contains_key(&definition.name) {
            return Err(ModelError::DuplicateType {
                type_name: definition.name,
            });
        }
        debug!("Registered domain type {}", definition.name);
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn register_all(&mut self, definitions: impl IntoIterator<Item = TypeDefinition>) -> ModelResult<()> {
        definitions.into_iter().try_for_each(|d| self.register(d))
    }

    /// Register every definition in a YAML sequence
    pub fn register_yaml(&mut self, yaml: &str) -> ModelResult<()> {
        self.register_all(TypeDefinition::all_from_yaml_str(yaml)?)
    }

    pub fn register_yaml_file(&mut self, path: impl AsRef<Path>) -> ModelResult<()> {
        self.register_all(TypeDefinition::all_from_yaml_file(path)?)
    }

    /// Resolve the hierarchy and build every entity, in registration order.
    ///
    /// All types must be registered first: resolution reads the hints of
    /// related types.
    pub fn build(&mut self) -> ModelResult<()> {
        self.check_owner_references()?;

        let hierarchy = TypeHierarchy::build(&self.definitions)?;
        let resolver = RelationshipResolver::new(&hierarchy);
        let mut classes = IndexMap::new();

        for model in hierarchy.models().filter(|m| m.is_entity()) {
            let mut properties =
                self.extractor
                    .extract(&model.name, &model.properties, &model.hints.transients, true)?;
            resolver.resolve(model, &mut properties)?;

            let root = is_root(model, &hierarchy);
            let class = DomainClass::new(model, properties, root, &self.config)?;
            classes.insert(model.name.clone(), class);
        }

        for model in hierarchy.models() {
            for ancestor in &model.ancestors {
                if let Some(parent) = classes.get_mut(ancestor) {
                    parent.add_sub_class(model.name.as_str());
                }
            }
        }

        info!("Built {} domain classes", classes.len());
        self.hierarchy = hierarchy;
        self.classes = classes;
        Ok(())
    }

    pub fn get(&self, name: &str) -> ModelResult<&DomainClass> {
        self.classes
            .get(name)
            .ok_or_else(|| ModelError::unknown_type(name))
    }

    pub fn get_mut(&mut self, name: &str) -> ModelResult<&mut DomainClass> {
        self.classes
            .get_mut(name)
            .ok_or_else(|| ModelError::unknown_type(name))
    }

    pub fn is_domain_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &DomainClass> {
        self.classes.values()
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    fn check_owner_references(&self) -> ModelResult<()> {
        for definition in self.definitions.values() {
            if let Some(unknown) = definition
                .hints
                .owners()
                .into_iter()
                .find(|owner| !self.definitions.contains_key(*owner))
            {
                return Err(ModelError::unknown_type(unknown));
            }
        }
        Ok(())
    }
}

/// A class is a root unless it extends a registered concrete type
fn is_root(model: &TypeModel, hierarchy: &TypeHierarchy) -> bool {
    match model.superclass.as_deref().and_then(|s| hierarchy.get(s)) {
        Some(parent) => parent.is_abstract,
        None => true,
    }
}
