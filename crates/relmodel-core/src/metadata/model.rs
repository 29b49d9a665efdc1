//! The model: owner of every metadata node.

use super::arena::Arena;
use super::entity_type::{EntityType, EntityTypeId};
use super::foreign_key::{DeleteBehavior, ForeignKey, ForeignKeyId};
use super::index::{Index, IndexId};
use super::key::{Key, KeyId};
use super::navigation::{Navigation, NavigationId};
use super::property::{Property, PropertyId};
use super::shape::RecordShape;
use super::source::ConfigurationSource;
use crate::annotations::{AnnotationTarget, Annotations};
use crate::config::ModelConfig;
use crate::conventions::{ConventionEvent, ConventionSet};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

/// An in-memory relational metadata model.
///
/// The model owns every entity type, property, key, foreign key, index and
/// navigation in per-kind arenas and hands out typed handles. All mutating
/// operations are all-or-nothing: if the operation or any convention it
/// triggers fails, the model is restored to its state before the call.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) config: ModelConfig,
    pub(crate) conventions: Arc<ConventionSet>,
    pub(crate) entity_types: Arena<EntityType>,
    pub(crate) entity_type_names: BTreeMap<String, EntityTypeId>,
    pub(crate) properties: Arena<Property>,
    pub(crate) keys: Arena<Key>,
    pub(crate) foreign_keys: Arena<ForeignKey>,
    pub(crate) indexes: Arena<Index>,
    pub(crate) navigations: Arena<Navigation>,
    pub(crate) annotations: Annotations,
    dispatch_depth: usize,
}

impl Model {
    /// Create an empty model with the default configuration and the
    /// built-in conventions.
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    /// Create an empty model. The built-in conventions are registered
    /// unless `config.run_conventions` is off.
    pub fn with_config(config: ModelConfig) -> Self {
        let conventions = if config.run_conventions {
            ConventionSet::default_set()
        } else {
            ConventionSet::empty()
        };
        Self::with_conventions(config, conventions)
    }

    /// Create an empty model with a custom convention set.
    pub fn with_conventions(config: ModelConfig, conventions: ConventionSet) -> Self {
        Self {
            config,
            conventions: Arc::new(conventions),
            entity_types: Arena::new(),
            entity_type_names: BTreeMap::new(),
            properties: Arena::new(),
            keys: Arena::new(),
            foreign_keys: Arena::new(),
            indexes: Arena::new(),
            navigations: Arena::new(),
            annotations: Annotations::new(),
            dispatch_depth: 0,
        }
    }

    /// The model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The registered conventions.
    pub fn conventions(&self) -> &ConventionSet {
        &self.conventions
    }

    /// Run `op` so that any failure restores the model.
    pub(crate) fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let backup = self.clone();
        let result = op(self);
        if let Err(err) = &result {
            debug!(error = %err, "rolling back model mutation");
            *self = backup;
        }
        result
    }

    /// Dispatch a convention event to every registered rule.
    pub(crate) fn dispatch(&mut self, event: ConventionEvent) -> Result<()> {
        if self.conventions.is_empty() {
            return Ok(());
        }
        if self.dispatch_depth >= self.config.max_convention_depth {
            return Err(Error::ConventionDepthExceeded {
                depth: self.config.max_convention_depth,
            });
        }

        let conventions = Arc::clone(&self.conventions);
        self.dispatch_depth += 1;
        trace!(depth = self.dispatch_depth, ?event, "dispatching convention event");
        let result = conventions.apply(self, &event);
        self.dispatch_depth -= 1;
        result
    }

    /// Dispatch `ModelFinalizing` and validate the result.
    pub fn finalize(&mut self) -> Result<()> {
        self.atomically(|m| {
            m.dispatch(ConventionEvent::ModelFinalizing)?;
            m.validate()
        })
    }

    // ---------------------------------------------------------------------
    // Node access
    // ---------------------------------------------------------------------

    pub fn entity_type(&self, id: EntityTypeId) -> Result<&EntityType> {
        self.entity_types
            .get(id)
            .ok_or(Error::StaleHandle { kind: "entity type" })
    }

    pub(crate) fn entity_type_mut(&mut self, id: EntityTypeId) -> Result<&mut EntityType> {
        self.entity_types
            .get_mut(id)
            .ok_or(Error::StaleHandle { kind: "entity type" })
    }

    pub fn property(&self, id: PropertyId) -> Result<&Property> {
        self.properties
            .get(id)
            .ok_or(Error::StaleHandle { kind: "property" })
    }

    pub(crate) fn property_mut(&mut self, id: PropertyId) -> Result<&mut Property> {
        self.properties
            .get_mut(id)
            .ok_or(Error::StaleHandle { kind: "property" })
    }

    pub fn key(&self, id: KeyId) -> Result<&Key> {
        self.keys.get(id).ok_or(Error::StaleHandle { kind: "key" })
    }

    pub(crate) fn key_mut(&mut self, id: KeyId) -> Result<&mut Key> {
        self.keys.get_mut(id).ok_or(Error::StaleHandle { kind: "key" })
    }

    pub fn foreign_key(&self, id: ForeignKeyId) -> Result<&ForeignKey> {
        self.foreign_keys
            .get(id)
            .ok_or(Error::StaleHandle { kind: "foreign key" })
    }

    pub(crate) fn foreign_key_mut(&mut self, id: ForeignKeyId) -> Result<&mut ForeignKey> {
        self.foreign_keys
            .get_mut(id)
            .ok_or(Error::StaleHandle { kind: "foreign key" })
    }

    pub fn index(&self, id: IndexId) -> Result<&Index> {
        self.indexes.get(id).ok_or(Error::StaleHandle { kind: "index" })
    }

    pub(crate) fn index_mut(&mut self, id: IndexId) -> Result<&mut Index> {
        self.indexes
            .get_mut(id)
            .ok_or(Error::StaleHandle { kind: "index" })
    }

    pub fn navigation(&self, id: NavigationId) -> Result<&Navigation> {
        self.navigations
            .get(id)
            .ok_or(Error::StaleHandle { kind: "navigation" })
    }

    pub(crate) fn navigation_mut(&mut self, id: NavigationId) -> Result<&mut Navigation> {
        self.navigations
            .get_mut(id)
            .ok_or(Error::StaleHandle { kind: "navigation" })
    }

    /// Model-level annotations.
    pub fn model_annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Model-level annotations, mutably.
    pub fn model_annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    /// Annotation store of any node.
    pub fn annotations(&self, target: AnnotationTarget) -> Result<&Annotations> {
        Ok(match target {
            AnnotationTarget::Model => &self.annotations,
            AnnotationTarget::EntityType(id) => &self.entity_type(id)?.annotations,
            AnnotationTarget::Property(id) => &self.property(id)?.annotations,
            AnnotationTarget::Key(id) => &self.key(id)?.annotations,
            AnnotationTarget::ForeignKey(id) => &self.foreign_key(id)?.annotations,
            AnnotationTarget::Index(id) => &self.index(id)?.annotations,
            AnnotationTarget::Navigation(id) => &self.navigation(id)?.annotations,
        })
    }

    /// Annotation store of any node, mutably.
    pub fn annotations_mut(&mut self, target: AnnotationTarget) -> Result<&mut Annotations> {
        Ok(match target {
            AnnotationTarget::Model => &mut self.annotations,
            AnnotationTarget::EntityType(id) => &mut self.entity_type_mut(id)?.annotations,
            AnnotationTarget::Property(id) => &mut self.property_mut(id)?.annotations,
            AnnotationTarget::Key(id) => &mut self.key_mut(id)?.annotations,
            AnnotationTarget::ForeignKey(id) => &mut self.foreign_key_mut(id)?.annotations,
            AnnotationTarget::Index(id) => &mut self.index_mut(id)?.annotations,
            AnnotationTarget::Navigation(id) => &mut self.navigation_mut(id)?.annotations,
        })
    }

    // ---------------------------------------------------------------------
    // Entity types
    // ---------------------------------------------------------------------

    /// Find an entity type by full name.
    pub fn find_entity_type(&self, name: &str) -> Option<EntityTypeId> {
        self.entity_type_names.get(name).copied()
    }

    /// Find an entity type by full name, failing when absent.
    pub fn entity_type_by_name(&self, name: &str) -> Result<EntityTypeId> {
        self.find_entity_type(name)
            .ok_or_else(|| Error::EntityTypeNotFound {
                name: name.to_string(),
            })
    }

    /// All entity types, ordered by name.
    pub fn entity_types(&self) -> Vec<EntityTypeId> {
        self.entity_type_names.values().copied().collect()
    }

    /// Add a shadow entity type (one without a record shape).
    pub fn add_entity_type(
        &mut self,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<EntityTypeId> {
        self.atomically(|m| m.add_entity_type_core(name.to_string(), None, source))
    }

    /// Add an entity type described by a record shape.
    pub fn add_entity_type_with_shape(
        &mut self,
        shape: RecordShape,
        source: ConfigurationSource,
    ) -> Result<EntityTypeId> {
        self.atomically(|m| m.add_entity_type_core(shape.name.clone(), Some(shape), source))
    }

    fn add_entity_type_core(
        &mut self,
        name: String,
        shape: Option<RecordShape>,
        source: ConfigurationSource,
    ) -> Result<EntityTypeId> {
        if self.entity_type_names.contains_key(&name) {
            return Err(Error::DuplicateEntityType { name });
        }

        let id = self
            .entity_types
            .insert(EntityType::new(name.clone(), shape, source));
        self.entity_type_names.insert(name.clone(), id);
        debug!(entity_type = %name, %source, "entity type added");

        self.dispatch(ConventionEvent::EntityTypeAdded(id))?;
        Ok(id)
    }

    /// Remove an entity type with everything it owns.
    pub fn remove_entity_type(
        &mut self,
        id: EntityTypeId,
        source: ConfigurationSource,
    ) -> Result<()> {
        self.atomically(|m| m.remove_entity_type_core(id, source))
    }

    fn remove_entity_type_core(
        &mut self,
        id: EntityTypeId,
        source: ConfigurationSource,
    ) -> Result<()> {
        let entity = self.entity_type(id)?;
        let name = entity.name.clone();
        if !source.overrides(Some(entity.source)) {
            return Err(Error::ConfigurationConflict {
                element: format!("entity type '{name}'"),
                existing: entity.source,
                requested: source,
            });
        }
        if !entity.derived_types.is_empty() {
            return Err(Error::EntityTypeInUse {
                entity_type: name,
                reason: "it has derived types".to_string(),
            });
        }
        for &fk in &entity.referencing_foreign_keys {
            let dependent = self.foreign_key(fk)?.declaring_type;
            if dependent != id {
                return Err(Error::EntityTypeInUse {
                    entity_type: name,
                    reason: format!(
                        "it is referenced by a foreign key on '{}'",
                        self.entity_type(dependent)?.name
                    ),
                });
            }
        }

        let base_type = entity.base_type;
        for fk in entity.foreign_keys.clone() {
            self.remove_foreign_key_core(fk)?;
        }

        let entity = self.entity_type(id)?;
        let navigations = entity.navigations.clone();
        let indexes = entity.indexes.clone();
        let keys = entity.keys.clone();
        let properties = entity.properties.clone();
        for nav in navigations {
            self.navigations.remove(nav);
        }
        for index in indexes {
            self.indexes.remove(index);
        }
        for key in keys {
            self.keys.remove(key);
        }
        for property in properties {
            self.properties.remove(property);
        }

        if let Some(base) = base_type {
            self.entity_type_mut(base)?.derived_types.retain(|d| *d != id);
        }
        self.entity_type_names.remove(&name);
        self.entity_types.remove(id);
        debug!(entity_type = %name, "entity type removed");

        self.dispatch(ConventionEvent::EntityTypeRemoved { name, base_type })
    }

    // ---------------------------------------------------------------------
    // Hierarchy queries
    // ---------------------------------------------------------------------

    /// Ancestors of an entity type, nearest first.
    pub fn ancestors(&self, id: EntityTypeId) -> Result<Vec<EntityTypeId>> {
        let mut result = Vec::new();
        let mut current = self.entity_type(id)?.base_type;
        while let Some(base) = current {
            if base == id || result.contains(&base) {
                return Err(Error::invariant(format!(
                    "inheritance of '{}' is circular",
                    self.entity_type(id)?.name
                )));
            }
            result.push(base);
            current = self.entity_type(base)?.base_type;
        }
        Ok(result)
    }

    /// The entity type and its ancestors, root first.
    pub(crate) fn chain_root_first(&self, id: EntityTypeId) -> Result<Vec<EntityTypeId>> {
        let mut chain = self.ancestors(id)?;
        chain.reverse();
        chain.push(id);
        Ok(chain)
    }

    /// Root of the entity type's hierarchy.
    pub fn root_of(&self, id: EntityTypeId) -> Result<EntityTypeId> {
        Ok(self.ancestors(id)?.last().copied().unwrap_or(id))
    }

    /// Check if the entity type has no base type.
    pub fn is_root(&self, id: EntityTypeId) -> Result<bool> {
        Ok(self.entity_type(id)?.base_type.is_none())
    }

    /// Check if `ancestor` is a (transitive) base type of `id`.
    pub fn inherits_from(&self, id: EntityTypeId, ancestor: EntityTypeId) -> Result<bool> {
        Ok(self.ancestors(id)?.contains(&ancestor))
    }

    /// All transitive derived types, breadth first.
    pub fn derived_types(&self, id: EntityTypeId) -> Result<Vec<EntityTypeId>> {
        let mut result = Vec::new();
        let mut queue: VecDeque<EntityTypeId> =
            self.entity_type(id)?.derived_types.iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if next == id || result.contains(&next) {
                return Err(Error::invariant("derived type links are circular"));
            }
            result.push(next);
            queue.extend(self.entity_type(next)?.derived_types.iter().copied());
        }
        Ok(result)
    }

    /// The entity type followed by all its transitive derived types.
    pub fn derived_types_inclusive(&self, id: EntityTypeId) -> Result<Vec<EntityTypeId>> {
        let mut result = vec![id];
        result.extend(self.derived_types(id)?);
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Member queries
    // ---------------------------------------------------------------------

    /// Properties declared on the entity type, in insertion order,
    /// including declarations shadowed by an ancestor.
    pub fn declared_properties(&self, id: EntityTypeId) -> Result<&[PropertyId]> {
        Ok(&self.entity_type(id)?.properties)
    }

    /// Visible properties: inherited ones first, shadowed declarations
    /// excluded.
    pub fn properties(&self, id: EntityTypeId) -> Result<Vec<PropertyId>> {
        let mut result = Vec::new();
        for ty in self.chain_root_first(id)? {
            for &p in &self.entity_type(ty)?.properties {
                if self.property(p)?.shadowed_by.is_none() {
                    result.push(p);
                }
            }
        }
        Ok(result)
    }

    /// Find a visible property by name.
    pub fn find_property(&self, id: EntityTypeId, name: &str) -> Result<Option<PropertyId>> {
        for ty in self.chain_root_first(id)? {
            for &p in &self.entity_type(ty)?.properties {
                let property = self.property(p)?;
                if property.shadowed_by.is_none() && property.name == name {
                    return Ok(Some(p));
                }
            }
        }
        Ok(None)
    }

    /// Find a property declared directly on the entity type, shadowed or not.
    pub fn find_declared_property(
        &self,
        id: EntityTypeId,
        name: &str,
    ) -> Result<Option<PropertyId>> {
        for &p in &self.entity_type(id)?.properties {
            if self.property(p)?.name == name {
                return Ok(Some(p));
            }
        }
        Ok(None)
    }

    /// Follow shadowing links to the visible property.
    pub fn resolve_property(&self, id: PropertyId) -> Result<PropertyId> {
        let mut current = id;
        let mut steps = 0;
        while let Some(next) = self.property(current)?.shadowed_by {
            steps += 1;
            if steps > self.properties.len() {
                return Err(Error::invariant("property shadowing links are circular"));
            }
            current = next;
        }
        Ok(current)
    }

    pub(crate) fn resolve_properties(&self, ids: &[PropertyId]) -> Result<Vec<PropertyId>> {
        ids.iter().map(|p| self.resolve_property(*p)).collect()
    }

    /// Navigations declared on the entity type.
    pub fn declared_navigations(&self, id: EntityTypeId) -> Result<&[NavigationId]> {
        Ok(&self.entity_type(id)?.navigations)
    }

    /// Visible navigations, inherited ones first.
    pub fn navigations(&self, id: EntityTypeId) -> Result<Vec<NavigationId>> {
        let mut result = Vec::new();
        for ty in self.chain_root_first(id)? {
            result.extend(self.entity_type(ty)?.navigations.iter().copied());
        }
        Ok(result)
    }

    /// Find a visible navigation by name.
    pub fn find_navigation(&self, id: EntityTypeId, name: &str) -> Result<Option<NavigationId>> {
        for nav in self.navigations(id)? {
            if self.navigation(nav)?.name == name {
                return Ok(Some(nav));
            }
        }
        Ok(None)
    }

    pub(crate) fn find_declared_navigation(
        &self,
        id: EntityTypeId,
        name: &str,
    ) -> Result<Option<NavigationId>> {
        for &nav in &self.entity_type(id)?.navigations {
            if self.navigation(nav)?.name == name {
                return Ok(Some(nav));
            }
        }
        Ok(None)
    }

    /// Keys declared on the entity type.
    pub fn declared_keys(&self, id: EntityTypeId) -> Result<&[KeyId]> {
        Ok(&self.entity_type(id)?.keys)
    }

    /// Visible keys, inherited ones first.
    pub fn keys(&self, id: EntityTypeId) -> Result<Vec<KeyId>> {
        let mut result = Vec::new();
        for ty in self.chain_root_first(id)? {
            result.extend(self.entity_type(ty)?.keys.iter().copied());
        }
        Ok(result)
    }

    /// Primary key of the entity type's hierarchy.
    pub fn primary_key(&self, id: EntityTypeId) -> Result<Option<KeyId>> {
        let root = self.root_of(id)?;
        Ok(self.entity_type(root)?.primary_key)
    }

    /// Check if the key is the primary key of its hierarchy.
    pub fn is_primary_key(&self, key: KeyId) -> Result<bool> {
        let declaring = self.key(key)?.declaring_type;
        Ok(self.entity_type(declaring)?.primary_key == Some(key))
    }

    /// Indexes declared on the entity type.
    pub fn declared_indexes(&self, id: EntityTypeId) -> Result<&[IndexId]> {
        Ok(&self.entity_type(id)?.indexes)
    }

    /// Visible indexes, inherited ones first.
    pub fn indexes(&self, id: EntityTypeId) -> Result<Vec<IndexId>> {
        let mut result = Vec::new();
        for ty in self.chain_root_first(id)? {
            result.extend(self.entity_type(ty)?.indexes.iter().copied());
        }
        Ok(result)
    }

    /// Foreign keys declared on the entity type.
    pub fn declared_foreign_keys(&self, id: EntityTypeId) -> Result<&[ForeignKeyId]> {
        Ok(&self.entity_type(id)?.foreign_keys)
    }

    /// Visible foreign keys, inherited ones first.
    pub fn foreign_keys(&self, id: EntityTypeId) -> Result<Vec<ForeignKeyId>> {
        let mut result = Vec::new();
        for ty in self.chain_root_first(id)? {
            result.extend(self.entity_type(ty)?.foreign_keys.iter().copied());
        }
        Ok(result)
    }

    /// Foreign keys whose principal is exactly this entity type.
    pub fn declared_referencing_foreign_keys(&self, id: EntityTypeId) -> Result<&[ForeignKeyId]> {
        Ok(&self.entity_type(id)?.referencing_foreign_keys)
    }

    /// Foreign keys whose principal is the entity type or an ancestor.
    pub fn referencing_foreign_keys(&self, id: EntityTypeId) -> Result<Vec<ForeignKeyId>> {
        let mut result = Vec::new();
        for ty in self.chain_root_first(id)? {
            result.extend(self.entity_type(ty)?.referencing_foreign_keys.iter().copied());
        }
        Ok(result)
    }

    /// Whether each dependent has at most one principal and vice versa:
    /// the dependent properties form a key of the dependent hierarchy.
    pub fn foreign_key_is_unique(&self, fk: ForeignKeyId) -> Result<bool> {
        let foreign_key = self.foreign_key(fk)?;
        let mut resolved = self.resolve_properties(&foreign_key.properties)?;
        resolved.sort();
        for key in self.keys(foreign_key.declaring_type)? {
            let mut key_properties = self.resolve_properties(&self.key(key)?.properties)?;
            key_properties.sort();
            if key_properties == resolved {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether every dependent property is non-nullable.
    pub fn foreign_key_is_required(&self, fk: ForeignKeyId) -> Result<bool> {
        for &p in &self.foreign_key(fk)?.properties {
            if self.property(p)?.is_nullable {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Effective delete behavior: the configured one, else Cascade for
    /// required foreign keys and SetNull for optional ones.
    pub fn delete_behavior(&self, fk: ForeignKeyId) -> Result<DeleteBehavior> {
        if let Some(behavior) = self.foreign_key(fk)?.delete_behavior {
            return Ok(behavior);
        }
        Ok(if self.foreign_key_is_required(fk)? {
            DeleteBehavior::Cascade
        } else {
            DeleteBehavior::SetNull
        })
    }

    /// A principal-side navigation is a collection unless its foreign key
    /// is unique.
    pub fn navigation_is_collection(&self, nav: NavigationId) -> Result<bool> {
        let navigation = self.navigation(nav)?;
        if navigation.is_on_dependent {
            return Ok(false);
        }
        Ok(!self.foreign_key_is_unique(navigation.foreign_key)?)
    }

    /// The navigation on the other end of the same foreign key.
    pub fn inverse_navigation(&self, nav: NavigationId) -> Result<Option<NavigationId>> {
        let navigation = self.navigation(nav)?;
        let foreign_key = self.foreign_key(navigation.foreign_key)?;
        Ok(foreign_key.navigation(navigation.is_on_dependent))
    }

    /// Strongest source that ignored `name` on the entity type or an
    /// ancestor.
    pub fn is_ignored(&self, id: EntityTypeId, name: &str) -> Result<Option<ConfigurationSource>> {
        let mut result: Option<ConfigurationSource> = None;
        for ty in self.chain_root_first(id)? {
            if let Some(source) = self.entity_type(ty)?.ignored.get(name) {
                result = Some(source.max_with(result));
            }
        }
        Ok(result)
    }

    /// Render a property list for error messages.
    pub(crate) fn describe_properties(&self, properties: &[PropertyId]) -> String {
        let names: Vec<&str> = properties
            .iter()
            .map(|p| {
                self.properties
                    .get(*p)
                    .map(|prop| prop.name.as_str())
                    .unwrap_or("<removed>")
            })
            .collect();
        format!("{{{}}}", names.join(", "))
    }

    pub(crate) fn entity_name(&self, id: EntityTypeId) -> String {
        self.entity_types
            .get(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| "<removed>".to_string())
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
