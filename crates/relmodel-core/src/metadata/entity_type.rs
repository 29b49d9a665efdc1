//! Entity types.

use super::arena::Handle;
use super::foreign_key::ForeignKeyId;
use super::index::IndexId;
use super::key::KeyId;
use super::navigation::NavigationId;
use super::property::PropertyId;
use super::shape::RecordShape;
use super::source::ConfigurationSource;
use crate::annotations::Annotations;
use std::collections::BTreeMap;

/// Handle to an [`EntityType`].
pub type EntityTypeId = Handle<EntityType>;

/// The display name of an entity type: the last `.`-separated segment.
pub fn display_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// A relationship configured on a dependent type by a non-convention
/// source. Intents are replayed when the type leaves a hierarchy so an
/// explicitly configured relationship that was only reachable through the
/// old base type is recreated on the type itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipIntent {
    /// Principal entity type name.
    pub principal: String,
    /// Dependent property names; empty when left to naming rules.
    pub dependent_properties: Vec<String>,
    /// Navigation on the dependent.
    pub navigation_to_principal: Option<String>,
    /// Navigation on the principal.
    pub navigation_to_dependents: Option<String>,
    /// Source of the configuration.
    pub source: ConfigurationSource,
}

/// A named entity type of the model.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub(crate) name: String,
    pub(crate) shape: Option<RecordShape>,
    pub(crate) source: ConfigurationSource,
    pub(crate) base_type: Option<EntityTypeId>,
    pub(crate) base_type_source: Option<ConfigurationSource>,
    pub(crate) derived_types: Vec<EntityTypeId>,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) keys: Vec<KeyId>,
    pub(crate) primary_key: Option<KeyId>,
    pub(crate) primary_key_source: Option<ConfigurationSource>,
    pub(crate) demoted_primary_key: Option<(KeyId, ConfigurationSource)>,
    pub(crate) indexes: Vec<IndexId>,
    pub(crate) foreign_keys: Vec<ForeignKeyId>,
    pub(crate) referencing_foreign_keys: Vec<ForeignKeyId>,
    pub(crate) navigations: Vec<NavigationId>,
    pub(crate) ignored: BTreeMap<String, ConfigurationSource>,
    pub(crate) relationship_intents: Vec<RelationshipIntent>,
    /// Source of each discriminator configuration, keyed by the layered
    /// annotation key it was written under.
    pub(crate) discriminator_sources: BTreeMap<String, ConfigurationSource>,
    pub(crate) next_shadow_index: i32,
    pub(crate) declarations_applied: bool,
    pub(crate) annotations: Annotations,
}

impl EntityType {
    pub(crate) fn new(
        name: String,
        shape: Option<RecordShape>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            name,
            shape,
            source,
            base_type: None,
            base_type_source: None,
            derived_types: Vec::new(),
            properties: Vec::new(),
            keys: Vec::new(),
            primary_key: None,
            primary_key_source: None,
            demoted_primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            referencing_foreign_keys: Vec::new(),
            navigations: Vec::new(),
            ignored: BTreeMap::new(),
            relationship_intents: Vec::new(),
            discriminator_sources: BTreeMap::new(),
            next_shadow_index: 0,
            declarations_applied: false,
            annotations: Annotations::new(),
        }
    }

    /// Full name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last segment of the name.
    pub fn display_name(&self) -> &str {
        display_name(&self.name)
    }

    /// Record shape, absent for shadow types.
    pub fn shape(&self) -> Option<&RecordShape> {
        self.shape.as_ref()
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.source
    }

    /// Direct base type.
    pub fn base_type(&self) -> Option<EntityTypeId> {
        self.base_type
    }

    pub fn base_type_source(&self) -> Option<ConfigurationSource> {
        self.base_type_source
    }

    /// Direct derived types, ordered by name.
    pub fn direct_derived_types(&self) -> &[EntityTypeId] {
        &self.derived_types
    }

    /// Primary key declared on this type. Only roots have one.
    pub fn declared_primary_key(&self) -> Option<KeyId> {
        self.primary_key
    }

    pub fn primary_key_source(&self) -> Option<ConfigurationSource> {
        self.primary_key_source
    }

    /// Members ignored on this type and the source that ignored them.
    pub fn ignored_members(&self) -> impl Iterator<Item = (&str, ConfigurationSource)> {
        self.ignored.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Relationships configured on this type by explicit or declarative
    /// sources.
    pub fn relationship_intents(&self) -> &[RelationshipIntent] {
        &self.relationship_intents
    }

    /// Strongest source that configured a discriminator in any annotation
    /// layer.
    pub fn discriminator_source(&self) -> Option<ConfigurationSource> {
        self.discriminator_sources.values().copied().max()
    }

    /// Source of the discriminator configured under one layered annotation
    /// key, e.g. `Relational:DiscriminatorProperty`.
    pub fn discriminator_source_in(&self, key: &str) -> Option<ConfigurationSource> {
        self.discriminator_sources.get(key).copied()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub(crate) fn take_shadow_index(&mut self) -> i32 {
        let index = self.next_shadow_index;
        self.next_shadow_index += 1;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("Shop.Sales.Order"), "Order");
        assert_eq!(display_name("Order"), "Order");
        assert_eq!(display_name(""), "");
    }
}
