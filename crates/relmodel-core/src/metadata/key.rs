//! Keys.

use super::arena::Handle;
use super::entity_type::EntityTypeId;
use super::property::PropertyId;
use super::source::ConfigurationSource;
use crate::annotations::Annotations;

/// Handle to a [`Key`].
pub type KeyId = Handle<Key>;

/// An ordered, non-empty list of properties that uniquely identifies
/// instances of its entity type.
#[derive(Debug, Clone)]
pub struct Key {
    pub(crate) declaring_type: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Key {
    pub(crate) fn new(
        declaring_type: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            declaring_type,
            properties,
            source,
            annotations: Annotations::new(),
        }
    }

    pub fn declaring_type(&self) -> EntityTypeId {
        self.declaring_type
    }

    /// Key properties in key order.
    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.source
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}
