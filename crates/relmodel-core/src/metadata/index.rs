//! Indexes.

use super::arena::Handle;
use super::entity_type::EntityTypeId;
use super::property::PropertyId;
use super::source::ConfigurationSource;
use crate::annotations::Annotations;

/// Handle to an [`Index`].
pub type IndexId = Handle<Index>;

/// An ordered list of properties to index.
#[derive(Debug, Clone)]
pub struct Index {
    pub(crate) declaring_type: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) is_unique: bool,
    pub(crate) source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Index {
    pub(crate) fn new(
        declaring_type: EntityTypeId,
        properties: Vec<PropertyId>,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            declaring_type,
            properties,
            is_unique: false,
            source,
            annotations: Annotations::new(),
        }
    }

    pub fn declaring_type(&self) -> EntityTypeId {
        self.declaring_type
    }

    /// Indexed properties in declared order.
    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn is_unique(&self) -> bool {
        self.is_unique
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.source
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}
