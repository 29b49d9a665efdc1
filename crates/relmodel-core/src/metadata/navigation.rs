//! Navigations.

use super::arena::Handle;
use super::entity_type::EntityTypeId;
use super::foreign_key::ForeignKeyId;
use super::source::ConfigurationSource;
use crate::annotations::Annotations;

/// Handle to a [`Navigation`].
pub type NavigationId = Handle<Navigation>;

/// A named traversal along a foreign key, declared on either end.
#[derive(Debug, Clone)]
pub struct Navigation {
    pub(crate) name: String,
    pub(crate) declaring_type: EntityTypeId,
    pub(crate) foreign_key: ForeignKeyId,
    pub(crate) is_on_dependent: bool,
    pub(crate) source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Navigation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> EntityTypeId {
        self.declaring_type
    }

    /// The foreign key this navigation traverses.
    pub fn foreign_key(&self) -> ForeignKeyId {
        self.foreign_key
    }

    /// Whether the navigation points from the dependent to the principal.
    pub fn is_on_dependent(&self) -> bool {
        self.is_on_dependent
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.source
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}
