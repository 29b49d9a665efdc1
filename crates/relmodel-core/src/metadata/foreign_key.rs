//! Foreign keys.

use super::arena::Handle;
use super::entity_type::EntityTypeId;
use super::key::KeyId;
use super::navigation::NavigationId;
use super::property::PropertyId;
use super::source::ConfigurationSource;
use crate::annotations::Annotations;
use serde::{Deserialize, Serialize};

/// Handle to a [`ForeignKey`].
pub type ForeignKeyId = Handle<ForeignKey>;

/// Behavior when a principal is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeleteBehavior {
    /// Delete dependents.
    Cascade,
    /// Prevent deletion while dependents exist.
    Restrict,
    /// Set the dependent's foreign key to null.
    SetNull,
}

/// A dependency of one entity type (the dependent) on a key of another
/// (the principal).
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub(crate) declaring_type: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) principal_type: EntityTypeId,
    pub(crate) principal_key: KeyId,
    pub(crate) delete_behavior: Option<DeleteBehavior>,
    pub(crate) dependent_to_principal: Option<NavigationId>,
    pub(crate) principal_to_dependent: Option<NavigationId>,
    pub(crate) source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl ForeignKey {
    pub(crate) fn new(
        declaring_type: EntityTypeId,
        properties: Vec<PropertyId>,
        principal_type: EntityTypeId,
        principal_key: KeyId,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            declaring_type,
            properties,
            principal_type,
            principal_key,
            delete_behavior: None,
            dependent_to_principal: None,
            principal_to_dependent: None,
            source,
            annotations: Annotations::new(),
        }
    }

    /// The dependent entity type.
    pub fn declaring_type(&self) -> EntityTypeId {
        self.declaring_type
    }

    /// Dependent properties, positionally matching the principal key.
    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn principal_type(&self) -> EntityTypeId {
        self.principal_type
    }

    pub fn principal_key(&self) -> KeyId {
        self.principal_key
    }

    /// Navigation declared on the dependent.
    pub fn dependent_to_principal(&self) -> Option<NavigationId> {
        self.dependent_to_principal
    }

    /// Navigation declared on the principal.
    pub fn principal_to_dependent(&self) -> Option<NavigationId> {
        self.principal_to_dependent
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.source
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Navigation on the given side.
    pub(crate) fn navigation(&self, on_principal_side: bool) -> Option<NavigationId> {
        if on_principal_side {
            self.principal_to_dependent
        } else {
            self.dependent_to_principal
        }
    }

    pub(crate) fn navigation_slot(&mut self, on_principal_side: bool) -> &mut Option<NavigationId> {
        if on_principal_side {
            &mut self.principal_to_dependent
        } else {
            &mut self.dependent_to_principal
        }
    }
}
