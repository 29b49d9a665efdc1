//! Properties.

use super::arena::Handle;
use super::entity_type::EntityTypeId;
use super::source::ConfigurationSource;
use super::types::ValueType;
use crate::annotations::Annotations;
use serde::{Deserialize, Serialize};

/// Handle to a [`Property`].
pub type PropertyId = Handle<Property>;

/// Shadow index of a property backed by a record member.
pub const NO_SHADOW_INDEX: i32 = -1;

/// When the store generates a value for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueGenerated {
    /// Values always come from the application.
    #[default]
    Never,
    /// A value is generated on insert.
    OnAdd,
    /// A value is generated on insert and update.
    OnAddOrUpdate,
}

/// A scalar attribute of an entity type.
#[derive(Debug, Clone)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) declaring_type: EntityTypeId,
    pub(crate) value_type: ValueType,
    pub(crate) is_nullable: bool,
    pub(crate) value_generated: ValueGenerated,
    pub(crate) is_concurrency_token: bool,
    pub(crate) requires_value_generator: bool,
    pub(crate) shadow_index: i32,
    pub(crate) shadowed_by: Option<PropertyId>,
    pub(crate) source: ConfigurationSource,
    pub(crate) annotations: Annotations,
}

impl Property {
    pub(crate) fn new(
        name: &str,
        declaring_type: EntityTypeId,
        value_type: ValueType,
        shadow_index: i32,
        source: ConfigurationSource,
    ) -> Self {
        Self {
            name: name.to_string(),
            declaring_type,
            value_type,
            is_nullable: value_type.optional,
            value_generated: ValueGenerated::Never,
            is_concurrency_token: false,
            requires_value_generator: false,
            shadow_index,
            shadowed_by: None,
            source,
            annotations: Annotations::new(),
        }
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity type that declares the property.
    pub fn declaring_type(&self) -> EntityTypeId {
        self.declaring_type
    }

    /// Value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Whether the property may hold null.
    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn value_generated(&self) -> ValueGenerated {
        self.value_generated
    }

    pub fn is_concurrency_token(&self) -> bool {
        self.is_concurrency_token
    }

    pub fn requires_value_generator(&self) -> bool {
        self.requires_value_generator
    }

    /// Position among the entity type's shadow properties, or
    /// [`NO_SHADOW_INDEX`] when backed by a record member.
    pub fn shadow_index(&self) -> i32 {
        self.shadow_index
    }

    /// Check if the property has no backing record member.
    pub fn is_shadow(&self) -> bool {
        self.shadow_index >= 0
    }

    /// The ancestor property hiding this declaration, if any.
    pub fn shadowed_by(&self) -> Option<PropertyId> {
        self.shadowed_by
    }

    pub fn configuration_source(&self) -> ConfigurationSource {
        self.source
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}
