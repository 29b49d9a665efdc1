//! Model change events delivered to conventions.

use crate::metadata::{EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId};

/// A change that just happened to the model.
///
/// Events for removed nodes carry names instead of handles, since the
/// handles no longer resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConventionEvent {
    EntityTypeAdded(EntityTypeId),
    EntityTypeRemoved {
        name: String,
        base_type: Option<EntityTypeId>,
    },
    /// The base type of `entity_type` changed from `previous`.
    BaseTypeChanged {
        entity_type: EntityTypeId,
        previous: Option<EntityTypeId>,
    },
    MemberIgnored {
        entity_type: EntityTypeId,
        name: String,
    },
    MemberUnignored {
        entity_type: EntityTypeId,
        name: String,
    },
    PropertyAdded(PropertyId),
    /// A facet of the property changed: nullability, value generation or
    /// concurrency.
    PropertyChanged(PropertyId),
    PropertyRemoved {
        entity_type: EntityTypeId,
        name: String,
    },
    KeyAdded(KeyId),
    /// The primary key of `entity_type` changed; `previous` may already be
    /// removed.
    PrimaryKeyChanged {
        entity_type: EntityTypeId,
        previous: Option<KeyId>,
    },
    ForeignKeyAdded(ForeignKeyId),
    /// A foreign key declared on `entity_type` over `properties` was removed.
    ForeignKeyRemoved {
        entity_type: EntityTypeId,
        properties: Vec<PropertyId>,
    },
    NavigationAdded(NavigationId),
    NavigationRemoved {
        entity_type: EntityTypeId,
        name: String,
    },
    IndexAdded(IndexId),
    IndexUniquenessChanged(IndexId),
    /// The model is about to be validated.
    ModelFinalizing,
}

impl ConventionEvent {
    /// Short name of the event kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ConventionEvent::EntityTypeAdded(_) => "entity_type_added",
            ConventionEvent::EntityTypeRemoved { .. } => "entity_type_removed",
            ConventionEvent::BaseTypeChanged { .. } => "base_type_changed",
            ConventionEvent::MemberIgnored { .. } => "member_ignored",
            ConventionEvent::MemberUnignored { .. } => "member_unignored",
            ConventionEvent::PropertyAdded(_) => "property_added",
            ConventionEvent::PropertyChanged(_) => "property_changed",
            ConventionEvent::PropertyRemoved { .. } => "property_removed",
            ConventionEvent::KeyAdded(_) => "key_added",
            ConventionEvent::PrimaryKeyChanged { .. } => "primary_key_changed",
            ConventionEvent::ForeignKeyAdded(_) => "foreign_key_added",
            ConventionEvent::ForeignKeyRemoved { .. } => "foreign_key_removed",
            ConventionEvent::NavigationAdded(_) => "navigation_added",
            ConventionEvent::NavigationRemoved { .. } => "navigation_removed",
            ConventionEvent::IndexAdded(_) => "index_added",
            ConventionEvent::IndexUniquenessChanged(_) => "index_uniqueness_changed",
            ConventionEvent::ModelFinalizing => "model_finalizing",
        }
    }
}
