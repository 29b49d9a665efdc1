//! The metadata graph.
//!
//! A [`Model`] owns entity types, properties, keys, foreign keys, indexes
//! and navigations. Nodes refer to each other through generation-checked
//! handles; all mutation goes through `Model` methods so that the graph
//! stays consistent and conventions see every change.

mod arena;
mod entity_type;
mod foreign_key;
mod hierarchy;
mod index;
mod key;
mod members;
mod model;
mod navigation;
mod property;
mod relationship;
mod shape;
mod snapshot;
mod source;
mod types;
mod validate;

pub use arena::{Arena, Handle};
pub use entity_type::{display_name, EntityType, EntityTypeId, RelationshipIntent};
pub use foreign_key::{DeleteBehavior, ForeignKey, ForeignKeyId};
pub use index::{Index, IndexId};
pub use key::{Key, KeyId};
pub use model::Model;
pub use navigation::{Navigation, NavigationId};
pub use property::{Property, PropertyId, ValueGenerated, NO_SHADOW_INDEX};
pub use relationship::RelationshipConfig;
pub use shape::{Declaration, MemberInfo, MemberKind, RecordShape};
pub use snapshot::{
    EntityTypeSnapshot, ForeignKeySnapshot, IndexSnapshot, KeySnapshot, ModelSnapshot,
    NavigationSnapshot, PropertySnapshot,
};
pub use source::ConfigurationSource;
pub use types::{ScalarType, ValueType};
