//! Annotations attached to metadata nodes.
//!
//! Every node of the model carries an [`Annotations`] store. The relational
//! overlay reads and writes it through an [`AnnotationResolver`], which
//! applies provider-prefix precedence.

mod resolver;
mod store;
mod value;

pub use resolver::{AnnotationResolver, RELATIONAL_PREFIX};
pub use store::Annotations;
pub use value::AnnotationValue;

use crate::metadata::{EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId};

/// Addresses the annotation store of any node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationTarget {
    /// The model itself.
    Model,
    /// An entity type.
    EntityType(EntityTypeId),
    /// A property.
    Property(PropertyId),
    /// A key.
    Key(KeyId),
    /// A foreign key.
    ForeignKey(ForeignKeyId),
    /// An index.
    Index(IndexId),
    /// A navigation.
    Navigation(NavigationId),
}
