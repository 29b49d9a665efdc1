//! relmodel - an in-memory relational metadata model.
//!
//! This crate describes entity types, their properties, keys, foreign keys,
//! indexes and navigations, single-inheritance hierarchies between entity
//! types, and a relational mapping overlay (tables, columns, constraint
//! names, sequences) stored as annotations.

pub mod annotations;
pub mod config;
pub mod conventions;
pub mod error;
pub mod metadata;
pub mod relational;

pub use annotations::{AnnotationResolver, AnnotationTarget, AnnotationValue, Annotations};
pub use config::ModelConfig;
pub use conventions::{Convention, ConventionEvent, ConventionSet};
pub use error::{Error, ErrorCategory, Result};
pub use metadata::{
    ConfigurationSource, DeleteBehavior, EntityTypeId, ForeignKeyId, IndexId, KeyId, MemberInfo,
    Model, ModelSnapshot, NavigationId, PropertyId, RecordShape, RelationshipConfig, ScalarType,
    ValueType,
};

// Relational overlay exports
pub use relational::{
    RelationalEntityType, RelationalForeignKey, RelationalIndex, RelationalKey, RelationalModel,
    RelationalProperty, Sequence, SequenceBuilder, SequenceType,
};
