//! Core error types.

use crate::metadata::ConfigurationSource;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad grouping of failures, for callers that only care about the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The requested change would break the shape of the metadata graph.
    Structural,
    /// A relational mapping rule was violated.
    Relational,
    /// A persisted value could not be read or written.
    Serialization,
    /// A bug or resource limit inside the model itself.
    Internal,
}

/// Metadata model errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An entity type with this name already exists.
    #[error("entity type '{name}' already exists in the model")]
    DuplicateEntityType { name: String },

    /// No entity type with this name exists.
    #[error("entity type '{name}' not found")]
    EntityTypeNotFound { name: String },

    /// The property name is already visible on the entity type.
    #[error(
        "property '{property}' cannot be added to '{entity_type}': \
         it is already declared on '{declaring_type}'"
    )]
    DuplicateProperty {
        property: String,
        entity_type: String,
        declaring_type: String,
    },

    /// No property with this name is visible on the entity type.
    #[error("property '{property}' not found on entity type '{entity_type}'")]
    PropertyNotFound {
        property: String,
        entity_type: String,
    },

    /// The entity type is still referenced.
    #[error("entity type '{entity_type}' cannot be removed: {reason}")]
    EntityTypeInUse { entity_type: String, reason: String },

    /// Key properties must be visible on the key's entity type.
    #[error("key properties {properties} are not visible on entity type '{entity_type}'")]
    KeyPropertiesNotOnEntity {
        properties: String,
        entity_type: String,
    },

    /// Foreign key properties must be visible on the dependent type.
    #[error("foreign key properties {properties} are not visible on entity type '{entity_type}'")]
    ForeignKeyPropertiesNotOnEntity {
        properties: String,
        entity_type: String,
    },

    /// Index properties must be visible on the index's entity type.
    #[error("index properties {properties} are not visible on entity type '{entity_type}'")]
    IndexPropertiesNotOnEntity {
        properties: String,
        entity_type: String,
    },

    /// The principal key does not belong to the principal's hierarchy.
    #[error("key {key} is not declared on '{entity_type}' or one of its base types")]
    PrincipalKeyNotOnEntity { key: String, entity_type: String },

    /// Foreign key arity or positional types do not match the principal key.
    #[error(
        "foreign key {dependent_properties} on '{dependent_type}' does not match \
         key {principal_properties} on '{principal_type}'"
    )]
    ForeignKeyTypeMismatch {
        dependent_type: String,
        dependent_properties: String,
        principal_type: String,
        principal_properties: String,
    },

    /// A navigation name collides with another member.
    #[error(
        "navigation '{navigation}' on '{entity_type}' conflicts with a member \
         declared on '{conflicting_type}'"
    )]
    NavigationNameConflict {
        navigation: String,
        entity_type: String,
        conflicting_type: String,
    },

    /// Only hierarchy roots may carry a primary key.
    #[error("entity type '{entity_type}' is derived and cannot define a primary key")]
    DerivedTypeCannotHaveKeys { entity_type: String },

    /// A property of the derived subtree clashes with a base property.
    #[error(
        "cannot set '{base_type}' as base of '{entity_type}': \
         property '{property}' has an incompatible type"
    )]
    DuplicatePropertyOnBaseType {
        entity_type: String,
        base_type: String,
        property: String,
    },

    /// A navigation of the derived subtree clashes with a base member.
    #[error(
        "cannot set '{base_type}' as base of '{entity_type}': \
         navigation '{navigation}' is already visible on the base"
    )]
    DuplicateNavigationOnBaseType {
        entity_type: String,
        base_type: String,
        navigation: String,
    },

    /// The base type would make the hierarchy cyclic.
    #[error("cannot set '{base_type}' as base of '{entity_type}': inheritance would be circular")]
    CircularInheritance {
        entity_type: String,
        base_type: String,
    },

    /// The property is referenced by a key, foreign key or index.
    #[error("property '{property}' on '{entity_type}' is in use by {used_by}")]
    PropertyInUse {
        property: String,
        entity_type: String,
        used_by: String,
    },

    /// The key is the target of a foreign key.
    #[error("key {key} on '{entity_type}' is referenced by a foreign key on '{referencing_type}'")]
    KeyInUse {
        key: String,
        entity_type: String,
        referencing_type: String,
    },

    /// A key needs at least one property.
    #[error("key on entity type '{entity_type}' must have at least one property")]
    EmptyKey { entity_type: String },

    /// An index or foreign key needs at least one property.
    #[error("{element} on entity type '{entity_type}' must have at least one property")]
    EmptyPropertyList {
        element: &'static str,
        entity_type: String,
    },

    /// The same property list is already a key in the hierarchy.
    #[error("key {properties} already exists in the hierarchy of '{entity_type}'")]
    DuplicateKey {
        properties: String,
        entity_type: String,
    },

    /// An identical foreign key already exists.
    #[error("foreign key {properties} on '{entity_type}' to '{principal_type}' already exists")]
    DuplicateForeignKey {
        properties: String,
        entity_type: String,
        principal_type: String,
    },

    /// The same property list is already an index in the hierarchy.
    #[error("index {properties} already exists in the hierarchy of '{entity_type}'")]
    DuplicateIndex {
        properties: String,
        entity_type: String,
    },

    /// The principal has no primary key to reference.
    #[error("entity type '{entity_type}' has no primary key to reference")]
    NoPrincipalKey { entity_type: String },

    /// The property cannot hold null.
    #[error("property '{property}' on '{entity_type}' cannot be nullable: {reason}")]
    CannotBeNullable {
        property: String,
        entity_type: String,
        reason: String,
    },

    /// Inherited members can only be ignored on their declaring type.
    #[error(
        "member '{member}' cannot be ignored on '{entity_type}': \
         it is inherited from '{declaring_type}'"
    )]
    InheritedMemberCannotBeIgnored {
        member: String,
        entity_type: String,
        declaring_type: String,
    },

    /// A configuration with a higher source wins over the request.
    #[error("{element} was configured by {existing} and cannot be changed by {requested}")]
    ConfigurationConflict {
        element: String,
        existing: ConfigurationSource,
        requested: ConfigurationSource,
    },

    /// The handle refers to a removed node.
    #[error("stale {kind} handle")]
    StaleHandle { kind: &'static str },

    /// Discriminators are configured on hierarchy roots only.
    #[error("discriminator cannot be configured on '{entity_type}': it is not the hierarchy root")]
    DiscriminatorPropertyMustBeOnRoot { entity_type: String },

    /// The discriminator property must be declared on the root.
    #[error("discriminator property '{property}' is not declared on '{entity_type}'")]
    DiscriminatorPropertyNotFound {
        property: String,
        entity_type: String,
    },

    /// A discriminator value needs a discriminator property.
    #[error("entity type '{entity_type}' has no discriminator property to hold a value")]
    NoDiscriminatorForValue { entity_type: String },

    /// The discriminator value does not fit the property type.
    #[error("discriminator value {value} is not assignable to '{property}' of type {value_type}")]
    DiscriminitatorValueIncompatible {
        value: String,
        property: String,
        value_type: String,
    },

    /// Malformed sequence annotation text.
    #[error("bad sequence string: {reason}")]
    BadSequenceString { reason: String },

    /// The value type cannot back a sequence.
    #[error("type {type_name} cannot be used for a sequence")]
    BadSequenceType { type_name: String },

    /// Convention dispatch recursed too deeply.
    #[error("convention dispatch exceeded the maximum depth of {depth}")]
    ConventionDepthExceeded { depth: usize },

    /// The model breaks one of its structural invariants.
    #[error("model invariant violated: {message}")]
    InvariantViolation { message: String },

    /// A snapshot could not be rendered.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl Error {
    /// The category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::DiscriminatorPropertyMustBeOnRoot { .. }
            | Error::DiscriminatorPropertyNotFound { .. }
            | Error::NoDiscriminatorForValue { .. }
            | Error::DiscriminitatorValueIncompatible { .. } => ErrorCategory::Relational,
            Error::BadSequenceString { .. }
            | Error::BadSequenceType { .. }
            | Error::Snapshot(_) => {
                ErrorCategory::Serialization
            }
            Error::ConventionDepthExceeded { .. } | Error::InvariantViolation { .. } => {
                ErrorCategory::Internal
            }
            _ => ErrorCategory::Structural,
        }
    }

    pub(crate) fn bad_sequence(reason: impl Into<String>) -> Self {
        Error::BadSequenceString {
            reason: reason.into(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Snapshot(err.to_string())
    }
}
