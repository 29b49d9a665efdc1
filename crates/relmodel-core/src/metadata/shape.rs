//! Record shapes: the application-side description of an entity type.
//!
//! A shape lists the members the application record declares itself (not
//! the ones it inherits) together with the declarative annotations found on
//! them. Conventions read shapes to discover properties, keys and
//! relationships.

use super::types::ValueType;
use serde::{Deserialize, Serialize};

/// Declarative annotations a record member may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    /// On a navigation member: the dependent property names of its
    /// foreign key.
    ForeignKey(Vec<String>),
    /// On a navigation member: the inverse navigation on the target.
    InverseProperty(String),
    /// The member is not mapped.
    NotMapped,
    /// On a scalar member: part of the primary key.
    Key,
}

/// What a member holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    /// A scalar value.
    Scalar(ValueType),
    /// A reference to a single record of the named type.
    Reference(String),
    /// A collection of records of the named type.
    Collection(String),
}

/// A single member of a record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Member name.
    pub name: String,
    /// Member kind.
    pub kind: MemberKind,
    /// Declarative annotations.
    pub declarations: Vec<Declaration>,
}

impl MemberInfo {
    /// A scalar member.
    pub fn scalar(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, MemberKind::Scalar(value_type))
    }

    /// A reference navigation member.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Reference(target.into()))
    }

    /// A collection navigation member.
    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Collection(target.into()))
    }

    fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            declarations: Vec::new(),
        }
    }

    /// Attach a declaration.
    pub fn with_declaration(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Scalar value type, if this is a scalar member.
    pub fn value_type(&self) -> Option<ValueType> {
        match &self.kind {
            MemberKind::Scalar(value_type) => Some(*value_type),
            _ => None,
        }
    }

    /// Target type name, if this is a navigation member.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Reference(target) | MemberKind::Collection(target) => Some(target),
            MemberKind::Scalar(_) => None,
        }
    }

    /// Check if this is a collection navigation.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, MemberKind::Collection(_))
    }

    /// Check if the member is marked not mapped.
    pub fn is_not_mapped(&self) -> bool {
        self.declarations.contains(&Declaration::NotMapped)
    }

    /// Check if the member is marked as a key part.
    pub fn is_key(&self) -> bool {
        self.declarations.contains(&Declaration::Key)
    }

    /// Foreign key property names declared on this member.
    pub fn foreign_key(&self) -> Option<&[String]> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::ForeignKey(names) => Some(names.as_slice()),
            _ => None,
        })
    }

    /// Inverse navigation name declared on this member.
    pub fn inverse_property(&self) -> Option<&str> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::InverseProperty(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Description of an application record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordShape {
    /// Full type name; becomes the entity type name.
    pub name: String,
    /// Members declared by the record itself.
    pub members: Vec<MemberInfo>,
}

impl RecordShape {
    /// Create an empty shape.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add a member.
    pub fn with_member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    /// Get a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Scalar members.
    pub fn scalars(&self) -> impl Iterator<Item = &MemberInfo> {
        self.members.iter().filter(|m| m.value_type().is_some())
    }

    /// Navigation members.
    pub fn navigations(&self) -> impl Iterator<Item = &MemberInfo> {
        self.members.iter().filter(|m| m.target().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ScalarType;

    #[test]
    fn test_shape_members() {
        let shape = RecordShape::new("Shop.Order")
            .with_member(MemberInfo::scalar(
                "Id",
                ValueType::required(ScalarType::Int32),
            ))
            .with_member(
                MemberInfo::reference("Customer", "Shop.Customer").with_declaration(
                    Declaration::ForeignKey(vec!["CustomerId".into()]),
                ),
            );

        assert_eq!(shape.scalars().count(), 1);
        assert_eq!(shape.navigations().count(), 1);

        let customer = shape.member("Customer").unwrap();
        assert_eq!(customer.target(), Some("Shop.Customer"));
        assert_eq!(customer.foreign_key(), Some(&["CustomerId".to_string()][..]));
        assert!(!customer.is_collection());
        assert!(customer.inverse_property().is_none());
    }
}
