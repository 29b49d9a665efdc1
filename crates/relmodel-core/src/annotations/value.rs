//! Annotation values.

use crate::metadata::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value stored in an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationValue {
    /// Text value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// Reference to a value type.
    TypeReference(ValueType),
    /// Opaque binary value.
    Blob(Vec<u8>),
}

impl AnnotationValue {
    /// The text, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AnnotationValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The flag, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnnotationValue::String(_) => "String",
            AnnotationValue::Integer(_) => "Integer",
            AnnotationValue::Boolean(_) => "Boolean",
            AnnotationValue::TypeReference(_) => "TypeReference",
            AnnotationValue::Blob(_) => "Blob",
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::String(s) => write!(f, "'{}'", s),
            AnnotationValue::Integer(i) => write!(f, "{}", i),
            AnnotationValue::Boolean(b) => write!(f, "{}", b),
            AnnotationValue::TypeReference(t) => write!(f, "typeof({})", t),
            AnnotationValue::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        AnnotationValue::String(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        AnnotationValue::String(value)
    }
}

impl From<i64> for AnnotationValue {
    fn from(value: i64) -> Self {
        AnnotationValue::Integer(value)
    }
}

impl From<i32> for AnnotationValue {
    fn from(value: i32) -> Self {
        AnnotationValue::Integer(value as i64)
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        AnnotationValue::Boolean(value)
    }
}

impl From<ValueType> for AnnotationValue {
    fn from(value: ValueType) -> Self {
        AnnotationValue::TypeReference(value)
    }
}

impl From<Vec<u8>> for AnnotationValue {
    fn from(value: Vec<u8>) -> Self {
        AnnotationValue::Blob(value)
    }
}
