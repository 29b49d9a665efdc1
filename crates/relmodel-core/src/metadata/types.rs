//! Value types of properties.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar value kinds a property can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// Unsigned 8-bit integer.
    Byte,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Point in time.
    Timestamp,
    /// 128-bit identifier.
    Uuid,
}

impl ScalarType {
    /// Name of the scalar type.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "Bool",
            ScalarType::Byte => "Byte",
            ScalarType::Int16 => "Int16",
            ScalarType::Int32 => "Int32",
            ScalarType::Int64 => "Int64",
            ScalarType::Float32 => "Float32",
            ScalarType::Float64 => "Float64",
            ScalarType::Decimal => "Decimal",
            ScalarType::String => "String",
            ScalarType::Bytes => "Bytes",
            ScalarType::Timestamp => "Timestamp",
            ScalarType::Uuid => "Uuid",
        }
    }

    /// Inclusive value range of integer scalars.
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            ScalarType::Byte => Some((0, u8::MAX as i64)),
            ScalarType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            ScalarType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            ScalarType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Check if this is an integer scalar.
    pub fn is_integer(&self) -> bool {
        self.integer_range().is_some()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value type of a property: a scalar plus whether the type itself can
/// represent null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    /// Scalar kind.
    pub scalar: ScalarType,
    /// Whether the type admits null.
    pub optional: bool,
}

impl ValueType {
    /// A value type that cannot hold null.
    pub fn required(scalar: ScalarType) -> Self {
        Self {
            scalar,
            optional: false,
        }
    }

    /// A value type that can hold null.
    pub fn optional(scalar: ScalarType) -> Self {
        Self {
            scalar,
            optional: true,
        }
    }

    /// Same scalar, nullable.
    pub fn as_optional(self) -> Self {
        Self::optional(self.scalar)
    }

    /// Two value types are compatible when their scalars agree.
    pub fn is_compatible_with(&self, other: &ValueType) -> bool {
        self.scalar == other.scalar
    }
}

impl From<ScalarType> for ValueType {
    fn from(scalar: ScalarType) -> Self {
        Self::required(scalar)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "{}?", self.scalar)
        } else {
            write!(f, "{}", self.scalar)
        }
    }
}
