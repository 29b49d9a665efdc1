//! Database sequences.
//!
//! A sequence is not a node of the metadata graph. It lives as a single
//! string annotation on the model, keyed `Sequence:<schema>.<name>`, whose
//! value is the compact quoted encoding produced by [`Sequence::serialize`]:
//!
//! ```text
//! 'OrderNumbers', 'dbo', '1000', '5', '', '', 'Int64', 'False'
//! ```
//!
//! Fields are name, schema, start, increment, minimum, maximum, type name
//! and cycle flag. Every field is single-quoted with embedded quotes
//! doubled; absent values are written as `''`.

use super::names::SEQUENCE_PREFIX;
use crate::annotations::{AnnotationResolver, AnnotationValue};
use crate::error::{Error, Result};
use crate::metadata::{Model, ScalarType, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};
use tracing::debug;

pub const DEFAULT_START_VALUE: i64 = 1;
pub const DEFAULT_INCREMENT: i32 = 1;

const FIELD_COUNT: usize = 8;

/// Numeric type of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SequenceType {
    #[default]
    Int64,
    Int32,
    Int16,
    Byte,
}

impl SequenceType {
    /// Type name used in the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            SequenceType::Int64 => "Int64",
            SequenceType::Int32 => "Int32",
            SequenceType::Int16 => "Int16",
            SequenceType::Byte => "Byte",
        }
    }

    /// Decode a type name. Unknown names decode as [`SequenceType::Byte`],
    /// which keeps previously stored annotations readable.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Int64" => SequenceType::Int64,
            "Int32" => SequenceType::Int32,
            "Int16" => SequenceType::Int16,
            _ => SequenceType::Byte,
        }
    }

    /// The sequence type for a property value type.
    pub fn from_value_type(value_type: ValueType) -> Result<Self> {
        match value_type.scalar {
            ScalarType::Int64 => Ok(SequenceType::Int64),
            ScalarType::Int32 => Ok(SequenceType::Int32),
            ScalarType::Int16 => Ok(SequenceType::Int16),
            ScalarType::Byte => Ok(SequenceType::Byte),
            other => Err(Error::BadSequenceType {
                type_name: other.name().to_string(),
            }),
        }
    }

    pub fn value_type(&self) -> ValueType {
        let scalar = match self {
            SequenceType::Int64 => ScalarType::Int64,
            SequenceType::Int32 => ScalarType::Int32,
            SequenceType::Int16 => ScalarType::Int16,
            SequenceType::Byte => ScalarType::Byte,
        };
        ValueType::required(scalar)
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A database sequence generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sequence {
    name: String,
    schema: Option<String>,
    start_value: i64,
    increment_by: i32,
    min_value: Option<i64>,
    max_value: Option<i64>,
    sequence_type: SequenceType,
    is_cyclic: bool,
}

impl Sequence {
    /// A sequence with default settings. An empty schema means no schema.
    pub fn new(name: impl Into<String>, schema: Option<&str>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::bad_sequence("sequence name must not be empty"));
        }
        Ok(Self {
            name,
            schema: schema.filter(|s| !s.is_empty()).map(str::to_string),
            start_value: DEFAULT_START_VALUE,
            increment_by: DEFAULT_INCREMENT,
            min_value: None,
            max_value: None,
            sequence_type: SequenceType::default(),
            is_cyclic: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn start_value(&self) -> i64 {
        self.start_value
    }

    pub fn increment_by(&self) -> i32 {
        self.increment_by
    }

    pub fn min_value(&self) -> Option<i64> {
        self.min_value
    }

    pub fn max_value(&self) -> Option<i64> {
        self.max_value
    }

    pub fn sequence_type(&self) -> SequenceType {
        self.sequence_type
    }

    pub fn is_cyclic(&self) -> bool {
        self.is_cyclic
    }

    pub fn with_start_value(mut self, start_value: i64) -> Self {
        self.start_value = start_value;
        self
    }

    pub fn with_increment_by(mut self, increment_by: i32) -> Self {
        self.increment_by = increment_by;
        self
    }

    pub fn with_min_value(mut self, min_value: Option<i64>) -> Self {
        self.min_value = min_value;
        self
    }

    pub fn with_max_value(mut self, max_value: Option<i64>) -> Self {
        self.max_value = max_value;
        self
    }

    pub fn with_sequence_type(mut self, sequence_type: SequenceType) -> Self {
        self.sequence_type = sequence_type;
        self
    }

    /// Set the numeric type from a value type; fails with
    /// `BadSequenceType` outside Int64, Int32, Int16 and Byte.
    pub fn with_value_type(mut self, value_type: ValueType) -> Result<Self> {
        self.sequence_type = SequenceType::from_value_type(value_type)?;
        Ok(self)
    }

    pub fn with_cyclic(mut self, is_cyclic: bool) -> Self {
        self.is_cyclic = is_cyclic;
        self
    }

    /// Annotation name this sequence is stored under, without layer prefix.
    pub fn annotation_name(&self) -> String {
        Self::annotation_name_for(&self.name, self.schema.as_deref())
    }

    pub(crate) fn annotation_name_for(name: &str, schema: Option<&str>) -> String {
        format!("{}{}.{}", SEQUENCE_PREFIX, schema.unwrap_or(""), name)
    }

    /// Encode into the quoted annotation format.
    pub fn serialize(&self) -> String {
        let optional = |value: Option<i64>| value.map(|v| v.to_string()).unwrap_or_default();
        let fields = [
            self.name.clone(),
            self.schema.clone().unwrap_or_default(),
            self.start_value.to_string(),
            self.increment_by.to_string(),
            optional(self.min_value),
            optional(self.max_value),
            self.sequence_type.name().to_string(),
            if self.is_cyclic { "True" } else { "False" }.to_string(),
        ];
        fields
            .iter()
            .map(|field| format!("'{}'", field.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Decode the quoted annotation format.
    pub fn deserialize(text: &str) -> Result<Self> {
        let fields = split_quoted(text)?;
        if fields.len() != FIELD_COUNT {
            return Err(Error::bad_sequence(format!(
                "expected {FIELD_COUNT} fields, found {}",
                fields.len()
            )));
        }

        let schema = fields[1].as_str();
        let sequence = Sequence::new(fields[0].clone(), Some(schema))?
            .with_start_value(parse_number(&fields[2], "start value")?)
            .with_increment_by(parse_number(&fields[3], "increment")?)
            .with_min_value(parse_optional(&fields[4], "minimum value")?)
            .with_max_value(parse_optional(&fields[5], "maximum value")?)
            .with_sequence_type(SequenceType::from_name(&fields[6]))
            .with_cyclic(parse_flag(&fields[7])?);
        Ok(sequence)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn split_quoted(text: &str) -> Result<Vec<String>> {
    let mut chars = text.chars().peekable();
    let mut fields = Vec::new();
    loop {
        skip_whitespace(&mut chars);
        match chars.next() {
            Some('\'') => {}
            Some(c) => return Err(Error::bad_sequence(format!("expected a quote, found '{c}'"))),
            None => return Err(Error::bad_sequence("expected a quoted value")),
        }

        let mut field = String::new();
        loop {
            match chars.next() {
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    field.push('\'');
                }
                Some('\'') => break,
                Some(c) => field.push(c),
                None => return Err(Error::bad_sequence("unterminated quoted value")),
            }
        }
        fields.push(field);

        skip_whitespace(&mut chars);
        match chars.next() {
            None => return Ok(fields),
            Some(',') => {}
            Some(c) => {
                return Err(Error::bad_sequence(format!(
                    "expected ',' after a value, found '{c}'"
                )))
            }
        }
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn parse_number<T: FromStr>(field: &str, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| Error::bad_sequence(format!("{what} '{field}' is not a number")))
}

fn parse_optional(field: &str, what: &str) -> Result<Option<i64>> {
    if field.is_empty() {
        return Ok(None);
    }
    parse_number(field, what).map(Some)
}

fn parse_flag(field: &str) -> Result<bool> {
    if field.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if field.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::bad_sequence(format!("cycle flag '{field}' is not True or False")))
    }
}

/// Configures a stored sequence, writing it back after every change.
pub struct SequenceBuilder<'m> {
    model: &'m mut Model,
    resolver: AnnotationResolver,
    sequence: Sequence,
}

impl<'m> SequenceBuilder<'m> {
    pub(crate) fn new(
        model: &'m mut Model,
        resolver: AnnotationResolver,
        sequence: Sequence,
    ) -> Self {
        let mut builder = Self {
            model,
            resolver,
            sequence,
        };
        builder.persist();
        builder
    }

    pub fn increments_by(mut self, increment_by: i32) -> Self {
        self.sequence.increment_by = increment_by;
        self.persist();
        self
    }

    pub fn starts_at(mut self, start_value: i64) -> Self {
        self.sequence.start_value = start_value;
        self.persist();
        self
    }

    pub fn has_min(mut self, min_value: i64) -> Self {
        self.sequence.min_value = Some(min_value);
        self.persist();
        self
    }

    pub fn has_max(mut self, max_value: i64) -> Self {
        self.sequence.max_value = Some(max_value);
        self.persist();
        self
    }

    pub fn is_cyclic(mut self, is_cyclic: bool) -> Self {
        self.sequence.is_cyclic = is_cyclic;
        self.persist();
        self
    }

    /// Set the numeric type; the stored value is left untouched on error.
    pub fn of_type(mut self, value_type: ValueType) -> Result<Self> {
        self.sequence.sequence_type = SequenceType::from_value_type(value_type)?;
        self.persist();
        Ok(self)
    }

    /// The sequence as currently stored.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn build(self) -> Sequence {
        self.sequence
    }

    fn persist(&mut self) {
        let value = AnnotationValue::String(self.sequence.serialize());
        self.resolver.set(
            self.model.model_annotations_mut(),
            &self.sequence.annotation_name(),
            Some(value),
        );
        debug!(sequence = %self.sequence, "sequence stored");
    }
}
