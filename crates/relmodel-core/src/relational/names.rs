//! Annotation names used by the relational overlay.
//!
//! Names are stored without a layer prefix; the [`AnnotationResolver`]
//! adds `Relational:` or the provider prefix.
//!
//! [`AnnotationResolver`]: crate::annotations::AnnotationResolver

pub const TABLE_NAME: &str = "TableName";
pub const SCHEMA: &str = "Schema";
pub const COLUMN_NAME: &str = "ColumnName";
pub const COLUMN_TYPE: &str = "ColumnType";
pub const DEFAULT_VALUE: &str = "DefaultValue";
pub const DEFAULT_VALUE_SQL: &str = "DefaultValueSql";
pub const COMPUTED_COLUMN_SQL: &str = "ComputedColumnSql";
/// Constraint or index name.
pub const NAME: &str = "Name";
pub const DISCRIMINATOR_PROPERTY: &str = "DiscriminatorProperty";
pub const DISCRIMINATOR_VALUE: &str = "DiscriminatorValue";
pub const DEFAULT_SCHEMA: &str = "DefaultSchema";
/// Prefix of sequence annotations: `Sequence:<schema>.<name>`.
pub const SEQUENCE_PREFIX: &str = "Sequence:";
