//! Relational overlay.
//!
//! Stateless access structs that compute table, column, constraint and
//! discriminator mapping from node annotations, falling back to the
//! default naming rules in [`naming`]. Every accessor carries an
//! [`AnnotationResolver`](crate::annotations::AnnotationResolver), so the
//! same model can be read through the generic relational layer or through
//! a provider's layer.

mod constraints;
mod entity_type;
mod model;
pub mod names;
pub mod naming;
mod property;
mod sequence;

pub use constraints::{ConstraintMapping, RelationalForeignKey, RelationalIndex, RelationalKey};
pub use entity_type::{EntityTypeMapping, RelationalEntityType};
pub use model::{ModelMapping, RelationalModel};
pub use property::{ColumnMapping, RelationalProperty};
pub use sequence::{Sequence, SequenceBuilder, SequenceType, DEFAULT_INCREMENT, DEFAULT_START_VALUE};
