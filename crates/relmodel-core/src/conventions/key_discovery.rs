//! Primary key discovery.

use super::{tolerate, Convention, ConventionEvent};
use crate::error::Result;
use crate::metadata::{ConfigurationSource, EntityTypeId, Model, PropertyId};
use tracing::trace;

const NAME: &str = "key_discovery";

/// Picks a primary key for hierarchy roots that have none: a property
/// named `Id`, else one named `<TypeName>Id`, compared case-insensitively.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyDiscoveryConvention;

impl Convention for KeyDiscoveryConvention {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
        match event {
            ConventionEvent::EntityTypeAdded(id) => discover(model, *id),
            ConventionEvent::PropertyAdded(p) => {
                let entity = model.property(*p)?.declaring_type();
                discover(model, entity)
            }
            ConventionEvent::BaseTypeChanged { entity_type, .. } => discover(model, *entity_type),
            _ => Ok(()),
        }
    }
}

fn discover(model: &mut Model, id: EntityTypeId) -> Result<()> {
    if !model.is_root(id)? || model.primary_key(id)?.is_some() {
        return Ok(());
    }
    let Some(property) = candidate(model, id)? else {
        return Ok(());
    };
    trace!(entity_type = %model.entity_type(id)?.name(), "primary key discovered");
    tolerate(
        NAME,
        model.set_primary_key(id, &[property], ConfigurationSource::Convention),
    )?;
    Ok(())
}

fn candidate(model: &Model, id: EntityTypeId) -> Result<Option<PropertyId>> {
    let type_id = format!("{}Id", model.entity_type(id)?.display_name());
    let properties = model.properties(id)?;
    for wanted in ["Id", type_id.as_str()] {
        for &p in &properties {
            if model.property(p)?.name().eq_ignore_ascii_case(wanted) {
                return Ok(Some(p));
            }
        }
    }
    Ok(None)
}
