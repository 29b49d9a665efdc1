//! Discovers scalar properties from record shapes.

use super::{tolerate, Convention, ConventionEvent};
use crate::error::Result;
use crate::metadata::{ConfigurationSource, EntityTypeId, MemberInfo, Model};

const NAME: &str = "property_discovery";

/// Adds a convention property for every mapped scalar member of an entity
/// type's shape that the model does not already know under that name.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyDiscoveryConvention;

impl Convention for PropertyDiscoveryConvention {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
        match event {
            ConventionEvent::EntityTypeAdded(id) => discover(model, *id, None),
            ConventionEvent::BaseTypeChanged { entity_type, .. } => {
                for id in model.derived_types_inclusive(*entity_type)? {
                    discover(model, id, None)?;
                }
                Ok(())
            }
            ConventionEvent::MemberUnignored { entity_type, name } => {
                discover(model, *entity_type, Some(name.as_str()))
            }
            _ => Ok(()),
        }
    }
}

fn discover(model: &mut Model, id: EntityTypeId, only: Option<&str>) -> Result<()> {
    let members: Vec<MemberInfo> = match model.entity_type(id)?.shape() {
        Some(shape) => shape
            .scalars()
            .filter(|m| only.map_or(true, |name| m.name == name))
            .cloned()
            .collect(),
        None => return Ok(()),
    };

    for member in members {
        let Some(value_type) = member.value_type() else {
            continue;
        };
        if member.is_not_mapped()
            || model.is_ignored(id, &member.name)?.is_some()
            || model.find_property(id, &member.name)?.is_some()
            || model.find_navigation(id, &member.name)?.is_some()
        {
            continue;
        }
        tolerate(
            NAME,
            model.add_property(id, &member.name, value_type, ConfigurationSource::Convention),
        )?;
    }
    Ok(())
}
