//! Discriminator configuration for hierarchies.

use super::{tolerate, Convention, ConventionEvent};
use crate::error::Result;
use crate::metadata::{ConfigurationSource, EntityTypeId, Model, ScalarType, ValueType};
use crate::relational::RelationalEntityType;
use tracing::debug;

const NAME: &str = "discriminator";
const SOURCE: ConfigurationSource = ConfigurationSource::Convention;

/// Keeps a discriminator on every hierarchy root that has derived types.
///
/// The discriminator is a required string property on the root named by
/// [`ModelConfig::discriminator_property_name`](crate::ModelConfig), created
/// when missing. When a root loses its last derived type, a discriminator
/// this convention configured is removed again. Discriminators configured
/// by stronger sources are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscriminatorConvention;

impl Convention for DiscriminatorConvention {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
        match event {
            ConventionEvent::BaseTypeChanged {
                entity_type,
                previous,
            } => {
                let root = model.root_of(*entity_type)?;
                refresh(model, root)?;
                if let Some(previous) = previous {
                    if model.entity_type(*previous).is_ok() {
                        let old_root = model.root_of(*previous)?;
                        refresh(model, old_root)?;
                    }
                }
                Ok(())
            }
            ConventionEvent::EntityTypeRemoved {
                base_type: Some(base),
                ..
            } => {
                if model.entity_type(*base).is_err() {
                    return Ok(());
                }
                let root = model.root_of(*base)?;
                refresh(model, root)
            }
            _ => Ok(()),
        }
    }
}

fn refresh(model: &mut Model, root: EntityTypeId) -> Result<()> {
    let relational = RelationalEntityType::default();
    let existing = relational.discriminator_source(model, root)?;
    let configured_by_convention = existing == Some(SOURCE);
    if existing.is_some() && !configured_by_convention {
        return Ok(());
    }
    let has_derived = !model.entity_type(root)?.direct_derived_types().is_empty();
    let name = model.config().discriminator_property_name.clone();

    if has_derived {
        let property = match model.find_declared_property(root, &name)? {
            Some(p) => Some(p),
            None => tolerate(
                NAME,
                model.add_property(root, &name, ValueType::required(ScalarType::String), SOURCE),
            )?,
        };
        let Some(property) = property else {
            return Ok(());
        };
        if relational.discriminator_property(model, root)? == Some(property) {
            return Ok(());
        }
        tolerate(
            NAME,
            relational.set_discriminator_property(model, root, Some(property), SOURCE),
        )?;
        debug!(
            entity_type = %model.entity_type(root)?.name(),
            property = %name,
            "discriminator configured"
        );
    } else if configured_by_convention {
        tolerate(NAME, relational.set_discriminator_property(model, root, None, SOURCE))?;
        if let Some(property) = model.find_declared_property(root, &name)? {
            if model.property(property)?.configuration_source() == SOURCE {
                tolerate(NAME, model.remove_property(property, SOURCE))?;
            }
        }
        debug!(entity_type = %model.entity_type(root)?.name(), "discriminator removed");
    }
    Ok(())
}
