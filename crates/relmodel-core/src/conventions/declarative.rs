//! Declarations carried by record shapes.

use super::{tolerate, Convention, ConventionEvent};
use crate::error::Result;
use crate::metadata::{ConfigurationSource, EntityTypeId, MemberInfo, Model, RelationshipConfig};
use tracing::debug;

const NAME: &str = "declarative_annotations";
const SOURCE: ConfigurationSource = ConfigurationSource::DataAnnotation;

/// Applies [`Declaration`](crate::metadata::Declaration)s with
/// data-annotation source: `NotMapped` as soon as the entity type is
/// added, `Key`, `ForeignKey` and `InverseProperty` once per entity type
/// when the model is finalized.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclarativeAnnotationConvention;

impl Convention for DeclarativeAnnotationConvention {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
        match event {
            ConventionEvent::EntityTypeAdded(id) => apply_not_mapped(model, *id),
            ConventionEvent::ModelFinalizing => {
                for id in model.entity_types() {
                    if model.entity_type(id)?.shape().is_none()
                        || model.entity_type(id)?.declarations_applied
                    {
                        continue;
                    }
                    model.entity_type_mut(id)?.declarations_applied = true;
                    apply_keys(model, id)?;
                    apply_relationships(model, id)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn shape_members(model: &Model, id: EntityTypeId) -> Result<Vec<MemberInfo>> {
    Ok(model
        .entity_type(id)?
        .shape()
        .map(|shape| shape.members.clone())
        .unwrap_or_default())
}

fn apply_not_mapped(model: &mut Model, id: EntityTypeId) -> Result<()> {
    for member in shape_members(model, id)? {
        if member.is_not_mapped() {
            tolerate(NAME, model.ignore_member(id, &member.name, SOURCE))?;
        }
    }
    Ok(())
}

fn apply_keys(model: &mut Model, id: EntityTypeId) -> Result<()> {
    let key_members: Vec<MemberInfo> = shape_members(model, id)?
        .into_iter()
        .filter(|m| m.is_key() && m.value_type().is_some())
        .collect();
    if key_members.is_empty() || !model.is_root(id)? {
        return Ok(());
    }

    let mut properties = Vec::with_capacity(key_members.len());
    for member in &key_members {
        match model.find_property(id, &member.name)? {
            Some(p) => properties.push(p),
            None => {
                debug!(
                    entity_type = %model.entity_type(id)?.name(),
                    member = %member.name,
                    "key member is not mapped"
                );
                return Ok(());
            }
        }
    }
    tolerate(NAME, model.set_primary_key(id, &properties, SOURCE))?;
    Ok(())
}

fn apply_relationships(model: &mut Model, id: EntityTypeId) -> Result<()> {
    for member in shape_members(model, id)? {
        let Some(target_name) = member.target() else {
            continue;
        };
        if member.foreign_key().is_none() && member.inverse_property().is_none() {
            continue;
        }
        if member.is_not_mapped() || model.is_ignored(id, &member.name)?.is_some() {
            continue;
        }
        let Some(target) = model.find_entity_type(target_name) else {
            debug!(
                member = %member.name,
                target = target_name,
                "declared relationship target is not in the model"
            );
            continue;
        };

        let inverse = member
            .inverse_property()
            .map(str::to_string)
            .or(inverse_declared_on_target(model, target, &member.name, id)?);
        let inverse_member = match &inverse {
            Some(name) => model
                .entity_type(target)?
                .shape()
                .and_then(|shape| shape.member(name))
                .cloned(),
            None => None,
        };

        let config = match (member.is_collection(), &inverse_member) {
            (true, Some(other)) if other.is_collection() => {
                debug!(member = %member.name, "collection pairs are not supported");
                continue;
            }
            (true, _) => {
                let mut config = RelationshipConfig::new(target, id)
                    .with_navigation_to_dependents(member.name.clone());
                config.navigation_to_principal = inverse.clone();
                config
            }
            (false, Some(other))
                if !other.is_collection()
                    && !is_dependent_end(model, id, target, &member, other)? =>
            {
                continue;
            }
            (false, _) => {
                let mut config = RelationshipConfig::new(id, target)
                    .with_navigation_to_principal(member.name.clone());
                config.navigation_to_dependents = inverse.clone();
                config
            }
        };
        let foreign_key = member
            .foreign_key()
            .or_else(|| inverse_member.as_ref().and_then(MemberInfo::foreign_key));
        let config = match foreign_key {
            Some(names) => config.with_foreign_key(names.iter().cloned()),
            None => config,
        };

        remove_convention_navigation(model, id, &member.name)?;
        if let Some(inverse) = &inverse {
            remove_convention_navigation(model, target, inverse)?;
        }
        tolerate(NAME, model.relationship(config, SOURCE))?;
    }
    Ok(())
}

/// For a reference paired with a reference, the side declaring the foreign
/// key is the dependent; without one, the type with the smaller name is.
fn is_dependent_end(
    model: &Model,
    id: EntityTypeId,
    target: EntityTypeId,
    member: &MemberInfo,
    other: &MemberInfo,
) -> Result<bool> {
    if member.foreign_key().is_some() {
        return Ok(true);
    }
    if other.foreign_key().is_some() {
        return Ok(false);
    }
    Ok(model.entity_type(id)?.name() < model.entity_type(target)?.name())
}

/// An `InverseProperty` on a navigation member of `target` naming `member`.
fn inverse_declared_on_target(
    model: &Model,
    target: EntityTypeId,
    member: &str,
    id: EntityTypeId,
) -> Result<Option<String>> {
    let source_name = model.entity_type(id)?.name().to_string();
    Ok(model.entity_type(target)?.shape().and_then(|shape| {
        shape
            .navigations()
            .find(|m| {
                m.inverse_property() == Some(member) && m.target() == Some(source_name.as_str())
            })
            .map(|m| m.name.clone())
    }))
}

/// Drop a convention relationship that already uses the navigation name.
fn remove_convention_navigation(model: &mut Model, id: EntityTypeId, name: &str) -> Result<()> {
    let Some(nav) = model.find_navigation(id, name)? else {
        return Ok(());
    };
    let fk = model.navigation(nav)?.foreign_key();
    if model.foreign_key(fk)?.configuration_source() == ConfigurationSource::Convention {
        debug!(navigation = name, "replacing convention relationship with declared one");
        tolerate(NAME, model.remove_foreign_key(fk, SOURCE))?;
    }
    Ok(())
}
