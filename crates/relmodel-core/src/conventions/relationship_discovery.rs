//! Relationship discovery from navigation members.

use super::{tolerate, Convention, ConventionEvent};
use crate::error::Result;
use crate::metadata::{ConfigurationSource, EntityTypeId, MemberInfo, Model, RelationshipConfig};
use std::collections::BTreeSet;
use tracing::trace;

const NAME: &str = "relationship_discovery";

/// Creates convention relationships for undeclared navigation members.
///
/// A reference member makes its entity type the dependent of the target; a
/// collection member makes it the principal. A reference and a collection
/// pointing at each other's types are paired into one relationship when
/// the pairing is unambiguous. Members carrying declarations are left to
/// [`DeclarativeAnnotationConvention`](super::DeclarativeAnnotationConvention).
#[derive(Debug, Default, Clone, Copy)]
pub struct RelationshipDiscoveryConvention;

impl Convention for RelationshipDiscoveryConvention {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
        let affected = match event {
            ConventionEvent::EntityTypeAdded(id)
            | ConventionEvent::PrimaryKeyChanged { entity_type: id, .. } => {
                let mut affected = vec![*id];
                affected.extend(referencing_types(model, &[*id])?);
                affected
            }
            ConventionEvent::BaseTypeChanged { entity_type, .. } => {
                let subtree = model.derived_types_inclusive(*entity_type)?;
                let mut affected = subtree.clone();
                affected.extend(referencing_types(model, &subtree)?);
                affected
            }
            ConventionEvent::MemberUnignored { entity_type, .. } => vec![*entity_type],
            _ => return Ok(()),
        };

        let mut seen = BTreeSet::new();
        for id in affected {
            if seen.insert(id) && model.entity_type(id).is_ok() {
                discover(model, id)?;
            }
        }
        Ok(())
    }
}

/// Entity types whose shapes have navigation members targeting one of
/// `targets`.
fn referencing_types(model: &Model, targets: &[EntityTypeId]) -> Result<Vec<EntityTypeId>> {
    let names = targets
        .iter()
        .map(|t| Ok(model.entity_type(*t)?.name().to_string()))
        .collect::<Result<BTreeSet<_>>>()?;
    let mut result = Vec::new();
    for id in model.entity_types() {
        let Some(shape) = model.entity_type(id)?.shape() else {
            continue;
        };
        if shape
            .navigations()
            .any(|m| m.target().is_some_and(|t| names.contains(t)))
        {
            result.push(id);
        }
    }
    Ok(result)
}

fn shape_navigations(model: &Model, id: EntityTypeId) -> Result<Vec<MemberInfo>> {
    Ok(model
        .entity_type(id)?
        .shape()
        .map(|shape| shape.navigations().cloned().collect())
        .unwrap_or_default())
}

/// Undeclared navigation members of `id` pointing at `target_name`.
fn candidates(
    model: &Model,
    id: EntityTypeId,
    target_name: &str,
    collection: bool,
) -> Result<Vec<MemberInfo>> {
    let mut result = Vec::new();
    for member in shape_navigations(model, id)? {
        if member.declarations.is_empty()
            && member.is_collection() == collection
            && member.target() == Some(target_name)
            && model.is_ignored(id, &member.name)?.is_none()
        {
            result.push(member);
        }
    }
    Ok(result)
}

/// The single member on `target` pairing with `member` of `id`, when the
/// pairing is unambiguous on both sides.
fn inverse_of(
    model: &Model,
    id: EntityTypeId,
    member: &MemberInfo,
    target: EntityTypeId,
) -> Result<Option<String>> {
    let name = model.entity_type(id)?.name().to_string();
    let target_name = model.entity_type(target)?.name().to_string();
    if id == target {
        return Ok(None);
    }
    let ours = candidates(model, id, &target_name, member.is_collection())?;
    let theirs = candidates(model, target, &name, !member.is_collection())?;
    match (ours.as_slice(), theirs.as_slice()) {
        ([_], [inverse]) => Ok(Some(inverse.name.clone())),
        _ => Ok(None),
    }
}

/// Whether some member on `target` claims `member` through a declaration.
fn claimed_by_declaration(model: &Model, target: EntityTypeId, member: &str) -> Result<bool> {
    Ok(shape_navigations(model, target)?
        .iter()
        .any(|m| m.inverse_property() == Some(member)))
}

fn discover(model: &mut Model, id: EntityTypeId) -> Result<()> {
    for member in shape_navigations(model, id)? {
        if !member.declarations.is_empty()
            || model.is_ignored(id, &member.name)?.is_some()
            || model.find_navigation(id, &member.name)?.is_some()
            || model.find_property(id, &member.name)?.is_some()
        {
            continue;
        }
        let Some(target) = member.target().and_then(|t| model.find_entity_type(t)) else {
            continue;
        };
        if claimed_by_declaration(model, target, &member.name)? {
            continue;
        }

        let (dependent, principal) = if member.is_collection() {
            (target, id)
        } else {
            (id, target)
        };
        if model.primary_key(principal)?.is_none() {
            trace!(navigation = %member.name, "principal has no key yet");
            continue;
        }

        let inverse = inverse_of(model, id, &member, target)?;
        let mut config = RelationshipConfig::new(dependent, principal);
        if member.is_collection() {
            config.navigation_to_dependents = Some(member.name.clone());
            config.navigation_to_principal = inverse;
        } else {
            config.navigation_to_principal = Some(member.name.clone());
            config.navigation_to_dependents = inverse;
        }
        tolerate(NAME, model.relationship(config, ConfigurationSource::Convention))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{RecordShape, ScalarType, ValueType};
    use crate::relational::RelationalForeignKey;

    fn int() -> ValueType {
        ValueType::required(ScalarType::Int32)
    }

    fn customer() -> RecordShape {
        RecordShape::new("Customer")
            .with_member(MemberInfo::scalar("Id", int()))
            .with_member(MemberInfo::collection("Orders", "Order"))
    }

    fn order() -> RecordShape {
        RecordShape::new("Order")
            .with_member(MemberInfo::scalar("Id", int()))
            .with_member(MemberInfo::reference("Customer", "Customer"))
    }

    #[test]
    fn test_reference_and_collection_paired() {
        let mut model = Model::new();
        model
            .add_entity_type_with_shape(customer(), ConfigurationSource::Explicit)
            .unwrap();
        let order = model
            .add_entity_type_with_shape(order(), ConfigurationSource::Explicit)
            .unwrap();

        let fks = model.foreign_keys(order).unwrap();
        assert_eq!(fks.len(), 1);
        let fk = model.foreign_key(fks[0]).unwrap();
        assert!(fk.dependent_to_principal().is_some());
        assert!(fk.principal_to_dependent().is_some());
        assert_eq!(
            RelationalForeignKey::default().name(&model, fks[0]).unwrap(),
            "FK_Order_Customer_CustomerId"
        );
        let customer_id = model.find_property(order, "CustomerId").unwrap().unwrap();
        assert!(model.property(customer_id).unwrap().is_shadow());
        assert!(model.property(customer_id).unwrap().is_nullable());
    }

    #[test]
    fn test_principal_added_later() {
        let mut model = Model::new();
        let order = model
            .add_entity_type_with_shape(order(), ConfigurationSource::Explicit)
            .unwrap();
        assert!(model.foreign_keys(order).unwrap().is_empty());

        let customer = model
            .add_entity_type_with_shape(customer(), ConfigurationSource::Explicit)
            .unwrap();
        assert_eq!(model.foreign_keys(order).unwrap().len(), 1);
        assert_eq!(model.referencing_foreign_keys(customer).unwrap().len(), 1);
        assert!(model.find_navigation(customer, "Orders").unwrap().is_some());
    }
}
