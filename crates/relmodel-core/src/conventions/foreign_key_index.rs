//! Indexes over foreign key properties.

use super::{tolerate, Convention, ConventionEvent};
use crate::error::Result;
use crate::metadata::{ConfigurationSource, EntityTypeId, ForeignKeyId, KeyId, Model, PropertyId};

const NAME: &str = "foreign_key_index";
const SOURCE: ConfigurationSource = ConfigurationSource::Convention;

/// Adds a convention index over the properties of each new foreign key
/// unless a key or index already starts with them, and drops it again when
/// the foreign key goes away or a key comes to cover it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForeignKeyIndexConvention;

impl Convention for ForeignKeyIndexConvention {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
        match event {
            ConventionEvent::ForeignKeyAdded(fk) => foreign_key_added(model, *fk),
            ConventionEvent::ForeignKeyRemoved {
                entity_type,
                properties,
            } => foreign_key_removed(model, *entity_type, properties),
            ConventionEvent::KeyAdded(key) => key_added(model, *key),
            _ => Ok(()),
        }
    }
}

/// Whether `cover` starts with `properties`.
fn starts_with(cover: &[PropertyId], properties: &[PropertyId]) -> bool {
    cover.len() >= properties.len() && cover[..properties.len()] == *properties
}

fn foreign_key_added(model: &mut Model, fk: ForeignKeyId) -> Result<()> {
    let foreign_key = model.foreign_key(fk)?;
    let entity = foreign_key.declaring_type();
    let properties = foreign_key.properties().to_vec();
    let resolved = model.resolve_properties(&properties)?;

    for key in model.keys(entity)? {
        if starts_with(&model.resolve_properties(model.key(key)?.properties())?, &resolved) {
            return Ok(());
        }
    }
    for index in model.indexes(entity)? {
        if starts_with(&model.resolve_properties(model.index(index)?.properties())?, &resolved) {
            return Ok(());
        }
    }
    tolerate(NAME, model.add_index(entity, &properties, SOURCE))?;
    Ok(())
}

fn foreign_key_removed(
    model: &mut Model,
    entity: EntityTypeId,
    properties: &[PropertyId],
) -> Result<()> {
    if model.entity_type(entity).is_err()
        || properties.iter().any(|p| model.property(*p).is_err())
    {
        return Ok(());
    }
    let resolved = model.resolve_properties(properties)?;
    for fk in model.foreign_keys(entity)? {
        if model.resolve_properties(model.foreign_key(fk)?.properties())? == resolved {
            return Ok(());
        }
    }
    for index in model.declared_indexes(entity)?.to_vec() {
        let ix = model.index(index)?;
        if ix.configuration_source() == SOURCE
            && !ix.is_unique()
            && model.resolve_properties(ix.properties())? == resolved
        {
            tolerate(NAME, model.remove_index(index, SOURCE))?;
        }
    }
    Ok(())
}

fn key_added(model: &mut Model, key: KeyId) -> Result<()> {
    let k = model.key(key)?;
    let entity = k.declaring_type();
    let key_properties = model.resolve_properties(k.properties())?;
    for id in model.derived_types_inclusive(entity)? {
        for index in model.declared_indexes(id)?.to_vec() {
            let ix = model.index(index)?;
            if ix.configuration_source() == SOURCE
                && !ix.is_unique()
                && starts_with(&key_properties, &model.resolve_properties(ix.properties())?)
            {
                tolerate(NAME, model.remove_index(index, SOURCE))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ScalarType, ValueType};

    fn int() -> ValueType {
        ValueType::required(ScalarType::Int32)
    }

    fn customer_and_order(model: &mut Model) -> (EntityTypeId, EntityTypeId, PropertyId) {
        let customer = model
            .add_entity_type("Customer", ConfigurationSource::Explicit)
            .unwrap();
        model
            .add_property(customer, "Id", int(), ConfigurationSource::Explicit)
            .unwrap();
        let order = model
            .add_entity_type("Order", ConfigurationSource::Explicit)
            .unwrap();
        model
            .add_property(order, "Id", int(), ConfigurationSource::Explicit)
            .unwrap();
        let customer_id = model
            .add_property(order, "CustomerId", int(), ConfigurationSource::Explicit)
            .unwrap();
        (customer, order, customer_id)
    }

    #[test]
    fn test_index_follows_foreign_key() {
        let mut model = Model::new();
        let (customer, order, customer_id) = customer_and_order(&mut model);

        let fk = model
            .add_foreign_key(order, &[customer_id], customer, None, ConfigurationSource::Explicit)
            .unwrap();
        let indexes = model.indexes(order).unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(model.index(indexes[0]).unwrap().properties(), &[customer_id]);

        model
            .remove_foreign_key(fk, ConfigurationSource::Explicit)
            .unwrap();
        assert!(model.indexes(order).unwrap().is_empty());
    }

    #[test]
    fn test_covering_key_replaces_index() {
        let mut model = Model::new();
        let (customer, order, customer_id) = customer_and_order(&mut model);
        model
            .add_foreign_key(order, &[customer_id], customer, None, ConfigurationSource::Explicit)
            .unwrap();
        assert_eq!(model.indexes(order).unwrap().len(), 1);

        let id = model.find_property(order, "Id").unwrap().unwrap();
        model
            .add_key(order, &[customer_id, id], ConfigurationSource::Explicit)
            .unwrap();
        assert!(model.indexes(order).unwrap().is_empty());
    }
}
