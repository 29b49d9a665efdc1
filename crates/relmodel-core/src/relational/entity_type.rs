//! Table, schema and discriminator mapping of entity types.

use super::names::{DISCRIMINATOR_PROPERTY, DISCRIMINATOR_VALUE, SCHEMA, TABLE_NAME};
use crate::annotations::{AnnotationResolver, AnnotationValue};
use crate::error::{Error, Result};
use crate::metadata::{
    display_name, ConfigurationSource, EntityTypeId, Model, PropertyId, ScalarType, ValueType,
};
use tracing::debug;

/// Resolved relational mapping of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeMapping {
    pub table_name: String,
    pub schema: Option<String>,
    /// Discriminator property of the hierarchy. Not written back by
    /// [`RelationalEntityType::write`].
    pub discriminator_property: Option<String>,
    pub discriminator_value: AnnotationValue,
}

/// Relational view of entity types.
#[derive(Debug, Clone, Default)]
pub struct RelationalEntityType {
    resolver: AnnotationResolver,
}

impl RelationalEntityType {
    pub fn new(resolver: AnnotationResolver) -> Self {
        Self { resolver }
    }

    /// Table name: the entity type's own annotation, else the root's
    /// table name, else the root's display name.
    pub fn table_name(&self, model: &Model, entity: EntityTypeId) -> Result<String> {
        let et = model.entity_type(entity)?;
        if let Some(name) = self.resolver.get_str(et.annotations(), TABLE_NAME) {
            return Ok(name.to_string());
        }
        let root = model.entity_type(model.root_of(entity)?)?;
        Ok(self
            .resolver
            .get_str(root.annotations(), TABLE_NAME)
            .unwrap_or_else(|| root.display_name())
            .to_string())
    }

    pub fn set_table_name(
        &self,
        model: &mut Model,
        entity: EntityTypeId,
        name: Option<&str>,
    ) -> Result<()> {
        let et = model.entity_type_mut(entity)?;
        self.resolver
            .set(&mut et.annotations, TABLE_NAME, name.map(AnnotationValue::from));
        Ok(())
    }

    /// Schema; absent unless set.
    pub fn schema(&self, model: &Model, entity: EntityTypeId) -> Result<Option<String>> {
        let et = model.entity_type(entity)?;
        Ok(self
            .resolver
            .get_str(et.annotations(), SCHEMA)
            .map(str::to_string))
    }

    pub fn set_schema(
        &self,
        model: &mut Model,
        entity: EntityTypeId,
        schema: Option<&str>,
    ) -> Result<()> {
        let et = model.entity_type_mut(entity)?;
        self.resolver
            .set(&mut et.annotations, SCHEMA, schema.map(AnnotationValue::from));
        Ok(())
    }

    /// The discriminator property of the entity type's hierarchy.
    pub fn discriminator_property(
        &self,
        model: &Model,
        entity: EntityTypeId,
    ) -> Result<Option<PropertyId>> {
        let root = model.root_of(entity)?;
        let Some(name) = self
            .resolver
            .get_str(model.entity_type(root)?.annotations(), DISCRIMINATOR_PROPERTY)
        else {
            return Ok(None);
        };
        model.find_declared_property(root, name)
    }

    /// Source of the discriminator configured in this resolver's layer.
    /// Each layer is arbitrated on its own, so a provider-scoped setting
    /// never blocks or overrides the generic one.
    pub fn discriminator_source(
        &self,
        model: &Model,
        entity: EntityTypeId,
    ) -> Result<Option<ConfigurationSource>> {
        let key = self.resolver.write_key(DISCRIMINATOR_PROPERTY);
        Ok(model.entity_type(entity)?.discriminator_source_in(&key))
    }

    /// Configure (or with `None`, clear) the discriminator property of a
    /// root entity type. The property must be declared on the root itself.
    pub fn set_discriminator_property(
        &self,
        model: &mut Model,
        entity: EntityTypeId,
        property: Option<PropertyId>,
        source: ConfigurationSource,
    ) -> Result<()> {
        let et = model.entity_type(entity)?;
        let entity_name = et.name().to_string();
        if et.base_type().is_some() {
            return Err(Error::DiscriminatorPropertyMustBeOnRoot {
                entity_type: entity_name,
            });
        }
        let layer = self.resolver.write_key(DISCRIMINATOR_PROPERTY);
        let existing = et.discriminator_source_in(&layer);
        if existing.is_some() && !source.overrides(existing) {
            return Err(Error::ConfigurationConflict {
                element: format!("discriminator of '{entity_name}'"),
                existing: existing.unwrap_or(source),
                requested: source,
            });
        }

        let name = match property {
            Some(p) => {
                let property = model.property(p)?;
                if property.declaring_type() != entity {
                    return Err(Error::DiscriminatorPropertyNotFound {
                        property: property.name().to_string(),
                        entity_type: entity_name,
                    });
                }
                Some(property.name().to_string())
            }
            None => None,
        };

        let et = model.entity_type_mut(entity)?;
        match name {
            Some(_) => et.discriminator_sources.insert(layer, source),
            None => et.discriminator_sources.remove(&layer),
        };
        self.resolver.set(
            &mut et.annotations,
            DISCRIMINATOR_PROPERTY,
            name.clone().map(AnnotationValue::String),
        );
        debug!(entity_type = %entity_name, property = ?name, %source, "discriminator property set");
        Ok(())
    }

    /// Discriminator value; defaults to the entity type's own display name.
    pub fn discriminator_value(
        &self,
        model: &Model,
        entity: EntityTypeId,
    ) -> Result<AnnotationValue> {
        let et = model.entity_type(entity)?;
        Ok(self
            .resolver
            .get(et.annotations(), DISCRIMINATOR_VALUE)
            .cloned()
            .unwrap_or_else(|| AnnotationValue::String(display_name(et.name()).to_string())))
    }

    /// Set (or with `None`, reset) the discriminator value.
    pub fn set_discriminator_value(
        &self,
        model: &mut Model,
        entity: EntityTypeId,
        value: Option<AnnotationValue>,
    ) -> Result<()> {
        if let Some(value) = &value {
            let Some(property) = self.discriminator_property(model, entity)? else {
                return Err(Error::NoDiscriminatorForValue {
                    entity_type: model.entity_type(entity)?.name().to_string(),
                });
            };
            let property = model.property(property)?;
            if !is_assignable(value, property.value_type()) {
                return Err(Error::DiscriminitatorValueIncompatible {
                    value: value.to_string(),
                    property: property.name().to_string(),
                    value_type: property.value_type().to_string(),
                });
            }
        }
        let et = model.entity_type_mut(entity)?;
        self.resolver
            .set(&mut et.annotations, DISCRIMINATOR_VALUE, value);
        Ok(())
    }

    pub fn read(&self, model: &Model, entity: EntityTypeId) -> Result<EntityTypeMapping> {
        let discriminator_property = match self.discriminator_property(model, entity)? {
            Some(p) => Some(model.property(p)?.name().to_string()),
            None => None,
        };
        Ok(EntityTypeMapping {
            table_name: self.table_name(model, entity)?,
            schema: self.schema(model, entity)?,
            discriminator_property,
            discriminator_value: self.discriminator_value(model, entity)?,
        })
    }

    /// Store the table name and schema, and the discriminator value when
    /// the hierarchy has a discriminator.
    pub fn write(
        &self,
        model: &mut Model,
        entity: EntityTypeId,
        mapping: &EntityTypeMapping,
    ) -> Result<()> {
        self.set_table_name(model, entity, Some(&mapping.table_name))?;
        self.set_schema(model, entity, mapping.schema.as_deref())?;
        if self.discriminator_property(model, entity)?.is_some() {
            self.set_discriminator_value(model, entity, Some(mapping.discriminator_value.clone()))?;
        }
        Ok(())
    }
}

/// Whether a discriminator value can be stored in a property of the given
/// type.
fn is_assignable(value: &AnnotationValue, value_type: ValueType) -> bool {
    match value {
        AnnotationValue::String(_) => value_type.scalar == ScalarType::String,
        AnnotationValue::Integer(v) => value_type
            .scalar
            .integer_range()
            .is_some_and(|(min, max)| (min..=max).contains(v)),
        AnnotationValue::Boolean(_) => value_type.scalar == ScalarType::Bool,
        AnnotationValue::TypeReference(_) | AnnotationValue::Blob(_) => false,
    }
}
