//! Names of keys, foreign keys and indexes.

use super::entity_type::RelationalEntityType;
use super::names::NAME;
use super::naming;
use super::property::RelationalProperty;
use crate::annotations::{AnnotationResolver, AnnotationValue, Annotations};
use crate::error::Result;
use crate::metadata::{ForeignKeyId, IndexId, KeyId, Model, PropertyId};

/// Resolved name of a key, foreign key or index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintMapping {
    pub name: String,
}

fn column_names(
    resolver: &AnnotationResolver,
    model: &Model,
    properties: &[PropertyId],
) -> Result<Vec<String>> {
    let columns = RelationalProperty::new(resolver.clone());
    properties
        .iter()
        .map(|p| columns.column_name(model, model.resolve_property(*p)?))
        .collect()
}

fn stored_name(resolver: &AnnotationResolver, annotations: &Annotations) -> Option<String> {
    resolver.get_str(annotations, NAME).map(str::to_string)
}

/// Relational view of keys.
#[derive(Debug, Clone, Default)]
pub struct RelationalKey {
    resolver: AnnotationResolver,
}

impl RelationalKey {
    pub fn new(resolver: AnnotationResolver) -> Self {
        Self { resolver }
    }

    /// Constraint name; `PK_<table>` for a primary key, otherwise
    /// `AK_<table>_<columns>`.
    pub fn name(&self, model: &Model, key: KeyId) -> Result<String> {
        let k = model.key(key)?;
        if let Some(name) = stored_name(&self.resolver, k.annotations()) {
            return Ok(name);
        }
        let table = RelationalEntityType::new(self.resolver.clone())
            .table_name(model, k.declaring_type())?;
        if model.is_primary_key(key)? {
            return Ok(naming::primary_key_name(&table));
        }
        let columns = column_names(&self.resolver, model, k.properties())?;
        Ok(naming::alternate_key_name(&table, &columns))
    }

    pub fn set_name(&self, model: &mut Model, key: KeyId, name: Option<&str>) -> Result<()> {
        let k = model.key_mut(key)?;
        self.resolver
            .set(&mut k.annotations, NAME, name.map(AnnotationValue::from));
        Ok(())
    }

    pub fn read(&self, model: &Model, key: KeyId) -> Result<ConstraintMapping> {
        Ok(ConstraintMapping {
            name: self.name(model, key)?,
        })
    }

    pub fn write(&self, model: &mut Model, key: KeyId, mapping: &ConstraintMapping) -> Result<()> {
        self.set_name(model, key, Some(&mapping.name))
    }
}

/// Relational view of foreign keys.
#[derive(Debug, Clone, Default)]
pub struct RelationalForeignKey {
    resolver: AnnotationResolver,
}

impl RelationalForeignKey {
    pub fn new(resolver: AnnotationResolver) -> Self {
        Self { resolver }
    }

    /// Constraint name; defaults to
    /// `FK_<dependent table>_<principal table>_<columns>`.
    pub fn name(&self, model: &Model, fk: ForeignKeyId) -> Result<String> {
        let foreign_key = model.foreign_key(fk)?;
        if let Some(name) = stored_name(&self.resolver, foreign_key.annotations()) {
            return Ok(name);
        }
        let tables = RelationalEntityType::new(self.resolver.clone());
        let dependent = tables.table_name(model, foreign_key.declaring_type())?;
        let principal = tables.table_name(model, foreign_key.principal_type())?;
        let columns = column_names(&self.resolver, model, foreign_key.properties())?;
        Ok(naming::foreign_key_name(&dependent, &principal, &columns))
    }

    pub fn set_name(&self, model: &mut Model, fk: ForeignKeyId, name: Option<&str>) -> Result<()> {
        let foreign_key = model.foreign_key_mut(fk)?;
        self.resolver
            .set(&mut foreign_key.annotations, NAME, name.map(AnnotationValue::from));
        Ok(())
    }

    pub fn read(&self, model: &Model, fk: ForeignKeyId) -> Result<ConstraintMapping> {
        Ok(ConstraintMapping {
            name: self.name(model, fk)?,
        })
    }

    pub fn write(
        &self,
        model: &mut Model,
        fk: ForeignKeyId,
        mapping: &ConstraintMapping,
    ) -> Result<()> {
        self.set_name(model, fk, Some(&mapping.name))
    }
}

/// Relational view of indexes.
#[derive(Debug, Clone, Default)]
pub struct RelationalIndex {
    resolver: AnnotationResolver,
}

impl RelationalIndex {
    pub fn new(resolver: AnnotationResolver) -> Self {
        Self { resolver }
    }

    /// Index name; defaults to `IX_<table>_<columns>` in index order.
    pub fn name(&self, model: &Model, index: IndexId) -> Result<String> {
        let ix = model.index(index)?;
        if let Some(name) = stored_name(&self.resolver, ix.annotations()) {
            return Ok(name);
        }
        let table = RelationalEntityType::new(self.resolver.clone())
            .table_name(model, ix.declaring_type())?;
        let columns = column_names(&self.resolver, model, ix.properties())?;
        Ok(naming::index_name(&table, &columns))
    }

    pub fn set_name(&self, model: &mut Model, index: IndexId, name: Option<&str>) -> Result<()> {
        let ix = model.index_mut(index)?;
        self.resolver
            .set(&mut ix.annotations, NAME, name.map(AnnotationValue::from));
        Ok(())
    }

    pub fn read(&self, model: &Model, index: IndexId) -> Result<ConstraintMapping> {
        Ok(ConstraintMapping {
            name: self.name(model, index)?,
        })
    }

    pub fn write(
        &self,
        model: &mut Model,
        index: IndexId,
        mapping: &ConstraintMapping,
    ) -> Result<()> {
        self.set_name(model, index, Some(&mapping.name))
    }
}
