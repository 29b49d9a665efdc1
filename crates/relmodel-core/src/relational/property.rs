//! Column mapping of properties.

use super::names::{COLUMN_NAME, COLUMN_TYPE, COMPUTED_COLUMN_SQL, DEFAULT_VALUE, DEFAULT_VALUE_SQL};
use crate::annotations::{AnnotationResolver, AnnotationValue, Annotations};
use crate::error::Result;
use crate::metadata::{Model, PropertyId};

/// Resolved column mapping of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub column_name: String,
    pub column_type: Option<String>,
    pub default_value: Option<AnnotationValue>,
    pub default_value_sql: Option<String>,
    pub computed_column_sql: Option<String>,
}

/// Relational view of properties.
#[derive(Debug, Clone, Default)]
pub struct RelationalProperty {
    resolver: AnnotationResolver,
}

impl RelationalProperty {
    pub fn new(resolver: AnnotationResolver) -> Self {
        Self { resolver }
    }

    /// Column name; defaults to the property name.
    pub fn column_name(&self, model: &Model, property: PropertyId) -> Result<String> {
        let p = model.property(property)?;
        Ok(self
            .resolver
            .get_str(p.annotations(), COLUMN_NAME)
            .unwrap_or(p.name())
            .to_string())
    }

    pub fn set_column_name(
        &self,
        model: &mut Model,
        property: PropertyId,
        name: Option<&str>,
    ) -> Result<()> {
        self.write_value(model, property, COLUMN_NAME, name.map(AnnotationValue::from))
    }

    pub fn column_type(&self, model: &Model, property: PropertyId) -> Result<Option<String>> {
        self.read_str(model, property, COLUMN_TYPE)
    }

    pub fn set_column_type(
        &self,
        model: &mut Model,
        property: PropertyId,
        column_type: Option<&str>,
    ) -> Result<()> {
        self.write_value(model, property, COLUMN_TYPE, column_type.map(AnnotationValue::from))
    }

    pub fn default_value(
        &self,
        model: &Model,
        property: PropertyId,
    ) -> Result<Option<AnnotationValue>> {
        let p = model.property(property)?;
        Ok(self.resolver.get(p.annotations(), DEFAULT_VALUE).cloned())
    }

    pub fn set_default_value(
        &self,
        model: &mut Model,
        property: PropertyId,
        value: Option<AnnotationValue>,
    ) -> Result<()> {
        self.write_value(model, property, DEFAULT_VALUE, value)
    }

    pub fn default_value_sql(&self, model: &Model, property: PropertyId) -> Result<Option<String>> {
        self.read_str(model, property, DEFAULT_VALUE_SQL)
    }

    pub fn set_default_value_sql(
        &self,
        model: &mut Model,
        property: PropertyId,
        sql: Option<&str>,
    ) -> Result<()> {
        self.write_value(model, property, DEFAULT_VALUE_SQL, sql.map(AnnotationValue::from))
    }

    pub fn computed_column_sql(
        &self,
        model: &Model,
        property: PropertyId,
    ) -> Result<Option<String>> {
        self.read_str(model, property, COMPUTED_COLUMN_SQL)
    }

    pub fn set_computed_column_sql(
        &self,
        model: &mut Model,
        property: PropertyId,
        sql: Option<&str>,
    ) -> Result<()> {
        self.write_value(model, property, COMPUTED_COLUMN_SQL, sql.map(AnnotationValue::from))
    }

    pub fn read(&self, model: &Model, property: PropertyId) -> Result<ColumnMapping> {
        Ok(ColumnMapping {
            column_name: self.column_name(model, property)?,
            column_type: self.column_type(model, property)?,
            default_value: self.default_value(model, property)?,
            default_value_sql: self.default_value_sql(model, property)?,
            computed_column_sql: self.computed_column_sql(model, property)?,
        })
    }

    pub fn write(
        &self,
        model: &mut Model,
        property: PropertyId,
        mapping: &ColumnMapping,
    ) -> Result<()> {
        self.set_column_name(model, property, Some(&mapping.column_name))?;
        self.set_column_type(model, property, mapping.column_type.as_deref())?;
        self.set_default_value(model, property, mapping.default_value.clone())?;
        self.set_default_value_sql(model, property, mapping.default_value_sql.as_deref())?;
        self.set_computed_column_sql(model, property, mapping.computed_column_sql.as_deref())
    }

    fn read_str(&self, model: &Model, property: PropertyId, name: &str) -> Result<Option<String>> {
        let annotations: &Annotations = model.property(property)?.annotations();
        Ok(self.resolver.get_str(annotations, name).map(str::to_string))
    }

    fn write_value(
        &self,
        model: &mut Model,
        property: PropertyId,
        name: &str,
        value: Option<AnnotationValue>,
    ) -> Result<()> {
        let p = model.property_mut(property)?;
        self.resolver.set(&mut p.annotations, name, value);
        Ok(())
    }
}
