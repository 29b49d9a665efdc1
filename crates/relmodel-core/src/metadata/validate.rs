//! Whole-model consistency check.

use super::entity_type::EntityTypeId;
use super::foreign_key::ForeignKeyId;
use super::model::Model;
use super::property::PropertyId;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use tracing::trace;

impl Model {
    /// Check every structural invariant of the model.
    ///
    /// Mutating operations keep these invariants on their own; `validate`
    /// exists for tests and for callers that want to assert it.
    pub fn validate(&self) -> Result<()> {
        for (name, &id) in &self.entity_type_names {
            if self.entity_type(id)?.name != *name {
                return Err(Error::invariant(format!("name index entry '{name}' is stale")));
            }
        }
        if self.entity_type_names.len() != self.entity_types.len() {
            return Err(Error::invariant("name index does not cover every entity type"));
        }

        for (id, _) in self.entity_types.iter() {
            self.validate_entity_type(id)?;
        }
        for (id, _) in self.foreign_keys.iter() {
            self.validate_foreign_key(id)?;
        }
        for (id, navigation) in self.navigations.iter() {
            let foreign_key = self.foreign_key(navigation.foreign_key)?;
            let expected = if navigation.is_on_dependent {
                (foreign_key.declaring_type, foreign_key.dependent_to_principal)
            } else {
                (foreign_key.principal_type, foreign_key.principal_to_dependent)
            };
            if expected != (navigation.declaring_type, Some(id)) {
                return Err(Error::invariant(format!(
                    "navigation '{}' is not linked from its foreign key",
                    navigation.name
                )));
            }
        }
        trace!(entity_types = self.entity_types.len(), "model validated");
        Ok(())
    }

    fn validate_entity_type(&self, id: EntityTypeId) -> Result<()> {
        let et = self.entity_type(id)?;
        let name = &et.name;

        // Walking ancestors fails on a cycle.
        self.ancestors(id)?;
        if let Some(base) = et.base_type {
            if !self.entity_type(base)?.derived_types.contains(&id) {
                return Err(Error::invariant(format!(
                    "'{name}' is missing from its base type's derived types"
                )));
            }
            if et.primary_key.is_some() {
                return Err(Error::invariant(format!("derived type '{name}' has a primary key")));
            }
            if !et.discriminator_sources.is_empty() {
                return Err(Error::invariant(format!(
                    "derived type '{name}' carries a discriminator property"
                )));
            }
        }
        for &derived in &et.derived_types {
            if self.entity_type(derived)?.base_type != Some(id) {
                return Err(Error::invariant(format!(
                    "'{}' is listed as derived from '{name}' but has another base",
                    self.entity_name(derived)
                )));
            }
        }

        let visible = self.properties(id)?;
        let mut names = BTreeSet::new();
        for &p in &visible {
            if !names.insert(self.property(p)?.name.clone()) {
                return Err(Error::invariant(format!(
                    "property name '{}' is visible twice on '{name}'",
                    self.property(p)?.name
                )));
            }
        }
        for nav in self.navigations(id)? {
            if !names.insert(self.navigation(nav)?.name.clone()) {
                return Err(Error::invariant(format!(
                    "member name '{}' is visible twice on '{name}'",
                    self.navigation(nav)?.name
                )));
            }
        }

        for &p in &et.properties {
            let property = self.property(p)?;
            if property.declaring_type != id {
                return Err(Error::invariant(format!(
                    "property '{}' is listed on '{name}' but declared elsewhere",
                    property.name
                )));
            }
        }

        for &key in &et.keys {
            self.check_visible(id, &self.key(key)?.properties, "key")?;
        }
        if let Some(pk) = et.primary_key {
            for &p in &self.key(pk)?.properties {
                if self.property(self.resolve_property(p)?)?.is_nullable {
                    return Err(Error::invariant(format!(
                        "primary key of '{name}' contains a nullable property"
                    )));
                }
            }
        }
        for &index in &et.indexes {
            self.check_visible(id, &self.index(index)?.properties, "index")?;
        }
        for &fk in &et.foreign_keys {
            self.check_visible(id, &self.foreign_key(fk)?.properties, "foreign key")?;
        }
        Ok(())
    }

    fn check_visible(
        &self,
        id: EntityTypeId,
        properties: &[PropertyId],
        element: &str,
    ) -> Result<()> {
        let visible = self.properties(id)?;
        for &p in properties {
            if !visible.contains(&self.resolve_property(p)?) {
                return Err(Error::invariant(format!(
                    "{element} property '{}' is not visible on '{}'",
                    self.property(p)?.name,
                    self.entity_name(id)
                )));
            }
        }
        Ok(())
    }

    fn validate_foreign_key(&self, fk: ForeignKeyId) -> Result<()> {
        let foreign_key = self.foreign_key(fk)?;
        let key = self.key(foreign_key.principal_key)?;
        let principal = foreign_key.principal_type;
        if key.declaring_type != principal && !self.inherits_from(principal, key.declaring_type)? {
            return Err(Error::invariant(format!(
                "principal key of a foreign key on '{}' is outside the principal's hierarchy chain",
                self.entity_name(foreign_key.declaring_type)
            )));
        }
        if key.properties.len() != foreign_key.properties.len() {
            return Err(Error::invariant(format!(
                "foreign key {} on '{}' does not match its principal key arity",
                self.describe_properties(&foreign_key.properties),
                self.entity_name(foreign_key.declaring_type)
            )));
        }
        for (d, k) in foreign_key.properties.iter().zip(&key.properties) {
            if !self
                .property(*d)?
                .value_type
                .is_compatible_with(&self.property(*k)?.value_type)
            {
                return Err(Error::invariant(format!(
                    "foreign key {} on '{}' is incompatible with its principal key",
                    self.describe_properties(&foreign_key.properties),
                    self.entity_name(foreign_key.declaring_type)
                )));
            }
        }
        if !self
            .entity_type(foreign_key.declaring_type)?
            .foreign_keys
            .contains(&fk)
            || !self
                .entity_type(principal)?
                .referencing_foreign_keys
                .contains(&fk)
        {
            return Err(Error::invariant("foreign key is not registered on both ends"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::metadata::{ConfigurationSource, ScalarType, ValueType};

    #[test]
    fn test_empty_model_is_valid() {
        assert!(Model::new().validate().is_ok());
    }

    #[test]
    fn test_detects_broken_back_link() {
        let mut model = Model::with_config(ModelConfig::without_conventions());
        let a = model.add_entity_type("A", ConfigurationSource::Explicit).unwrap();
        let b = model.add_entity_type("B", ConfigurationSource::Explicit).unwrap();
        model
            .add_property(
                a,
                "Id",
                ValueType::required(ScalarType::Int32),
                ConfigurationSource::Explicit,
            )
            .unwrap();
        model.set_base_type(b, Some(a), ConfigurationSource::Explicit).unwrap();
        assert!(model.validate().is_ok());

        model.entity_type_mut(a).unwrap().derived_types.clear();
        let err = model.validate().unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }
}
