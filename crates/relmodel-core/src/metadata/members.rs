//! Property, key, index and ignore operations.

use super::entity_type::EntityTypeId;
use super::index::{Index, IndexId};
use super::key::{Key, KeyId};
use super::model::Model;
use super::property::{Property, PropertyId, ValueGenerated, NO_SHADOW_INDEX};
use super::source::ConfigurationSource;
use super::types::ValueType;
use crate::conventions::ConventionEvent;
use crate::error::{Error, ErrorCategory, Result};
use tracing::debug;

impl Model {
    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    /// Add a property to an entity type.
    pub fn add_property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        value_type: ValueType,
        source: ConfigurationSource,
    ) -> Result<PropertyId> {
        self.atomically(|m| m.add_property_core(entity, name, value_type, source))
    }

    pub(crate) fn add_property_core(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        value_type: ValueType,
        source: ConfigurationSource,
    ) -> Result<PropertyId> {
        let entity_name = self.entity_type(entity)?.name.clone();
        self.check_not_ignored(entity, name, source)?;

        if let Some(existing) = self.find_property(entity, name)? {
            let declaring = self.property(existing)?.declaring_type;
            return Err(Error::DuplicateProperty {
                property: name.to_string(),
                entity_type: entity_name,
                declaring_type: self.entity_name(declaring),
            });
        }
        if let Some(nav) = self.find_navigation(entity, name)? {
            let declaring = self.navigation(nav)?.declaring_type;
            return Err(Error::NavigationNameConflict {
                navigation: name.to_string(),
                entity_type: entity_name,
                conflicting_type: self.entity_name(declaring),
            });
        }

        // Declarations of the same name further down the hierarchy become
        // shadowed, provided their types agree.
        let mut to_shadow = Vec::new();
        for derived in self.derived_types(entity)? {
            if let Some(p) = self.find_declared_property(derived, name)? {
                let property = self.property(p)?;
                if !property.value_type.is_compatible_with(&value_type) {
                    return Err(Error::DuplicateProperty {
                        property: name.to_string(),
                        entity_type: entity_name,
                        declaring_type: self.entity_name(derived),
                    });
                }
                if property.shadowed_by.is_none() {
                    to_shadow.push(p);
                }
            }
            if self.find_declared_navigation(derived, name)?.is_some() {
                return Err(Error::NavigationNameConflict {
                    navigation: name.to_string(),
                    entity_type: entity_name,
                    conflicting_type: self.entity_name(derived),
                });
            }
        }

        let shadow_index = if self.is_backed_by_member(entity, name, value_type)? {
            NO_SHADOW_INDEX
        } else {
            self.entity_type_mut(entity)?.take_shadow_index()
        };

        let id = self
            .properties
            .insert(Property::new(name, entity, value_type, shadow_index, source));
        self.entity_type_mut(entity)?.properties.push(id);
        for p in to_shadow {
            self.property_mut(p)?.shadowed_by = Some(id);
        }
        debug!(entity_type = %entity_name, property = name, %value_type, %source, "property added");

        self.dispatch(ConventionEvent::PropertyAdded(id))?;
        Ok(id)
    }

    /// Remove a property.
    pub fn remove_property(
        &mut self,
        property: PropertyId,
        source: ConfigurationSource,
    ) -> Result<()> {
        self.atomically(|m| m.remove_property_core(property, source))
    }

    /// Removes a property. Performs every check before the first change so
    /// a failure leaves the model untouched.
    pub(crate) fn remove_property_core(
        &mut self,
        property: PropertyId,
        source: ConfigurationSource,
    ) -> Result<()> {
        let prop = self.property(property)?;
        let name = prop.name.clone();
        let entity = prop.declaring_type;
        let shadowed_by = prop.shadowed_by;
        let entity_name = self.entity_name(entity);

        if !source.overrides(Some(prop.source)) {
            return Err(Error::ConfigurationConflict {
                element: format!("property '{name}' of '{entity_name}'"),
                existing: prop.source,
                requested: source,
            });
        }
        for (_, key) in self.keys.iter() {
            if key.properties.contains(&property) {
                return Err(Error::PropertyInUse {
                    property: name,
                    entity_type: entity_name,
                    used_by: format!("key {}", self.describe_properties(&key.properties)),
                });
            }
        }
        for (_, fk) in self.foreign_keys.iter() {
            if fk.properties.contains(&property) {
                return Err(Error::PropertyInUse {
                    property: name,
                    entity_type: entity_name,
                    used_by: format!(
                        "foreign key {} on '{}'",
                        self.describe_properties(&fk.properties),
                        self.entity_name(fk.declaring_type)
                    ),
                });
            }
        }
        let mut indexes = Vec::new();
        for (id, index) in self.indexes.iter() {
            if index.properties.contains(&property) {
                if !source.overrides(Some(index.source)) {
                    return Err(Error::PropertyInUse {
                        property: name,
                        entity_type: entity_name,
                        used_by: format!("index {}", self.describe_properties(&index.properties)),
                    });
                }
                indexes.push(id);
            }
        }

        for index in indexes {
            self.remove_index_core(index)?;
        }
        let shadowed: Vec<PropertyId> = self
            .properties
            .iter()
            .filter(|(_, p)| p.shadowed_by == Some(property))
            .map(|(id, _)| id)
            .collect();
        for p in shadowed {
            self.property_mut(p)?.shadowed_by = shadowed_by;
        }
        self.entity_type_mut(entity)?
            .properties
            .retain(|p| *p != property);
        self.properties.remove(property);
        debug!(entity_type = %entity_name, property = %name, "property removed");

        self.dispatch(ConventionEvent::PropertyRemoved {
            entity_type: entity,
            name,
        })
    }

    /// Make a property nullable or required.
    pub fn set_property_nullable(&mut self, property: PropertyId, nullable: bool) -> Result<()> {
        self.atomically(|m| {
            if nullable {
                m.check_can_be_nullable(property)?;
            }
            m.property_mut(property)?.is_nullable = nullable;
            m.dispatch(ConventionEvent::PropertyChanged(property))
        })
    }

    pub(crate) fn check_can_be_nullable(&self, property: PropertyId) -> Result<()> {
        let prop = self.property(property)?;
        let reason = if !prop.value_type.optional {
            Some(format!("its type {} cannot hold null", prop.value_type))
        } else if self
            .keys
            .iter()
            .any(|(_, key)| key.properties.contains(&property))
        {
            Some("it is part of a key".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::CannotBeNullable {
                property: prop.name.clone(),
                entity_type: self.entity_name(prop.declaring_type),
                reason,
            }),
            None => Ok(()),
        }
    }

    pub fn set_value_generated(
        &mut self,
        property: PropertyId,
        value_generated: ValueGenerated,
    ) -> Result<()> {
        self.atomically(|m| {
            m.property_mut(property)?.value_generated = value_generated;
            m.dispatch(ConventionEvent::PropertyChanged(property))
        })
    }

    pub fn set_concurrency_token(
        &mut self,
        property: PropertyId,
        concurrency_token: bool,
    ) -> Result<()> {
        self.atomically(|m| {
            m.property_mut(property)?.is_concurrency_token = concurrency_token;
            m.dispatch(ConventionEvent::PropertyChanged(property))
        })
    }

    pub fn set_requires_value_generator(
        &mut self,
        property: PropertyId,
        required: bool,
    ) -> Result<()> {
        self.atomically(|m| {
            m.property_mut(property)?.requires_value_generator = required;
            m.dispatch(ConventionEvent::PropertyChanged(property))
        })
    }

    fn check_all_visible(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Result<bool> {
        for &p in properties {
            self.property(p)?;
        }
        let visible = self.properties(entity)?;
        Ok(properties.iter().all(|p| visible.contains(p)))
    }

    // ---------------------------------------------------------------------
    // Keys
    // ---------------------------------------------------------------------

    /// Designate the primary key of a hierarchy root.
    pub fn set_primary_key(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> Result<KeyId> {
        self.atomically(|m| m.set_primary_key_core(entity, properties, source))
    }

    fn set_primary_key_core(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> Result<KeyId> {
        let et = self.entity_type(entity)?;
        let entity_name = et.name.clone();
        if et.base_type.is_some() {
            return Err(Error::DerivedTypeCannotHaveKeys {
                entity_type: entity_name,
            });
        }
        if properties.is_empty() {
            return Err(Error::EmptyKey {
                entity_type: entity_name,
            });
        }
        if !self.check_all_visible(entity, properties)? {
            return Err(Error::KeyPropertiesNotOnEntity {
                properties: self.describe_properties(properties),
                entity_type: entity_name,
            });
        }

        let et = self.entity_type(entity)?;
        let previous = et.primary_key;
        let previous_source = et.primary_key_source;
        if let Some(previous) = previous {
            if self.key(previous)?.properties == properties {
                let pk_source = source.max_with(previous_source);
                self.entity_type_mut(entity)?.primary_key_source = Some(pk_source);
                let key = self.key_mut(previous)?;
                key.source = source.max_with(Some(key.source));
                return Ok(previous);
            }
            if !source.overrides(previous_source) {
                return Err(Error::ConfigurationConflict {
                    element: format!("primary key of '{entity_name}'"),
                    existing: previous_source.unwrap_or(source),
                    requested: source,
                });
            }
        }

        let key = self.add_key_core(entity, properties, source)?;
        let et = self.entity_type_mut(entity)?;
        et.primary_key = Some(key);
        et.primary_key_source = Some(source);
        et.demoted_primary_key = None;
        for &p in properties {
            self.property_mut(p)?.is_nullable = false;
        }

        if let Some(previous) = previous {
            let unused = !self
                .foreign_keys
                .iter()
                .any(|(_, fk)| fk.principal_key == previous);
            if unused && self.key(previous)?.source == ConfigurationSource::Convention {
                self.remove_key_core(previous)?;
            }
        }
        debug!(
            entity_type = %entity_name,
            key = %self.describe_properties(properties),
            %source,
            "primary key set"
        );

        self.dispatch(ConventionEvent::PrimaryKeyChanged {
            entity_type: entity,
            previous,
        })?;
        Ok(key)
    }

    /// Add an alternate key.
    pub fn add_key(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> Result<KeyId> {
        self.atomically(|m| m.add_key_core(entity, properties, source))
    }

    pub(crate) fn add_key_core(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> Result<KeyId> {
        let entity_name = self.entity_type(entity)?.name.clone();
        if properties.is_empty() {
            return Err(Error::EmptyKey {
                entity_type: entity_name,
            });
        }
        if !self.check_all_visible(entity, properties)? {
            return Err(Error::KeyPropertiesNotOnEntity {
                properties: self.describe_properties(properties),
                entity_type: entity_name,
            });
        }

        let resolved = self.resolve_properties(properties)?;
        let mut declared = None;
        for &existing in &self.entity_type(entity)?.keys {
            if self.key(existing)?.properties == properties {
                declared = Some(existing);
                break;
            }
        }
        if let Some(existing) = declared {
            let key = self.key_mut(existing)?;
            key.source = source.max_with(Some(key.source));
            return Ok(existing);
        }
        let root = self.root_of(entity)?;
        for member in self.derived_types_inclusive(root)? {
            for &existing in &self.entity_type(member)?.keys {
                if self.resolve_properties(&self.key(existing)?.properties)? == resolved {
                    return Err(Error::DuplicateKey {
                        properties: self.describe_properties(properties),
                        entity_type: entity_name,
                    });
                }
            }
        }

        let key = self
            .keys
            .insert(Key::new(entity, properties.to_vec(), source));
        self.entity_type_mut(entity)?.keys.push(key);
        for &p in properties {
            self.property_mut(p)?.is_nullable = false;
        }
        debug!(
            entity_type = %entity_name,
            key = %self.describe_properties(properties),
            "key added"
        );

        self.dispatch(ConventionEvent::KeyAdded(key))?;
        Ok(key)
    }

    /// Remove a key that no foreign key targets.
    pub fn remove_key(&mut self, key: KeyId, source: ConfigurationSource) -> Result<()> {
        self.atomically(|m| {
            let k = m.key(key)?;
            let entity = k.declaring_type;
            if !source.overrides(Some(k.source)) {
                return Err(Error::ConfigurationConflict {
                    element: format!(
                        "key {} of '{}'",
                        m.describe_properties(&k.properties),
                        m.entity_name(entity)
                    ),
                    existing: k.source,
                    requested: source,
                });
            }
            for (_, fk) in m.foreign_keys.iter() {
                if fk.principal_key == key {
                    return Err(Error::KeyInUse {
                        key: m.describe_properties(&k.properties),
                        entity_type: m.entity_name(entity),
                        referencing_type: m.entity_name(fk.declaring_type),
                    });
                }
            }

            let was_primary = m.is_primary_key(key)?;
            m.remove_key_core(key)?;
            if was_primary {
                m.dispatch(ConventionEvent::PrimaryKeyChanged {
                    entity_type: entity,
                    previous: Some(key),
                })?;
            }
            Ok(())
        })
    }

    pub(crate) fn remove_key_core(&mut self, key: KeyId) -> Result<()> {
        let entity = self.key(key)?.declaring_type;
        let et = self.entity_type_mut(entity)?;
        et.keys.retain(|k| *k != key);
        if et.primary_key == Some(key) {
            et.primary_key = None;
            et.primary_key_source = None;
        }
        if matches!(et.demoted_primary_key, Some((demoted, _)) if demoted == key) {
            et.demoted_primary_key = None;
        }
        self.keys.remove(key);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Indexes
    // ---------------------------------------------------------------------

    /// Add an index.
    pub fn add_index(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> Result<IndexId> {
        self.atomically(|m| m.add_index_core(entity, properties, source))
    }

    pub(crate) fn add_index_core(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: ConfigurationSource,
    ) -> Result<IndexId> {
        let entity_name = self.entity_type(entity)?.name.clone();
        if properties.is_empty() {
            return Err(Error::EmptyPropertyList {
                element: "index",
                entity_type: entity_name,
            });
        }
        if !self.check_all_visible(entity, properties)? {
            return Err(Error::IndexPropertiesNotOnEntity {
                properties: self.describe_properties(properties),
                entity_type: entity_name,
            });
        }

        let mut declared = None;
        for &existing in &self.entity_type(entity)?.indexes {
            if self.index(existing)?.properties == properties {
                declared = Some(existing);
                break;
            }
        }
        if let Some(existing) = declared {
            let index = self.index_mut(existing)?;
            index.source = source.max_with(Some(index.source));
            return Ok(existing);
        }
        let resolved = self.resolve_properties(properties)?;
        let mut related = self.ancestors(entity)?;
        related.extend(self.derived_types(entity)?);
        for member in related {
            for &existing in &self.entity_type(member)?.indexes {
                if self.resolve_properties(&self.index(existing)?.properties)? == resolved {
                    return Err(Error::DuplicateIndex {
                        properties: self.describe_properties(properties),
                        entity_type: entity_name,
                    });
                }
            }
        }

        let index = self
            .indexes
            .insert(Index::new(entity, properties.to_vec(), source));
        self.entity_type_mut(entity)?.indexes.push(index);
        debug!(
            entity_type = %entity_name,
            index = %self.describe_properties(properties),
            "index added"
        );

        self.dispatch(ConventionEvent::IndexAdded(index))?;
        Ok(index)
    }

    /// Remove an index.
    pub fn remove_index(&mut self, index: IndexId, source: ConfigurationSource) -> Result<()> {
        self.atomically(|m| {
            let existing = m.index(index)?.source;
            if !source.overrides(Some(existing)) {
                return Err(Error::ConfigurationConflict {
                    element: format!(
                        "index {}",
                        m.describe_properties(&m.index(index)?.properties)
                    ),
                    existing,
                    requested: source,
                });
            }
            m.remove_index_core(index)
        })
    }

    pub(crate) fn remove_index_core(&mut self, index: IndexId) -> Result<()> {
        let entity = self.index(index)?.declaring_type;
        self.entity_type_mut(entity)?.indexes.retain(|i| *i != index);
        self.indexes.remove(index);
        Ok(())
    }

    pub fn set_index_unique(&mut self, index: IndexId, unique: bool) -> Result<()> {
        self.atomically(|m| {
            m.index_mut(index)?.is_unique = unique;
            m.dispatch(ConventionEvent::IndexUniquenessChanged(index))
        })
    }

    // ---------------------------------------------------------------------
    // Ignored members
    // ---------------------------------------------------------------------

    /// Exclude a member from the model.
    pub fn ignore_member(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<()> {
        self.atomically(|m| m.ignore_member_core(entity, name, source))
    }

    fn ignore_member_core(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<()> {
        let entity_name = self.entity_type(entity)?.name.clone();
        if let Some(existing) = self.entity_type(entity)?.ignored.get(name) {
            if *existing >= source {
                return Ok(());
            }
        }

        if let Some(nav) = self.find_navigation(entity, name)? {
            let navigation = self.navigation(nav)?;
            let declaring = navigation.declaring_type;
            let fk = navigation.foreign_key;
            if declaring != entity {
                return self.inherited_ignore(entity_name, name, declaring, source);
            }
            let fk_source = self.foreign_key(fk)?.source;
            if !source.overrides(Some(fk_source)) {
                return Err(Error::ConfigurationConflict {
                    element: format!("navigation '{name}' of '{entity_name}'"),
                    existing: fk_source,
                    requested: source,
                });
            }
            self.remove_foreign_key_core(fk)?;
        } else if let Some(p) = self.find_property(entity, name)? {
            let declaring = self.property(p)?.declaring_type;
            if declaring != entity {
                return self.inherited_ignore(entity_name, name, declaring, source);
            }
            self.remove_property_core(p, source)?;
        }

        for derived in self.derived_types(entity)? {
            if let Some(nav) = self.find_declared_navigation(derived, name)? {
                let fk = self.navigation(nav)?.foreign_key;
                if source.overrides(Some(self.foreign_key(fk)?.source)) {
                    self.remove_foreign_key_core(fk)?;
                }
            }
            if let Some(p) = self.find_declared_property(derived, name)? {
                match self.remove_property_core(p, source) {
                    Ok(()) => {}
                    Err(err) if err.category() == ErrorCategory::Internal => return Err(err),
                    Err(err) => {
                        debug!(
                            entity_type = %self.entity_name(derived),
                            property = name,
                            error = %err,
                            "derived declaration kept"
                        );
                    }
                }
            }
            let derived_type = self.entity_type_mut(derived)?;
            if matches!(derived_type.ignored.get(name), Some(s) if *s <= source) {
                derived_type.ignored.remove(name);
            }
        }

        self.entity_type_mut(entity)?
            .ignored
            .insert(name.to_string(), source);
        debug!(entity_type = %entity_name, member = name, %source, "member ignored");

        self.dispatch(ConventionEvent::MemberIgnored {
            entity_type: entity,
            name: name.to_string(),
        })
    }

    fn inherited_ignore(
        &self,
        entity_name: String,
        name: &str,
        declaring: EntityTypeId,
        source: ConfigurationSource,
    ) -> Result<()> {
        if source == ConfigurationSource::Convention {
            return Ok(());
        }
        Err(Error::InheritedMemberCannotBeIgnored {
            member: name.to_string(),
            entity_type: entity_name,
            declaring_type: self.entity_name(declaring),
        })
    }

    /// Lift an ignore recorded on the entity type. Conventions may then
    /// rediscover the member.
    pub fn unignore_member(&mut self, entity: EntityTypeId, name: &str) -> Result<()> {
        self.atomically(|m| {
            if m.entity_type_mut(entity)?.ignored.remove(name).is_none() {
                return Ok(());
            }
            debug!(entity_type = %m.entity_name(entity), member = name, "member unignored");
            m.dispatch(ConventionEvent::MemberUnignored {
                entity_type: entity,
                name: name.to_string(),
            })
        })
    }

    /// Fails if `name` is ignored with a source stronger than `source`;
    /// otherwise lifts the ignore along the chain.
    pub(crate) fn check_not_ignored(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<()> {
        let Some(ignored) = self.is_ignored(entity, name)? else {
            return Ok(());
        };
        if !source.overrides(Some(ignored)) {
            return Err(Error::ConfigurationConflict {
                element: format!("ignored member '{}' of '{}'", name, self.entity_name(entity)),
                existing: ignored,
                requested: source,
            });
        }
        for ty in self.chain_root_first(entity)? {
            self.entity_type_mut(ty)?.ignored.remove(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::metadata::ScalarType;

    fn bare_model() -> Model {
        Model::with_config(ModelConfig::without_conventions())
    }

    fn int() -> ValueType {
        ValueType::required(ScalarType::Int32)
    }

    const EXPLICIT: ConfigurationSource = ConfigurationSource::Explicit;

    #[test]
    fn test_duplicate_property() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        model.add_property(customer, "Id", int(), EXPLICIT).unwrap();

        let err = model.add_property(customer, "Id", int(), EXPLICIT).unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty { .. }));
    }

    #[test]
    fn test_shadow_indexes_are_consecutive() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let a = model.add_property(customer, "A", int(), EXPLICIT).unwrap();
        let b = model.add_property(customer, "B", int(), EXPLICIT).unwrap();

        assert_eq!(model.property(a).unwrap().shadow_index(), 0);
        assert_eq!(model.property(b).unwrap().shadow_index(), 1);
        assert!(model.property(b).unwrap().is_shadow());
    }

    #[test]
    fn test_primary_key_forces_non_nullable() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let id = model
            .add_property(customer, "Id", ValueType::optional(ScalarType::Int32), EXPLICIT)
            .unwrap();
        assert!(model.property(id).unwrap().is_nullable());

        let pk = model.set_primary_key(customer, &[id], EXPLICIT).unwrap();
        assert!(!model.property(id).unwrap().is_nullable());
        assert_eq!(model.primary_key(customer).unwrap(), Some(pk));

        let err = model.set_property_nullable(id, true).unwrap_err();
        assert!(matches!(err, Error::CannotBeNullable { .. }));
    }

    #[test]
    fn test_primary_key_replacement_keeps_old_as_alternate() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let id = model.add_property(customer, "Id", int(), EXPLICIT).unwrap();
        let code = model.add_property(customer, "Code", int(), EXPLICIT).unwrap();

        let first = model.set_primary_key(customer, &[id], EXPLICIT).unwrap();
        let second = model.set_primary_key(customer, &[code], EXPLICIT).unwrap();

        assert_eq!(model.primary_key(customer).unwrap(), Some(second));
        assert!(!model.is_primary_key(first).unwrap());
        assert_eq!(model.declared_keys(customer).unwrap(), &[first, second]);
    }

    #[test]
    fn test_weaker_primary_key_is_rejected() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let id = model.add_property(customer, "Id", int(), EXPLICIT).unwrap();
        let code = model.add_property(customer, "Code", int(), EXPLICIT).unwrap();
        model.set_primary_key(customer, &[id], EXPLICIT).unwrap();

        let err = model
            .set_primary_key(customer, &[code], ConfigurationSource::Convention)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationConflict { .. }));
    }

    #[test]
    fn test_empty_and_foreign_key_properties() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let order = model.add_entity_type("Order", EXPLICIT).unwrap();
        let order_id = model.add_property(order, "Id", int(), EXPLICIT).unwrap();

        assert!(matches!(
            model.set_primary_key(customer, &[], EXPLICIT).unwrap_err(),
            Error::EmptyKey { .. }
        ));
        assert!(matches!(
            model.set_primary_key(customer, &[order_id], EXPLICIT).unwrap_err(),
            Error::KeyPropertiesNotOnEntity { .. }
        ));
    }

    #[test]
    fn test_remove_property_in_use() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let id = model.add_property(customer, "Id", int(), EXPLICIT).unwrap();
        model.set_primary_key(customer, &[id], EXPLICIT).unwrap();

        let err = model.remove_property(id, EXPLICIT).unwrap_err();
        assert!(matches!(err, Error::PropertyInUse { .. }));
        assert!(model.property(id).is_ok());
    }

    #[test]
    fn test_remove_property_drops_indexes() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let name = model
            .add_property(customer, "Name", ValueType::optional(ScalarType::String), EXPLICIT)
            .unwrap();
        let index = model.add_index(customer, &[name], EXPLICIT).unwrap();

        model.remove_property(name, EXPLICIT).unwrap();
        assert!(model.index(index).is_err());
        assert!(model.declared_indexes(customer).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_index() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let name = model.add_property(customer, "Name", int(), EXPLICIT).unwrap();
        let first = model.add_index(customer, &[name], ConfigurationSource::Convention).unwrap();
        let again = model.add_index(customer, &[name], EXPLICIT).unwrap();

        assert_eq!(first, again);
        assert_eq!(model.index(first).unwrap().configuration_source(), EXPLICIT);
    }

    #[test]
    fn test_cannot_make_required_type_nullable() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let age = model.add_property(customer, "Age", int(), EXPLICIT).unwrap();

        let err = model.set_property_nullable(age, true).unwrap_err();
        assert!(matches!(err, Error::CannotBeNullable { .. }));
        model.set_property_nullable(age, false).unwrap();
    }

    #[test]
    fn test_ignore_and_restore_property() {
        let mut model = bare_model();
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        model.add_property(customer, "Notes", int(), EXPLICIT).unwrap();

        model.ignore_member(customer, "Notes", EXPLICIT).unwrap();
        assert!(model.find_property(customer, "Notes").unwrap().is_none());
        assert_eq!(model.is_ignored(customer, "Notes").unwrap(), Some(EXPLICIT));

        let err = model
            .add_property(customer, "Notes", int(), ConfigurationSource::Convention)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationConflict { .. }));

        model.add_property(customer, "Notes", int(), EXPLICIT).unwrap();
        assert!(model.is_ignored(customer, "Notes").unwrap().is_none());
    }

    #[test]
    fn test_inherited_member_cannot_be_ignored() {
        let mut model = bare_model();
        let animal = model.add_entity_type("Animal", EXPLICIT).unwrap();
        let cat = model.add_entity_type("Cat", EXPLICIT).unwrap();
        model.add_property(animal, "Name", int(), EXPLICIT).unwrap();
        model.set_base_type(cat, Some(animal), EXPLICIT).unwrap();

        let err = model.ignore_member(cat, "Name", EXPLICIT).unwrap_err();
        assert!(matches!(err, Error::InheritedMemberCannotBeIgnored { .. }));
        model
            .ignore_member(cat, "Name", ConfigurationSource::Convention)
            .unwrap();
        assert!(model.find_property(cat, "Name").unwrap().is_some());
    }

    #[test]
    fn test_derived_declaration_shadowed_by_new_base_property() {
        let mut model = bare_model();
        let animal = model.add_entity_type("Animal", EXPLICIT).unwrap();
        let cat = model.add_entity_type("Cat", EXPLICIT).unwrap();
        model.set_base_type(cat, Some(animal), EXPLICIT).unwrap();
        let cat_name = model.add_property(cat, "Name", int(), EXPLICIT).unwrap();

        let animal_name = model.add_property(animal, "Name", int(), EXPLICIT).unwrap();
        assert_eq!(model.property(cat_name).unwrap().shadowed_by(), Some(animal_name));
        assert_eq!(model.find_property(cat, "Name").unwrap(), Some(animal_name));

        model.remove_property(animal_name, EXPLICIT).unwrap();
        assert_eq!(model.find_property(cat, "Name").unwrap(), Some(cat_name));

        let err = model
            .add_property(animal, "Name", ValueType::required(ScalarType::String), EXPLICIT)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty { .. }));
    }

    /// Records facet events and vetoes concurrency tokens and unique indexes.
    struct FacetGuard {
        seen: std::sync::Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl crate::conventions::Convention for FacetGuard {
        fn name(&self) -> &'static str {
            "facet_guard"
        }

        fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
            match event {
                ConventionEvent::PropertyChanged(p) => {
                    self.seen.lock().unwrap().push(event.kind());
                    if model.property(*p)?.is_concurrency_token() {
                        return Err(Error::invariant("no concurrency tokens"));
                    }
                    Ok(())
                }
                ConventionEvent::IndexUniquenessChanged(i) => {
                    self.seen.lock().unwrap().push(event.kind());
                    if model.index(*i)?.is_unique() {
                        return Err(Error::invariant("no unique indexes"));
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_facet_changes_dispatch_and_roll_back() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let set = crate::conventions::ConventionSet::empty().with(FacetGuard {
            seen: seen.clone(),
        });
        let mut model = Model::with_conventions(ModelConfig::default(), set);
        let customer = model.add_entity_type("Customer", EXPLICIT).unwrap();
        let name = model
            .add_property(customer, "Name", ValueType::optional(ScalarType::String), EXPLICIT)
            .unwrap();
        let index = model.add_index(customer, &[name], EXPLICIT).unwrap();

        model.set_property_nullable(name, false).unwrap();
        model.set_value_generated(name, ValueGenerated::OnAdd).unwrap();
        model.set_requires_value_generator(name, true).unwrap();
        assert!(!model.property(name).unwrap().is_nullable());
        assert_eq!(model.property(name).unwrap().value_generated(), ValueGenerated::OnAdd);

        let before = model.snapshot().unwrap();
        let err = model.set_concurrency_token(name, true).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
        assert!(!model.property(name).unwrap().is_concurrency_token());

        let err = model.set_index_unique(index, true).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
        assert!(!model.index(index).unwrap().is_unique());
        assert_eq!(model.snapshot().unwrap(), before);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "property_changed",
                "property_changed",
                "property_changed",
                "property_changed",
                "index_uniqueness_changed",
            ]
        );
    }
}
