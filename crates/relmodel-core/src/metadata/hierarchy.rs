//! Hierarchy reconfiguration: setting and clearing an entity type's base.
//!
//! Attaching D below B demotes D's primary key, shadows D's duplicates of
//! B's properties and extends D's principal-side relationships to D's new
//! siblings. Detaching reverses the shadowing and the demotion, copies
//! inherited properties that D's own keys, indexes and foreign keys still
//! need, and replays D's configured relationships.

use super::entity_type::EntityTypeId;
use super::key::{Key, KeyId};
use super::model::Model;
use super::property::{Property, PropertyId, NO_SHADOW_INDEX};
use super::relationship::RelationshipConfig;
use super::source::ConfigurationSource;
use super::types::ValueType;
use crate::conventions::ConventionEvent;
use crate::error::{Error, ErrorCategory, Result};
use crate::relational::names::DISCRIMINATOR_PROPERTY;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

impl Model {
    /// Set (or with `None`, clear) the base type of an entity type.
    #[instrument(level = "debug", skip(self))]
    pub fn set_base_type(
        &mut self,
        entity: EntityTypeId,
        base: Option<EntityTypeId>,
        source: ConfigurationSource,
    ) -> Result<()> {
        self.atomically(|m| m.set_base_type_core(entity, base, source))
    }

    fn set_base_type_core(
        &mut self,
        entity: EntityTypeId,
        base: Option<EntityTypeId>,
        source: ConfigurationSource,
    ) -> Result<()> {
        let et = self.entity_type(entity)?;
        let previous = et.base_type;
        let previous_source = et.base_type_source;
        if let Some(base) = base {
            self.entity_type(base)?;
        }

        if previous == base {
            self.entity_type_mut(entity)?.base_type_source = Some(source.max_with(previous_source));
            return Ok(());
        }
        if !source.overrides(previous_source) {
            return Err(Error::ConfigurationConflict {
                element: format!("base type of '{}'", self.entity_name(entity)),
                existing: previous_source.unwrap_or(source),
                requested: source,
            });
        }
        if let Some(base) = base {
            self.validate_base_type(entity, base, source)?;
        }

        if previous.is_some() {
            self.detach_from_base(entity)?;
        }
        if let Some(base) = base {
            self.attach_to_base(entity, base)?;
        }
        self.entity_type_mut(entity)?.base_type_source = Some(source);
        debug!(
            entity_type = %self.entity_name(entity),
            base_type = ?base.map(|b| self.entity_name(b)),
            "base type changed"
        );

        self.dispatch(ConventionEvent::BaseTypeChanged {
            entity_type: entity,
            previous,
        })
    }

    fn validate_base_type(
        &self,
        entity: EntityTypeId,
        base: EntityTypeId,
        source: ConfigurationSource,
    ) -> Result<()> {
        let entity_name = self.entity_name(entity);
        let base_name = self.entity_name(base);
        if base == entity || self.inherits_from(base, entity)? {
            return Err(Error::CircularInheritance {
                entity_type: entity_name,
                base_type: base_name,
            });
        }

        let mut base_properties: BTreeMap<String, ValueType> = BTreeMap::new();
        for p in self.properties(base)? {
            let property = self.property(p)?;
            base_properties.insert(property.name.clone(), property.value_type);
        }
        let mut base_navigations = Vec::new();
        for nav in self.navigations(base)? {
            base_navigations.push(self.navigation(nav)?.name.clone());
        }

        for member in self.derived_types_inclusive(entity)? {
            for &p in &self.entity_type(member)?.properties {
                let property = self.property(p)?;
                if let Some(base_type) = base_properties.get(&property.name) {
                    if !base_type.is_compatible_with(&property.value_type) {
                        return Err(Error::DuplicatePropertyOnBaseType {
                            entity_type: entity_name,
                            base_type: base_name,
                            property: property.name.clone(),
                        });
                    }
                }
                if base_navigations.contains(&property.name) {
                    return Err(Error::NavigationNameConflict {
                        navigation: property.name.clone(),
                        entity_type: self.entity_name(member),
                        conflicting_type: base_name,
                    });
                }
            }
            for &nav in &self.entity_type(member)?.navigations {
                let name = &self.navigation(nav)?.name;
                if base_navigations.contains(name) || base_properties.contains_key(name) {
                    return Err(Error::DuplicateNavigationOnBaseType {
                        entity_type: entity_name,
                        base_type: base_name,
                        navigation: name.clone(),
                    });
                }
            }
        }

        let et = self.entity_type(entity)?;
        if et.primary_key.is_some() && self.primary_key(base)?.is_none() {
            return Err(Error::DerivedTypeCannotHaveKeys {
                entity_type: entity_name,
            });
        }
        let pinned = et
            .discriminator_sources
            .values()
            .any(|&d| d != ConfigurationSource::Convention && !source.overrides(Some(d)));
        if pinned {
            return Err(Error::DiscriminatorPropertyMustBeOnRoot {
                entity_type: entity_name,
            });
        }
        Ok(())
    }

    fn attach_to_base(&mut self, entity: EntityTypeId, base: EntityTypeId) -> Result<()> {
        let mut base_properties: BTreeMap<String, PropertyId> = BTreeMap::new();
        for p in self.properties(base)? {
            base_properties.insert(self.property(p)?.name.clone(), p);
        }
        let mut to_shadow = Vec::new();
        for member in self.derived_types_inclusive(entity)? {
            for &p in &self.entity_type(member)?.properties {
                let property = self.property(p)?;
                if property.shadowed_by.is_none() {
                    if let Some(&base_property) = base_properties.get(&property.name) {
                        to_shadow.push((p, base_property));
                    }
                }
            }
        }

        let et = self.entity_type_mut(entity)?;
        if let Some(pk) = et.primary_key.take() {
            let pk_source = et
                .primary_key_source
                .take()
                .unwrap_or(ConfigurationSource::Convention);
            et.demoted_primary_key = Some((pk, pk_source));
        }
        if !std::mem::take(&mut et.discriminator_sources).is_empty() {
            et.annotations
                .remove_with_suffix(&format!(":{DISCRIMINATOR_PROPERTY}"));
        }
        et.base_type = Some(base);

        let name = self.entity_name(entity);
        let mut position = 0;
        for &sibling in &self.entity_type(base)?.derived_types {
            if self.entity_type(sibling)?.name < name {
                position += 1;
            }
        }
        self.entity_type_mut(base)?
            .derived_types
            .insert(position, entity);

        for (p, base_property) in to_shadow {
            self.property_mut(p)?.shadowed_by = Some(base_property);
        }

        self.fix_up_siblings_after_attach(entity, base)
    }

    /// Gives every other direct derived type of `base` the principal-side
    /// relationships `entity` declares.
    fn fix_up_siblings_after_attach(
        &mut self,
        entity: EntityTypeId,
        base: EntityTypeId,
    ) -> Result<()> {
        let siblings: Vec<EntityTypeId> = self
            .entity_type(base)?
            .derived_types
            .iter()
            .copied()
            .filter(|s| *s != entity)
            .collect();
        if siblings.is_empty() {
            return Ok(());
        }
        let Some(pk) = self.primary_key(base)? else {
            return Ok(());
        };
        let pk_properties = self.key(pk)?.properties.clone();

        for fk in self.entity_type(entity)?.referencing_foreign_keys.clone() {
            let foreign_key = self.foreign_key(fk)?.clone();
            let Some(nav) = foreign_key.principal_to_dependent else {
                continue;
            };
            let dependent = foreign_key.declaring_type;
            if dependent == entity || self.inherits_from(dependent, entity)? {
                continue;
            }
            let nav_name = self.navigation(nav)?.name.clone();
            if !self.properties_match_key(&foreign_key.properties, &pk_properties)? {
                debug!(
                    navigation = %nav_name,
                    "key of hierarchy does not fit; skipping sibling fix-up"
                );
                continue;
            }

            for &sibling in &siblings {
                if self.check_member_name_free(sibling, &nav_name).is_err()
                    || self
                        .find_matching_foreign_key(dependent, &foreign_key.properties, sibling, pk)?
                        .is_some()
                {
                    debug!(
                        sibling = %self.entity_name(sibling),
                        navigation = %nav_name,
                        "skipping sibling fix-up"
                    );
                    continue;
                }
                let sibling_fk = self.add_foreign_key_core(
                    dependent,
                    &foreign_key.properties,
                    sibling,
                    Some(pk),
                    ConfigurationSource::Convention,
                )?;
                self.add_navigation_core(
                    sibling_fk,
                    &nav_name,
                    true,
                    ConfigurationSource::Convention,
                )?;
            }
        }
        Ok(())
    }

    fn properties_match_key(&self, properties: &[PropertyId], key: &[PropertyId]) -> Result<bool> {
        if properties.len() != key.len() {
            return Ok(false);
        }
        for (p, k) in properties.iter().zip(key) {
            if !self
                .property(*p)?
                .value_type
                .is_compatible_with(&self.property(*k)?.value_type)
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn detach_from_base(&mut self, entity: EntityTypeId) -> Result<()> {
        let Some(old_base) = self.entity_type(entity)?.base_type else {
            return Ok(());
        };
        let old_ancestors = self.ancestors(entity)?;

        self.entity_type_mut(old_base)?
            .derived_types
            .retain(|d| *d != entity);
        self.entity_type_mut(entity)?.base_type = None;

        let subtree = self.derived_types_inclusive(entity)?;

        // Un-shadow declarations hidden by the former ancestors.
        for &member in &subtree {
            for p in self.entity_type(member)?.properties.clone() {
                if let Some(by) = self.property(p)?.shadowed_by {
                    if old_ancestors.contains(&self.property(by)?.declaring_type) {
                        self.property_mut(p)?.shadowed_by = None;
                    }
                }
            }
        }

        // Keys, indexes and foreign keys of the subtree keep working on
        // copies of the inherited properties they used.
        let mut copies: BTreeMap<PropertyId, PropertyId> = BTreeMap::new();
        for &member in &subtree {
            let et = self.entity_type(member)?;
            let keys = et.keys.clone();
            let indexes = et.indexes.clone();
            let foreign_keys = et.foreign_keys.clone();

            for key in keys {
                let properties = self.key(key)?.properties.clone();
                let properties =
                    self.repoint(entity, &subtree, &old_ancestors, properties, &mut copies)?;
                self.key_mut(key)?.properties = properties;
            }
            for index in indexes {
                let properties = self.index(index)?.properties.clone();
                let properties =
                    self.repoint(entity, &subtree, &old_ancestors, properties, &mut copies)?;
                self.index_mut(index)?.properties = properties;
            }
            for fk in foreign_keys {
                let properties = self.foreign_key(fk)?.properties.clone();
                let properties =
                    self.repoint(entity, &subtree, &old_ancestors, properties, &mut copies)?;
                self.foreign_key_mut(fk)?.properties = properties;
            }
        }

        let et = self.entity_type_mut(entity)?;
        if let Some((key, key_source)) = et.demoted_primary_key.take() {
            if et.primary_key.is_none() && et.keys.contains(&key) {
                et.primary_key = Some(key);
                et.primary_key_source = Some(key_source);
            }
        }

        // Foreign keys into the subtree that targeted a key of the former
        // ancestors now target a key of the entity itself.
        for &member in &subtree {
            for fk in self.entity_type(member)?.referencing_foreign_keys.clone() {
                let principal_key = self.foreign_key(fk)?.principal_key;
                let key = self.key(principal_key)?;
                if !old_ancestors.contains(&key.declaring_type) {
                    continue;
                }
                let old_properties = key.properties.clone();
                let old_source = key.source;
                let replacement = self.replacement_key(
                    entity,
                    &subtree,
                    &old_ancestors,
                    old_properties,
                    old_source,
                    &mut copies,
                )?;
                self.foreign_key_mut(fk)?.principal_key = replacement;
            }
        }

        if !copies.is_empty() {
            debug!(
                entity_type = %self.entity_name(entity),
                copied = copies.len(),
                "copied inherited properties onto detached type"
            );
        }

        self.replay_relationship_intents(entity)
    }

    /// Replace properties declared on the former ancestors by copies on
    /// `entity`.
    fn repoint(
        &mut self,
        entity: EntityTypeId,
        subtree: &[EntityTypeId],
        old_ancestors: &[EntityTypeId],
        properties: Vec<PropertyId>,
        copies: &mut BTreeMap<PropertyId, PropertyId>,
    ) -> Result<Vec<PropertyId>> {
        let mut result = Vec::with_capacity(properties.len());
        for p in properties {
            if old_ancestors.contains(&self.property(p)?.declaring_type) {
                result.push(self.copy_onto(entity, subtree, p, copies)?);
            } else {
                result.push(p);
            }
        }
        Ok(result)
    }

    fn copy_onto(
        &mut self,
        entity: EntityTypeId,
        subtree: &[EntityTypeId],
        original: PropertyId,
        copies: &mut BTreeMap<PropertyId, PropertyId>,
    ) -> Result<PropertyId> {
        if let Some(&copy) = copies.get(&original) {
            return Ok(copy);
        }
        let template = self.property(original)?.clone();
        let name = template.name.clone();
        if let Some(existing) = self.find_declared_property(entity, &name)? {
            copies.insert(original, existing);
            return Ok(existing);
        }

        let shadow_index = if self.is_backed_by_member(entity, &name, template.value_type)? {
            NO_SHADOW_INDEX
        } else {
            self.entity_type_mut(entity)?.take_shadow_index()
        };
        let copy = self.properties.insert(Property {
            declaring_type: entity,
            shadow_index,
            shadowed_by: None,
            ..template
        });
        self.entity_type_mut(entity)?.properties.push(copy);

        for &member in subtree.iter().filter(|m| **m != entity) {
            if let Some(p) = self.find_declared_property(member, &name)? {
                if self.property(p)?.shadowed_by.is_none() {
                    self.property_mut(p)?.shadowed_by = Some(copy);
                }
            }
        }
        copies.insert(original, copy);
        Ok(copy)
    }

    pub(crate) fn is_backed_by_member(
        &self,
        entity: EntityTypeId,
        name: &str,
        value_type: ValueType,
    ) -> Result<bool> {
        Ok(self
            .entity_type(entity)?
            .shape
            .as_ref()
            .and_then(|shape| shape.member(name))
            .and_then(|member| member.value_type())
            .is_some_and(|member_type| member_type.is_compatible_with(&value_type)))
    }

    /// A key on `entity` standing in for a key of the former ancestors.
    fn replacement_key(
        &mut self,
        entity: EntityTypeId,
        subtree: &[EntityTypeId],
        old_ancestors: &[EntityTypeId],
        old_properties: Vec<PropertyId>,
        old_source: ConfigurationSource,
        copies: &mut BTreeMap<PropertyId, PropertyId>,
    ) -> Result<KeyId> {
        if let Some(pk) = self.entity_type(entity)?.primary_key {
            let pk_properties = self.key(pk)?.properties.clone();
            if self.properties_match_key(&pk_properties, &old_properties)? {
                return Ok(pk);
            }
        }

        let properties = self.repoint(entity, subtree, old_ancestors, old_properties, copies)?;
        for &existing in &self.entity_type(entity)?.keys {
            if self.key(existing)?.properties == properties {
                return Ok(existing);
            }
        }
        let key = self.keys.insert(Key::new(entity, properties, old_source));
        let et = self.entity_type_mut(entity)?;
        et.keys.push(key);
        if et.primary_key.is_none() {
            et.primary_key = Some(key);
            et.primary_key_source = Some(old_source);
        }
        Ok(key)
    }

    /// Recreate configured relationships that were only satisfied through
    /// the former base type.
    fn replay_relationship_intents(&mut self, entity: EntityTypeId) -> Result<()> {
        for intent in self.entity_type(entity)?.relationship_intents.clone() {
            if intent.source == ConfigurationSource::Convention {
                continue;
            }
            let Some(principal) = self.find_entity_type(&intent.principal) else {
                continue;
            };

            let mut satisfied = false;
            for fk in self.foreign_keys(entity)? {
                let foreign_key = self.foreign_key(fk)?;
                if foreign_key.principal_type != principal {
                    continue;
                }
                let nav_name = match foreign_key.dependent_to_principal {
                    Some(nav) => Some(self.navigation(nav)?.name.as_str()),
                    None => None,
                };
                if intent.navigation_to_principal.is_none()
                    || intent.navigation_to_principal.as_deref() == nav_name
                {
                    satisfied = true;
                    break;
                }
            }
            if satisfied {
                continue;
            }

            let mut config = RelationshipConfig::new(entity, principal)
                .with_foreign_key(intent.dependent_properties.clone());
            config.navigation_to_principal = intent.navigation_to_principal.clone();
            config.navigation_to_dependents = intent.navigation_to_dependents.clone();

            match self.atomically(|m| m.relationship_core(&config, intent.source)) {
                Ok(fk) => debug!(
                    entity_type = %self.entity_name(entity),
                    principal = %intent.principal,
                    ?fk,
                    "recreated configured relationship"
                ),
                Err(err) if err.category() == ErrorCategory::Internal => return Err(err),
                Err(err) => debug!(
                    entity_type = %self.entity_name(entity),
                    principal = %intent.principal,
                    error = %err,
                    "configured relationship could not be recreated"
                ),
            }
        }
        Ok(())
    }
}
