//! Foreign keys, navigations and the relationship operation.

use super::entity_type::{display_name, EntityTypeId, RelationshipIntent};
use super::foreign_key::{DeleteBehavior, ForeignKey, ForeignKeyId};
use super::key::KeyId;
use super::model::Model;
use super::navigation::{Navigation, NavigationId};
use super::property::PropertyId;
use super::source::ConfigurationSource;
use crate::conventions::ConventionEvent;
use crate::error::{Error, Result};
use tracing::debug;

/// Configuration of a relationship between a dependent and a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipConfig {
    /// Dependent entity type (holds the foreign key).
    pub dependent: EntityTypeId,
    /// Principal entity type.
    pub principal: EntityTypeId,
    /// Dependent property names; empty to derive them from the navigation
    /// or principal name.
    pub dependent_properties: Vec<String>,
    /// Principal key; the principal's primary key when absent.
    pub principal_key: Option<KeyId>,
    /// Navigation declared on the dependent.
    pub navigation_to_principal: Option<String>,
    /// Navigation declared on the principal.
    pub navigation_to_dependents: Option<String>,
    /// Whether the relationship is required.
    pub required: Option<bool>,
    /// Delete behavior.
    pub delete_behavior: Option<DeleteBehavior>,
}

impl RelationshipConfig {
    /// A relationship from `dependent` to `principal`.
    pub fn new(dependent: EntityTypeId, principal: EntityTypeId) -> Self {
        Self {
            dependent,
            principal,
            dependent_properties: Vec::new(),
            principal_key: None,
            navigation_to_principal: None,
            navigation_to_dependents: None,
            required: None,
            delete_behavior: None,
        }
    }

    /// Use the named dependent properties.
    pub fn with_foreign_key<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependent_properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Reference a specific principal key.
    pub fn with_principal_key(mut self, key: KeyId) -> Self {
        self.principal_key = Some(key);
        self
    }

    /// Name the navigation on the dependent.
    pub fn with_navigation_to_principal(mut self, name: impl Into<String>) -> Self {
        self.navigation_to_principal = Some(name.into());
        self
    }

    /// Name the navigation on the principal.
    pub fn with_navigation_to_dependents(mut self, name: impl Into<String>) -> Self {
        self.navigation_to_dependents = Some(name.into());
        self
    }

    /// Mark the relationship required or optional.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Set the delete behavior.
    pub fn on_delete(mut self, behavior: DeleteBehavior) -> Self {
        self.delete_behavior = Some(behavior);
        self
    }
}

impl Model {
    // ---------------------------------------------------------------------
    // Foreign keys
    // ---------------------------------------------------------------------

    /// Add a foreign key from `dependent_properties` of `dependent` to a key
    /// of `principal` (its primary key when `principal_key` is `None`).
    pub fn add_foreign_key(
        &mut self,
        dependent: EntityTypeId,
        dependent_properties: &[PropertyId],
        principal: EntityTypeId,
        principal_key: Option<KeyId>,
        source: ConfigurationSource,
    ) -> Result<ForeignKeyId> {
        self.atomically(|m| {
            m.add_foreign_key_core(
                dependent,
                dependent_properties,
                principal,
                principal_key,
                source,
            )
        })
    }

    pub(crate) fn add_foreign_key_core(
        &mut self,
        dependent: EntityTypeId,
        dependent_properties: &[PropertyId],
        principal: EntityTypeId,
        principal_key: Option<KeyId>,
        source: ConfigurationSource,
    ) -> Result<ForeignKeyId> {
        let dependent_name = self.entity_type(dependent)?.name.clone();
        let principal_name = self.entity_type(principal)?.name.clone();
        if dependent_properties.is_empty() {
            return Err(Error::EmptyPropertyList {
                element: "foreign key",
                entity_type: dependent_name,
            });
        }
        for &p in dependent_properties {
            self.property(p)?;
        }
        let visible = self.properties(dependent)?;
        if !dependent_properties.iter().all(|p| visible.contains(p)) {
            return Err(Error::ForeignKeyPropertiesNotOnEntity {
                properties: self.describe_properties(dependent_properties),
                entity_type: dependent_name,
            });
        }

        let principal_key = match principal_key {
            Some(key) => {
                let declaring = self.key(key)?.declaring_type;
                if declaring != principal && !self.inherits_from(principal, declaring)? {
                    return Err(Error::PrincipalKeyNotOnEntity {
                        key: self.describe_properties(&self.key(key)?.properties),
                        entity_type: principal_name,
                    });
                }
                key
            }
            None => self
                .primary_key(principal)?
                .ok_or_else(|| Error::NoPrincipalKey {
                    entity_type: principal_name.clone(),
                })?,
        };

        let key_properties = self.key(principal_key)?.properties.clone();
        let compatible = key_properties.len() == dependent_properties.len()
            && dependent_properties
                .iter()
                .zip(&key_properties)
                .try_fold(true, |ok, (d, k)| -> Result<bool> {
                    Ok(ok
                        && self
                            .property(*d)?
                            .value_type
                            .is_compatible_with(&self.property(*k)?.value_type))
                })?;
        if !compatible {
            return Err(Error::ForeignKeyTypeMismatch {
                dependent_type: dependent_name,
                dependent_properties: self.describe_properties(dependent_properties),
                principal_type: principal_name,
                principal_properties: self.describe_properties(&key_properties),
            });
        }

        if self
            .find_matching_foreign_key(dependent, dependent_properties, principal, principal_key)?
            .is_some()
        {
            return Err(Error::DuplicateForeignKey {
                properties: self.describe_properties(dependent_properties),
                entity_type: dependent_name,
                principal_type: principal_name,
            });
        }

        let fk = self.foreign_keys.insert(ForeignKey::new(
            dependent,
            dependent_properties.to_vec(),
            principal,
            principal_key,
            source,
        ));
        self.entity_type_mut(dependent)?.foreign_keys.push(fk);
        self.entity_type_mut(principal)?
            .referencing_foreign_keys
            .push(fk);
        debug!(
            dependent = %dependent_name,
            principal = %principal_name,
            properties = %self.describe_properties(dependent_properties),
            %source,
            "foreign key added"
        );

        self.dispatch(ConventionEvent::ForeignKeyAdded(fk))?;
        Ok(fk)
    }

    /// A foreign key visible on `dependent` with the same resolved
    /// properties, principal type and principal key.
    pub(crate) fn find_matching_foreign_key(
        &self,
        dependent: EntityTypeId,
        properties: &[PropertyId],
        principal: EntityTypeId,
        principal_key: KeyId,
    ) -> Result<Option<ForeignKeyId>> {
        let resolved = self.resolve_properties(properties)?;
        for fk in self.foreign_keys(dependent)? {
            let foreign_key = self.foreign_key(fk)?;
            if foreign_key.principal_type == principal
                && foreign_key.principal_key == principal_key
                && self.resolve_properties(&foreign_key.properties)? == resolved
            {
                return Ok(Some(fk));
            }
        }
        Ok(None)
    }

    /// Remove a foreign key together with its navigations.
    pub fn remove_foreign_key(
        &mut self,
        fk: ForeignKeyId,
        source: ConfigurationSource,
    ) -> Result<()> {
        self.atomically(|m| {
            let existing = m.foreign_key(fk)?.source;
            if !source.overrides(Some(existing)) {
                return Err(Error::ConfigurationConflict {
                    element: format!(
                        "foreign key {} of '{}'",
                        m.describe_properties(&m.foreign_key(fk)?.properties),
                        m.entity_name(m.foreign_key(fk)?.declaring_type)
                    ),
                    existing,
                    requested: source,
                });
            }
            m.remove_foreign_key_core(fk)
        })
    }

    pub(crate) fn remove_foreign_key_core(&mut self, fk: ForeignKeyId) -> Result<()> {
        let foreign_key = self.foreign_key(fk)?.clone();
        let mut removed_navigations = Vec::new();
        for nav in [
            foreign_key.dependent_to_principal,
            foreign_key.principal_to_dependent,
        ]
        .into_iter()
        .flatten()
        {
            removed_navigations.push(self.detach_navigation(nav)?);
        }

        self.entity_type_mut(foreign_key.declaring_type)?
            .foreign_keys
            .retain(|f| *f != fk);
        self.entity_type_mut(foreign_key.principal_type)?
            .referencing_foreign_keys
            .retain(|f| *f != fk);
        self.foreign_keys.remove(fk);
        debug!(
            dependent = %self.entity_name(foreign_key.declaring_type),
            principal = %self.entity_name(foreign_key.principal_type),
            "foreign key removed"
        );

        for (entity_type, name) in removed_navigations {
            self.dispatch(ConventionEvent::NavigationRemoved { entity_type, name })?;
        }
        self.dispatch(ConventionEvent::ForeignKeyRemoved {
            entity_type: foreign_key.declaring_type,
            properties: foreign_key.properties,
        })
    }

    /// Set the delete behavior of a foreign key.
    pub fn set_delete_behavior(
        &mut self,
        fk: ForeignKeyId,
        behavior: DeleteBehavior,
    ) -> Result<()> {
        self.foreign_key_mut(fk)?.delete_behavior = Some(behavior);
        Ok(())
    }

    /// Make a foreign key required (all dependent properties non-nullable)
    /// or optional (all dependent properties nullable).
    pub fn set_foreign_key_required(&mut self, fk: ForeignKeyId, required: bool) -> Result<()> {
        self.atomically(|m| m.set_foreign_key_required_core(fk, required))
    }

    fn set_foreign_key_required_core(&mut self, fk: ForeignKeyId, required: bool) -> Result<()> {
        let properties = self.foreign_key(fk)?.properties.clone();
        if !required {
            for &p in &properties {
                self.check_can_be_nullable(p)?;
            }
        }
        for p in properties {
            self.property_mut(p)?.is_nullable = !required;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Navigations
    // ---------------------------------------------------------------------

    /// Add a navigation on one side of a foreign key.
    pub fn add_navigation(
        &mut self,
        fk: ForeignKeyId,
        name: &str,
        on_principal_side: bool,
        source: ConfigurationSource,
    ) -> Result<NavigationId> {
        self.atomically(|m| m.add_navigation_core(fk, name, on_principal_side, source))
    }

    pub(crate) fn add_navigation_core(
        &mut self,
        fk: ForeignKeyId,
        name: &str,
        on_principal_side: bool,
        source: ConfigurationSource,
    ) -> Result<NavigationId> {
        let foreign_key = self.foreign_key(fk)?;
        let declaring = if on_principal_side {
            foreign_key.principal_type
        } else {
            foreign_key.declaring_type
        };

        if let Some(existing) = foreign_key.navigation(on_principal_side) {
            let navigation = self.navigation(existing)?;
            if navigation.name == name {
                let navigation = self.navigation_mut(existing)?;
                navigation.source = source.max_with(Some(navigation.source));
                return Ok(existing);
            }
            if !source.overrides(Some(navigation.source)) {
                return Err(Error::ConfigurationConflict {
                    element: format!(
                        "navigation '{}' of '{}'",
                        navigation.name,
                        self.entity_name(declaring)
                    ),
                    existing: navigation.source,
                    requested: source,
                });
            }
            self.remove_navigation_core(existing)?;
        }

        self.check_not_ignored(declaring, name, source)?;
        self.check_member_name_free(declaring, name)?;

        let nav = self.navigations.insert(Navigation {
            name: name.to_string(),
            declaring_type: declaring,
            foreign_key: fk,
            is_on_dependent: !on_principal_side,
            source,
            annotations: Default::default(),
        });
        *self.foreign_key_mut(fk)?.navigation_slot(on_principal_side) = Some(nav);
        self.entity_type_mut(declaring)?.navigations.push(nav);
        debug!(
            entity_type = %self.entity_name(declaring),
            navigation = name,
            %source,
            "navigation added"
        );

        self.dispatch(ConventionEvent::NavigationAdded(nav))?;
        Ok(nav)
    }

    /// Fails with `NavigationNameConflict` if `name` is a visible member of
    /// `entity` or declared anywhere below it.
    pub(crate) fn check_member_name_free(&self, entity: EntityTypeId, name: &str) -> Result<()> {
        let conflict = |conflicting: EntityTypeId| Error::NavigationNameConflict {
            navigation: name.to_string(),
            entity_type: self.entity_name(entity),
            conflicting_type: self.entity_name(conflicting),
        };

        if let Some(p) = self.find_property(entity, name)? {
            return Err(conflict(self.property(p)?.declaring_type));
        }
        if let Some(nav) = self.find_navigation(entity, name)? {
            return Err(conflict(self.navigation(nav)?.declaring_type));
        }
        for derived in self.derived_types(entity)? {
            if self.find_declared_property(derived, name)?.is_some()
                || self.find_declared_navigation(derived, name)?.is_some()
            {
                return Err(conflict(derived));
            }
        }
        Ok(())
    }

    /// Remove a navigation; its foreign key stays.
    pub fn remove_navigation(
        &mut self,
        nav: NavigationId,
        source: ConfigurationSource,
    ) -> Result<()> {
        self.atomically(|m| {
            let navigation = m.navigation(nav)?;
            if !source.overrides(Some(navigation.source)) {
                return Err(Error::ConfigurationConflict {
                    element: format!("navigation '{}'", navigation.name),
                    existing: navigation.source,
                    requested: source,
                });
            }
            m.remove_navigation_core(nav)
        })
    }

    fn remove_navigation_core(&mut self, nav: NavigationId) -> Result<()> {
        let (entity_type, name) = self.detach_navigation(nav)?;
        self.dispatch(ConventionEvent::NavigationRemoved { entity_type, name })
    }

    /// Unlink and drop a navigation without dispatching.
    fn detach_navigation(&mut self, nav: NavigationId) -> Result<(EntityTypeId, String)> {
        let navigation = self.navigation(nav)?;
        let declaring = navigation.declaring_type;
        let fk = navigation.foreign_key;
        let on_principal_side = !navigation.is_on_dependent;

        if let Some(foreign_key) = self.foreign_keys.get_mut(fk) {
            let slot = foreign_key.navigation_slot(on_principal_side);
            if *slot == Some(nav) {
                *slot = None;
            }
        }
        self.entity_type_mut(declaring)?
            .navigations
            .retain(|n| *n != nav);
        let removed = self
            .navigations
            .remove(nav)
            .ok_or(Error::StaleHandle { kind: "navigation" })?;
        Ok((declaring, removed.name))
    }

    // ---------------------------------------------------------------------
    // Relationships
    // ---------------------------------------------------------------------

    /// Configure a relationship: resolve or create the dependent
    /// properties, then create the foreign key and its navigations.
    ///
    /// A non-convention call is remembered on the dependent type so the
    /// relationship survives the type leaving its hierarchy.
    pub fn relationship(
        &mut self,
        config: RelationshipConfig,
        source: ConfigurationSource,
    ) -> Result<ForeignKeyId> {
        self.atomically(|m| {
            if source != ConfigurationSource::Convention {
                m.record_intent(&config, source)?;
            }
            m.relationship_core(&config, source)
        })
    }

    fn record_intent(
        &mut self,
        config: &RelationshipConfig,
        source: ConfigurationSource,
    ) -> Result<()> {
        let intent = RelationshipIntent {
            principal: self.entity_type(config.principal)?.name.clone(),
            dependent_properties: config.dependent_properties.clone(),
            navigation_to_principal: config.navigation_to_principal.clone(),
            navigation_to_dependents: config.navigation_to_dependents.clone(),
            source,
        };
        let dependent = self.entity_type_mut(config.dependent)?;
        dependent.relationship_intents.retain(|existing| {
            existing.principal != intent.principal
                || existing.navigation_to_principal != intent.navigation_to_principal
                || existing.navigation_to_dependents != intent.navigation_to_dependents
        });
        dependent.relationship_intents.push(intent);
        Ok(())
    }

    pub(crate) fn relationship_core(
        &mut self,
        config: &RelationshipConfig,
        source: ConfigurationSource,
    ) -> Result<ForeignKeyId> {
        let dependent = config.dependent;
        let principal = config.principal;
        let principal_name = self.entity_type(principal)?.name.clone();

        let pulled = match &config.navigation_to_principal {
            Some(name) => self.pull_inherited_relationship(dependent, principal, name, source)?,
            None => None,
        };
        if let Some(Pulled::AlreadyConfigured(fk)) = pulled {
            return Ok(fk);
        }

        let principal_key = match config.principal_key {
            Some(key) => key,
            None => self
                .primary_key(principal)?
                .ok_or_else(|| Error::NoPrincipalKey {
                    entity_type: principal_name.clone(),
                })?,
        };
        let key_properties = self.key(principal_key)?.properties.clone();
        let nullable = !config.required.unwrap_or(false);

        let names: Vec<String> = if config.dependent_properties.is_empty() {
            let base = config
                .navigation_to_principal
                .clone()
                .unwrap_or_else(|| display_name(&principal_name).to_string());
            key_properties
                .iter()
                .map(|k| Ok(format!("{}{}", base, self.property(*k)?.name)))
                .collect::<Result<_>>()?
        } else {
            config.dependent_properties.clone()
        };

        let mut dependent_properties = Vec::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            let property = match self.find_property(dependent, name)? {
                Some(p) => p,
                None => {
                    let Some(key_property) = key_properties.get(position) else {
                        return Err(Error::ForeignKeyTypeMismatch {
                            dependent_type: self.entity_name(dependent),
                            dependent_properties: format!("{{{}}}", names.join(", ")),
                            principal_type: principal_name,
                            principal_properties: self.describe_properties(&key_properties),
                        });
                    };
                    let value_type = self.property(*key_property)?.value_type.as_optional();
                    let p = self.add_property_core(dependent, name, value_type, source)?;
                    self.property_mut(p)?.is_nullable = nullable;
                    p
                }
            };
            dependent_properties.push(property);
        }

        let fk = match self.find_matching_foreign_key(
            dependent,
            &dependent_properties,
            principal,
            principal_key,
        )? {
            Some(existing) => {
                let foreign_key = self.foreign_key_mut(existing)?;
                foreign_key.source = source.max_with(Some(foreign_key.source));
                existing
            }
            None => self.add_foreign_key_core(
                dependent,
                &dependent_properties,
                principal,
                Some(principal_key),
                source,
            )?,
        };

        if let Some(name) = &config.navigation_to_principal {
            self.add_navigation_core(fk, name, false, source)?;
        }
        if let Some(name) = &config.navigation_to_dependents {
            self.add_navigation_core(fk, name, true, source)?;
        }
        if let Some(required) = config.required {
            self.set_foreign_key_required_core(fk, required)?;
        }
        if let Some(behavior) = config.delete_behavior {
            self.foreign_key_mut(fk)?.delete_behavior = Some(behavior);
        }

        if let Some(Pulled::FromAncestor(original)) = pulled {
            self.fix_up_siblings_after_pull(dependent, &original)?;
        }
        Ok(fk)
    }

    /// When `name` is a dependent-side navigation inherited by `dependent`,
    /// either the same relationship is being configured again or the
    /// inherited one is pulled down: removed from the ancestor so it can be
    /// recreated on `dependent`.
    fn pull_inherited_relationship(
        &mut self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        name: &str,
        source: ConfigurationSource,
    ) -> Result<Option<Pulled>> {
        let Some(nav) = self.find_navigation(dependent, name)? else {
            return Ok(None);
        };
        let navigation = self.navigation(nav)?;
        if navigation.declaring_type == dependent || !navigation.is_on_dependent {
            return Ok(None);
        }

        let fk = navigation.foreign_key;
        let foreign_key = self.foreign_key(fk)?;
        if foreign_key.principal_type == principal {
            return Ok(Some(Pulled::AlreadyConfigured(fk)));
        }
        if !source.overrides(Some(foreign_key.source)) {
            return Err(Error::ConfigurationConflict {
                element: format!(
                    "navigation '{}' inherited by '{}'",
                    name,
                    self.entity_name(dependent)
                ),
                existing: foreign_key.source,
                requested: source,
            });
        }

        let original = PulledRelationship {
            declaring_type: foreign_key.declaring_type,
            properties: foreign_key.properties.clone(),
            principal_type: foreign_key.principal_type,
            principal_key: foreign_key.principal_key,
            navigation: name.to_string(),
        };
        debug!(
            navigation = name,
            from = %self.entity_name(original.declaring_type),
            to = %self.entity_name(dependent),
            "pulling inherited relationship down"
        );
        self.remove_foreign_key_core(fk)?;
        Ok(Some(Pulled::FromAncestor(original)))
    }

    /// After a relationship was pulled from `original.declaring_type` down
    /// to `dependent`, every other branch below the original declaring type
    /// gets its own copy of the original relationship.
    fn fix_up_siblings_after_pull(
        &mut self,
        dependent: EntityTypeId,
        original: &PulledRelationship,
    ) -> Result<()> {
        let siblings = self
            .entity_type(original.declaring_type)?
            .derived_types
            .clone();
        for sibling in siblings {
            if sibling == dependent || self.inherits_from(dependent, sibling)? {
                continue;
            }
            if self.check_member_name_free(sibling, &original.navigation).is_err()
                || self
                    .find_matching_foreign_key(
                        sibling,
                        &original.properties,
                        original.principal_type,
                        original.principal_key,
                    )?
                    .is_some()
            {
                debug!(
                    sibling = %self.entity_name(sibling),
                    navigation = %original.navigation,
                    "skipping sibling fix-up"
                );
                continue;
            }
            let fk = self.add_foreign_key_core(
                sibling,
                &original.properties,
                original.principal_type,
                Some(original.principal_key),
                ConfigurationSource::Convention,
            )?;
            self.add_navigation_core(
                fk,
                &original.navigation,
                false,
                ConfigurationSource::Convention,
            )?;
        }
        Ok(())
    }
}

enum Pulled {
    AlreadyConfigured(ForeignKeyId),
    FromAncestor(PulledRelationship),
}

struct PulledRelationship {
    declaring_type: EntityTypeId,
    properties: Vec<PropertyId>,
    principal_type: EntityTypeId,
    principal_key: KeyId,
    navigation: String,
}
