//! Value snapshots of the model, with names in place of handles.
//!
//! Snapshots are what tests compare: two models (or one model at two
//! points in time) are structurally equal when their snapshots are.

use super::entity_type::EntityTypeId;
use super::foreign_key::DeleteBehavior;
use super::model::Model;
use super::navigation::NavigationId;
use super::property::{PropertyId, ValueGenerated};
use super::source::ConfigurationSource;
use super::types::ValueType;
use crate::annotations::Annotations;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Snapshot of a whole model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub entity_types: Vec<EntityTypeSnapshot>,
    pub annotations: Annotations,
}

/// Snapshot of one entity type's declared members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeSnapshot {
    pub name: String,
    pub base_type: Option<String>,
    pub properties: Vec<PropertySnapshot>,
    pub keys: Vec<KeySnapshot>,
    pub indexes: Vec<IndexSnapshot>,
    pub foreign_keys: Vec<ForeignKeySnapshot>,
    pub navigations: Vec<NavigationSnapshot>,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub name: String,
    pub value_type: ValueType,
    pub is_nullable: bool,
    pub is_shadow: bool,
    /// Whether an ancestor's property of the same name hides this one.
    pub is_shadowed: bool,
    pub value_generated: ValueGenerated,
    pub is_concurrency_token: bool,
    pub source: ConfigurationSource,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySnapshot {
    pub properties: Vec<String>,
    pub is_primary: bool,
    pub source: ConfigurationSource,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub properties: Vec<String>,
    pub is_unique: bool,
    pub source: ConfigurationSource,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySnapshot {
    pub properties: Vec<String>,
    pub principal_type: String,
    pub principal_key: Vec<String>,
    pub is_unique: bool,
    pub is_required: bool,
    pub delete_behavior: DeleteBehavior,
    pub dependent_to_principal: Option<String>,
    pub principal_to_dependent: Option<String>,
    pub source: ConfigurationSource,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSnapshot {
    pub name: String,
    pub target: String,
    pub is_on_dependent: bool,
    pub is_collection: bool,
    pub source: ConfigurationSource,
}

impl EntityTypeSnapshot {
    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ModelSnapshot {
    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Model {
    /// Snapshot every entity type, ordered by name.
    pub fn snapshot(&self) -> Result<ModelSnapshot> {
        let entity_types = self
            .entity_types()
            .into_iter()
            .map(|id| self.snapshot_entity_type(id))
            .collect::<Result<_>>()?;
        Ok(ModelSnapshot {
            entity_types,
            annotations: self.annotations.clone(),
        })
    }

    /// Snapshot the members declared on one entity type.
    pub fn snapshot_entity_type(&self, id: EntityTypeId) -> Result<EntityTypeSnapshot> {
        let et = self.entity_type(id)?;

        let mut properties = Vec::with_capacity(et.properties.len());
        for &p in &et.properties {
            let property = self.property(p)?;
            properties.push(PropertySnapshot {
                name: property.name.clone(),
                value_type: property.value_type,
                is_nullable: property.is_nullable,
                is_shadow: property.is_shadow(),
                is_shadowed: property.shadowed_by.is_some(),
                value_generated: property.value_generated,
                is_concurrency_token: property.is_concurrency_token,
                source: property.source,
                annotations: property.annotations.clone(),
            });
        }

        let mut keys = Vec::with_capacity(et.keys.len());
        for &k in &et.keys {
            let key = self.key(k)?;
            keys.push(KeySnapshot {
                properties: self.property_names(&key.properties)?,
                is_primary: et.primary_key == Some(k),
                source: key.source,
                annotations: key.annotations.clone(),
            });
        }

        let mut indexes = Vec::with_capacity(et.indexes.len());
        for &i in &et.indexes {
            let index = self.index(i)?;
            indexes.push(IndexSnapshot {
                properties: self.property_names(&index.properties)?,
                is_unique: index.is_unique,
                source: index.source,
                annotations: index.annotations.clone(),
            });
        }

        let mut foreign_keys = Vec::with_capacity(et.foreign_keys.len());
        for &fk in &et.foreign_keys {
            let foreign_key = self.foreign_key(fk)?;
            let nav_name = |nav: Option<NavigationId>| -> Result<Option<String>> {
                nav.map(|n| Ok(self.navigation(n)?.name.clone())).transpose()
            };
            foreign_keys.push(ForeignKeySnapshot {
                properties: self.property_names(&foreign_key.properties)?,
                principal_type: self.entity_type(foreign_key.principal_type)?.name.clone(),
                principal_key: self
                    .property_names(&self.key(foreign_key.principal_key)?.properties)?,
                is_unique: self.foreign_key_is_unique(fk)?,
                is_required: self.foreign_key_is_required(fk)?,
                delete_behavior: self.delete_behavior(fk)?,
                dependent_to_principal: nav_name(foreign_key.dependent_to_principal)?,
                principal_to_dependent: nav_name(foreign_key.principal_to_dependent)?,
                source: foreign_key.source,
                annotations: foreign_key.annotations.clone(),
            });
        }

        let mut navigations = Vec::with_capacity(et.navigations.len());
        for &n in &et.navigations {
            let navigation = self.navigation(n)?;
            let foreign_key = self.foreign_key(navigation.foreign_key)?;
            let target = if navigation.is_on_dependent {
                foreign_key.principal_type
            } else {
                foreign_key.declaring_type
            };
            navigations.push(NavigationSnapshot {
                name: navigation.name.clone(),
                target: self.entity_type(target)?.name.clone(),
                is_on_dependent: navigation.is_on_dependent,
                is_collection: self.navigation_is_collection(n)?,
                source: navigation.source,
            });
        }

        Ok(EntityTypeSnapshot {
            name: et.name.clone(),
            base_type: et.base_type.map(|b| self.entity_name(b)),
            properties,
            keys,
            indexes,
            foreign_keys,
            navigations,
            annotations: et.annotations.clone(),
        })
    }

    fn property_names(&self, properties: &[PropertyId]) -> Result<Vec<String>> {
        properties
            .iter()
            .map(|p| Ok(self.property(*p)?.name.clone()))
            .collect()
    }
}
