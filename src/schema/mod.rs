//! Schema introspection collaborator.
//!
//! The core never reflects over a data store directly. It asks a
//! [`SchemaProvider`] for pure-data [`EntitySchema`] descriptors and builds
//! its entity graph from those.

mod entity;

pub use entity::{Association, Cardinality, EntitySchema, OrderPreference, SortDir};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SettingsError;

/// Describes entity types on demand.
///
/// Implementations must be stable for the life of the process: the entity
/// graph memoizes everything it learns.
pub trait SchemaProvider: Send + Sync {
    /// Describe an entity type, or `None` if the schema has no such type.
    fn describe(&self, entity: &str) -> Option<EntitySchema>;
}

/// A fixed, in-memory schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticSchema {
    #[serde(default, rename = "entity")]
    entities: Vec<EntitySchema>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity type. A later definition with the same name replaces the earlier one.
    pub fn with_entity(mut self, entity: EntitySchema) -> Self {
        self.insert(entity);
        self
    }

    pub fn insert(&mut self, entity: EntitySchema) {
        match self.index.get(&entity.name) {
            Some(&i) => self.entities[i] = entity,
            None => {
                self.index.insert(entity.name.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    /// Parse a schema from TOML (`[[entity]]` tables).
    pub fn from_toml(source: &str) -> Result<Self, SettingsError> {
        let parsed: StaticSchema = toml::from_str(source)?;
        let mut schema = StaticSchema::new();
        for entity in parsed.entities {
            schema.insert(entity);
        }
        Ok(schema)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }
}

impl SchemaProvider for StaticSchema {
    fn describe(&self, entity: &str) -> Option<EntitySchema> {
        self.index.get(entity).map(|&i| self.entities[i].clone())
    }
}
