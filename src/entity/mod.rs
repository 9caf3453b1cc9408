//! Layer entities - real entity types and subgroup pseudo-entities.
//!
//! Both kinds share one capability contract ([`LayerEntity`]): a join point
//! in the entity graph, an identity column, and a way to produce the records
//! of a layer from the ids observed in the identity relation.

mod subgroup;

pub use subgroup::SubgroupEntity;

use std::fmt;
use std::str::FromStr;

use crate::error::{ReportError, ReportResult};
use crate::relation::ColumnRef;
use crate::schema::{EntitySchema, SortDir};
use crate::store::{DataStore, EntityRecord};
use crate::value::Value;

/// Capabilities every report layer exposes.
pub trait LayerEntity {
    /// Label for node types and error messages.
    fn name(&self) -> String;

    fn is_real_entity(&self) -> bool;

    /// Real entity this layer joins through.
    fn join_point(&self) -> &str;

    /// Column whose values identify this layer's records.
    fn identity_column(&self, backing: &EntitySchema) -> ColumnRef;

    /// Records for the given ids, in the layer's display order.
    fn fetch_records(
        &self,
        ids: &[Value],
        backing: &EntitySchema,
        store: &dyn DataStore,
    ) -> ReportResult<Vec<EntityRecord>>;
}

/// A stored entity type used as a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealEntity {
    name: String,
}

impl RealEntity {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

impl LayerEntity for RealEntity {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_real_entity(&self) -> bool {
        true
    }

    fn join_point(&self) -> &str {
        &self.name
    }

    fn identity_column(&self, backing: &EntitySchema) -> ColumnRef {
        ColumnRef::new(&self.name, &backing.primary_key)
    }

    fn fetch_records(
        &self,
        ids: &[Value],
        backing: &EntitySchema,
        store: &dyn DataStore,
    ) -> ReportResult<Vec<EntityRecord>> {
        let mut records = store.fetch_records(backing, ids)?;

        let ordering = backing.ordering();
        records.sort_by(|a, b| {
            let left = a.get(&ordering.column).unwrap_or(&a.id);
            let right = b.get(&ordering.column).unwrap_or(&b.id);
            let ord = left.cmp(right).then_with(|| a.id.cmp(&b.id));
            match ordering.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });

        Ok(records)
    }
}

impl LayerEntity for SubgroupEntity {
    fn name(&self) -> String {
        SubgroupEntity::name(self)
    }

    fn is_real_entity(&self) -> bool {
        SubgroupEntity::is_real_entity(self)
    }

    fn join_point(&self) -> &str {
        self.backing()
    }

    fn identity_column(&self, _backing: &EntitySchema) -> ColumnRef {
        SubgroupEntity::identity_column(self)
    }

    fn fetch_records(
        &self,
        ids: &[Value],
        _backing: &EntitySchema,
        _store: &dyn DataStore,
    ) -> ReportResult<Vec<EntityRecord>> {
        Ok(self.all(ids.iter().cloned()))
    }
}

/// One level of the requested report hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layer {
    Entity(RealEntity),
    Subgroup(SubgroupEntity),
}

impl Layer {
    pub fn entity(name: &str) -> Self {
        Layer::Entity(RealEntity::new(name))
    }

    pub fn subgroup(backing: &str, column: &str) -> Self {
        Layer::Subgroup(SubgroupEntity::new(backing, column))
    }

    fn inner(&self) -> &dyn LayerEntity {
        match self {
            Layer::Entity(e) => e,
            Layer::Subgroup(s) => s,
        }
    }
}

impl LayerEntity for Layer {
    fn name(&self) -> String {
        self.inner().name()
    }

    fn is_real_entity(&self) -> bool {
        self.inner().is_real_entity()
    }

    fn join_point(&self) -> &str {
        match self {
            Layer::Entity(e) => e.join_point(),
            Layer::Subgroup(s) => s.backing(),
        }
    }

    fn identity_column(&self, backing: &EntitySchema) -> ColumnRef {
        self.inner().identity_column(backing)
    }

    fn fetch_records(
        &self,
        ids: &[Value],
        backing: &EntitySchema,
        store: &dyn DataStore,
    ) -> ReportResult<Vec<EntityRecord>> {
        self.inner().fetch_records(ids, backing, store)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parses `Entity` or `Entity.column`.
impl FromStr for Layer {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('.') {
            None if !s.is_empty() => Ok(Layer::entity(s)),
            Some((entity, column)) if !entity.is_empty() && !column.is_empty() => {
                Ok(Layer::subgroup(entity, column))
            }
            _ => Err(ReportError::ConfigurationError(format!(
                "invalid layer '{}': expected 'Entity' or 'Entity.column'",
                s
            ))),
        }
    }
}
