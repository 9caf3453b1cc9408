//! Subgroup pseudo-entities: "group by column value" as a graph node.

use std::collections::BTreeSet;
use std::fmt;

use crate::relation::ColumnRef;
use crate::schema::EntitySchema;
use crate::store::EntityRecord;
use crate::value::Value;

/// A pseudo-entity wrapping `(backing entity, column)`.
///
/// For path purposes it collapses onto its backing entity, so two subgroups
/// on the same entity share one join point. For naming and for its own rows
/// it stays distinct: its primary key is the column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubgroupEntity {
    backing: String,
    column: String,
}

impl SubgroupEntity {
    pub fn new(backing: &str, column: &str) -> Self {
        Self {
            backing: backing.into(),
            column: column.into(),
        }
    }

    /// Label used for node types and layer specs (`Entity.column`).
    pub fn name(&self) -> String {
        format!("{}.{}", self.backing, self.column)
    }

    pub fn backing(&self) -> &str {
        &self.backing
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_real_entity(&self) -> bool {
        false
    }

    /// The grouped column plays the part of a primary key.
    pub fn identity_column(&self) -> ColumnRef {
        ColumnRef::new(&self.backing, &self.column)
    }

    /// Subgroups carry no data fields of their own.
    pub fn schema(&self) -> EntitySchema {
        EntitySchema::new(&self.name()).with_primary_key(&self.column)
    }

    /// One pseudo-record per distinct value, sorted by value.
    ///
    /// Each record reports its value as both id and name.
    pub fn all(&self, desired: impl IntoIterator<Item = Value>) -> Vec<EntityRecord> {
        let name = self.name();
        desired
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|value| EntityRecord::pseudo(&name, value))
            .collect()
    }
}

impl fmt::Display for SubgroupEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.backing, self.column)
    }
}
