//! Data-store collaborators.
//!
//! The core hands composed [`Relation`]s to a [`DataStore`] and gets typed rows
//! back. Naming (what a node is called and which fields it shows) comes from a
//! [`Focus`], row-level restrictions from an [`AccessFilter`].
//!
//! [`MemoryStore`] is a small relational evaluator used by the CLI and tests.

mod access;
mod focus;
mod memory;

pub use access::{AccessFilter, AccessRule, NoAccessFilter, StaticAccessFilter};
pub use focus::{DefaultFocus, Focus, FocusView};
pub use memory::MemoryStore;

use crate::error::ReportResult;
use crate::relation::Relation;
use crate::schema::EntitySchema;
use crate::value::Value;

/// One result row: values in projection order.
pub type Row = Vec<Value>;

/// Executes relations and fetches entity records.
pub trait DataStore: Send + Sync {
    /// Execute a relation, returning rows in projection order.
    fn execute(&self, relation: &Relation) -> ReportResult<Vec<Row>>;

    /// Fetch the records of `entity` whose primary key is in `ids`.
    ///
    /// Order is unspecified; callers sort by the entity's ordering preference.
    fn fetch_records(&self, entity: &EntitySchema, ids: &[Value]) -> ReportResult<Vec<EntityRecord>>;
}

/// A fetched entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Entity type (or subgroup label) this record belongs to
    pub entity: String,
    /// Primary key value
    pub id: Value,
    /// Column values, in storage order
    pub columns: Vec<(String, Value)>,
}

impl EntityRecord {
    pub fn new(entity: &str, id: Value) -> Self {
        Self {
            entity: entity.into(),
            id,
            columns: vec![],
        }
    }

    pub fn with_column(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }

    /// A data-less record whose id doubles as its name.
    pub fn pseudo(entity: &str, value: Value) -> Self {
        Self::new(entity, value)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    /// Display name when no name column is configured: the id rendered as text.
    pub fn display_name(&self) -> String {
        self.id.to_string()
    }
}
