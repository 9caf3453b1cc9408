//! Thread-guarded handle to a process-wide EntityGraph.
//!
//! Mutation (first registration of an entity) takes the write lock; once the
//! relevant entities are known, path and edge lookups only take the read lock.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{EntityGraph, JoinEdge};
use crate::error::{ReportError, ReportResult};
use crate::schema::{EntitySchema, SchemaProvider};

/// Shared, lazily-populated entity graph.
///
/// Cloning a registry clones the handle, not the graph.
#[derive(Debug, Clone)]
pub struct GraphRegistry {
    inner: Arc<RwLock<EntityGraph>>,
}

impl GraphRegistry {
    pub fn new(schema: Arc<dyn SchemaProvider>) -> Self {
        Self::from_graph(EntityGraph::new(schema))
    }

    pub fn from_graph(graph: EntityGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, EntityGraph> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntityGraph> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read-only closure against the graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&EntityGraph) -> R) -> R {
        f(&self.read())
    }

    /// Register entities (and their reachable neighbourhood) if not yet known.
    pub fn register<S: AsRef<str>>(&self, entities: &[S]) -> ReportResult<Vec<String>> {
        {
            let graph = self.read();
            if entities.iter().all(|e| graph.has_entity(e.as_ref())) {
                return Ok(vec![]);
            }
        }
        self.write().register_entities(entities)
    }

    /// Memoized shortest path, both ends included.
    pub fn shortest_path(&self, from: &str, to: &str) -> ReportResult<Vec<String>> {
        self.register(&[from, to])?;
        self.read()
            .cached_path(from, to)
            .ok_or_else(|| ReportError::PathNotFound {
                from: from.to_string(),
                to: to.to_string(),
                requested: vec![from.to_string(), to.to_string()],
            })
    }

    /// Shortest path if one exists; registration errors still propagate.
    pub fn try_path(&self, from: &str, to: &str) -> ReportResult<Option<Vec<String>>> {
        self.register(&[from, to])?;
        Ok(self.read().cached_path(from, to))
    }

    /// Direct join edge between two entities.
    pub fn edge_join(&self, from: &str, to: &str) -> ReportResult<JoinEdge> {
        self.read().edge_join(from, to).cloned()
    }

    /// Descriptor of an entity, registering it on first use.
    pub fn entity(&self, name: &str) -> ReportResult<EntitySchema> {
        self.register(&[name])?;
        self.read()
            .entity(name)
            .cloned()
            .ok_or_else(|| ReportError::UnknownEntity(name.to_string()))
    }

    pub fn entity_count(&self) -> usize {
        self.read().entity_count()
    }
}
