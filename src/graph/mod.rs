//! EntityGraph - directed association graph with memoized shortest paths.
//!
//! The graph is discovered lazily: registering an entity pulls in every entity
//! reachable from it over navigable (non-through, non-polymorphic)
//! associations. Shortest paths from each newly seen entity are computed once
//! and kept for the life of the graph.
//!
//! The module is organized into submodules:
//! - `path`: breadth-first path computation and the through-association hint
//! - `registry`: the lock-guarded handle shared by resolvers and builders

mod path;
mod registry;


pub use registry::GraphRegistry;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::error::{ReportError, ReportResult};
use crate::relation::{col, Expr};
use crate::schema::{Cardinality, EntitySchema, SchemaProvider};

/// Default minimum cached path length (in nodes) that a through-association may replace.
pub const DEFAULT_THROUGH_HINT_MIN_NODES: usize = 3;

/// A direct association between two entity types, as a join predicate builder.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEdge {
    pub from_entity: String,
    pub to_entity: String,
    pub from_column: String,
    pub to_column: String,
    pub cardinality: Cardinality,
    /// Name of the association this edge came from.
    pub association: String,
}

impl JoinEdge {
    /// `from.from_column = to.to_column`
    pub fn predicate(&self) -> Expr {
        col(&self.from_entity, &self.from_column).eq(col(&self.to_entity, &self.to_column))
    }

    /// Does following this edge multiply rows?
    pub fn causes_fanout(&self) -> bool {
        self.cardinality.causes_fanout()
    }
}

/// Directed graph of entity types and their direct associations.
pub struct EntityGraph {
    schema: Arc<dyn SchemaProvider>,

    /// Nodes are entity descriptors, edges are navigable associations
    pub(crate) graph: DiGraph<EntitySchema, JoinEdge>,

    /// Mapping from entity name to node index
    pub(crate) node_indices: HashMap<String, NodeIndex>,

    /// Physical storage identifier → first entity that claimed it
    storage_owners: HashMap<String, Vec<String>>,

    /// Memoized shortest paths keyed by (from, to), inclusive of both ends
    pub(crate) paths: HashMap<(NodeIndex, NodeIndex), Vec<NodeIndex>>,

    through_hint_min_nodes: usize,
}

impl std::fmt::Debug for EntityGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityGraph")
            .field("entities", &self.node_indices.len())
            .field("edges", &self.graph.edge_count())
            .field("paths", &self.paths.len())
            .finish()
    }
}

impl EntityGraph {
    /// Create an empty graph backed by a schema collaborator.
    pub fn new(schema: Arc<dyn SchemaProvider>) -> Self {
        Self {
            schema,
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            storage_owners: HashMap::new(),
            paths: HashMap::new(),
            through_hint_min_nodes: DEFAULT_THROUGH_HINT_MIN_NODES,
        }
    }

    pub fn with_through_hint_min_nodes(mut self, min_nodes: usize) -> Self {
        self.through_hint_min_nodes = min_nodes;
        self
    }

    /// Number of registered entity types.
    pub fn entity_count(&self) -> usize {
        self.node_indices.len()
    }

    /// Number of edges (one per ordered entity pair at most).
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    /// Descriptor of a registered entity.
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.node_indices.get(name).map(|idx| &self.graph[*idx])
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.node_indices.keys().map(|s| s.as_str()).collect()
    }

    /// Register entities and everything reachable from them.
    ///
    /// Expansion is breadth-first over navigable associations and stops at
    /// entities seen before, so repeated calls cost amortized linear time.
    /// Registration is all-or-nothing: on error the graph is unchanged.
    ///
    /// Returns the names of newly added entities in discovery order.
    pub fn register_entities<S: AsRef<str>>(&mut self, entities: &[S]) -> ReportResult<Vec<String>> {
        let mut pending: Vec<EntitySchema> = Vec::new();
        let mut pending_names: HashMap<String, usize> = HashMap::new();
        let mut pending_storage: HashMap<String, Vec<usize>> = HashMap::new();
        let mut queue: VecDeque<String> = entities
            .iter()
            .map(|e| e.as_ref().to_string())
            .filter(|e| !self.node_indices.contains_key(e))
            .collect();

        while let Some(name) = queue.pop_front() {
            if self.node_indices.contains_key(&name) || pending_names.contains_key(&name) {
                continue;
            }

            let descriptor = self
                .schema
                .describe(&name)
                .ok_or_else(|| ReportError::UnknownEntity(name.clone()))?;

            self.check_storage(&descriptor, &pending, &pending_storage)?;
            pending_storage
                .entry(descriptor.storage().to_string())
                .or_default()
                .push(pending.len());

            for association in descriptor.navigable_associations() {
                if !self.node_indices.contains_key(&association.target)
                    && !pending_names.contains_key(&association.target)
                {
                    queue.push_back(association.target.clone());
                }
            }

            pending_names.insert(name, pending.len());
            pending.push(descriptor);
        }

        if pending.is_empty() {
            return Ok(vec![]);
        }

        let added: Vec<NodeIndex> = pending
            .into_iter()
            .map(|descriptor| {
                let name = descriptor.name.clone();
                self.storage_owners
                    .entry(descriptor.storage().to_string())
                    .or_default()
                    .push(name.clone());
                let idx = self.graph.add_node(descriptor);
                self.node_indices.insert(name, idx);
                idx
            })
            .collect();

        for &idx in &added {
            self.add_edges_from(idx);
        }

        for &idx in &added {
            self.compute_paths_from(idx);
        }

        for &idx in &added {
            self.apply_through_hints(idx);
        }

        let names: Vec<String> = added.iter().map(|idx| self.graph[*idx].name.clone()).collect();
        debug!(entities = ?names, total = self.entity_count(), "registered entities");
        Ok(names)
    }

    /// Fail if any entity already claiming this entity's storage shares no lineage with it.
    fn check_storage(
        &self,
        descriptor: &EntitySchema,
        pending: &[EntitySchema],
        pending_storage: &HashMap<String, Vec<usize>>,
    ) -> ReportResult<()> {
        let storage = descriptor.storage();

        let committed = self
            .storage_owners
            .get(storage)
            .into_iter()
            .flatten()
            .filter_map(|owner| self.entity(owner));
        let queued = pending_storage
            .get(storage)
            .into_iter()
            .flatten()
            .filter_map(|&i| pending.get(i));

        for other in committed.chain(queued) {
            if !descriptor.inherits_from(&other.name) && !other.inherits_from(&descriptor.name) {
                return Err(ReportError::SchemaConflict {
                    storage: storage.to_string(),
                    first: other.name.clone(),
                    second: descriptor.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Add one edge per navigable association; the first association to a target wins.
    fn add_edges_from(&mut self, from_idx: NodeIndex) {
        let source = self.graph[from_idx].clone();

        for association in source.navigable_associations() {
            let Some(&to_idx) = self.node_indices.get(&association.target) else {
                continue;
            };

            if self.graph.find_edge(from_idx, to_idx).is_some() {
                warn!(
                    from = %source.name,
                    to = %association.target,
                    association = %association.name,
                    "duplicate association ignored"
                );
                continue;
            }

            let target_pk = self.graph[to_idx].primary_key.clone();
            let (from_column, to_column) = match association.cardinality {
                Cardinality::One => (association.foreign_key.clone(), target_pk),
                Cardinality::Many => (source.primary_key.clone(), association.foreign_key.clone()),
            };

            self.graph.add_edge(
                from_idx,
                to_idx,
                JoinEdge {
                    from_entity: source.name.clone(),
                    to_entity: association.target.clone(),
                    from_column,
                    to_column,
                    cardinality: association.cardinality,
                    association: association.name.clone(),
                },
            );
        }
    }

    /// Direct join edge between two entities.
    pub fn edge_join(&self, from: &str, to: &str) -> ReportResult<&JoinEdge> {
        let not_connected = || ReportError::ElementNotConnected {
            from: from.to_string(),
            to: to.to_string(),
        };

        let from_idx = self.node_indices.get(from).ok_or_else(not_connected)?;
        let to_idx = self.node_indices.get(to).ok_or_else(not_connected)?;

        self.graph
            .find_edge(*from_idx, *to_idx)
            .map(|edge| &self.graph[edge])
            .ok_or_else(not_connected)
    }
}
