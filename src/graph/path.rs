//! Path finding for EntityGraph.
//!
//! One breadth-first search per newly registered entity builds a predecessor
//! tree, which is then inverted into the pair-keyed path cache. Lookups after
//! that are plain map reads.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::trace;

use super::EntityGraph;
use crate::error::{ReportError, ReportResult};

impl EntityGraph {
    /// Breadth-first search from `from_idx`, caching the shortest path to every reachable node.
    ///
    /// Outgoing edges are visited in insertion order, which follows the
    /// source entity's association order, so ties resolve deterministically.
    pub(super) fn compute_paths_from(&mut self, from_idx: NodeIndex) {
        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut order: Vec<NodeIndex> = Vec::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        queue.push_back(from_idx);
        parents.insert(from_idx, from_idx);

        while let Some(current) = queue.pop_front() {
            // petgraph yields edges newest-first; reverse to keep declaration order.
            let mut neighbors: Vec<NodeIndex> =
                self.graph.edges(current).map(|e| e.target()).collect();
            neighbors.reverse();

            for neighbor in neighbors {
                if parents.contains_key(&neighbor) {
                    continue;
                }
                parents.insert(neighbor, current);
                order.push(neighbor);
                queue.push_back(neighbor);
            }
        }

        let reachable = order.len();
        self.paths.insert((from_idx, from_idx), vec![from_idx]);

        for target in order {
            let mut path = vec![target];
            let mut current = target;
            while current != from_idx {
                current = parents[&current];
                path.push(current);
            }
            path.reverse();
            self.paths.insert((from_idx, target), path);
        }

        trace!(
            from = %self.graph[from_idx].name,
            reachable,
            "computed shortest paths"
        );
    }

    /// Prefer a through-association's join entity over an incidental detour.
    ///
    /// When the cached path to a through target has at least
    /// `through_hint_min_nodes` nodes and the association's 2-hop route
    /// (`from -> via -> target`) exists as edges, that route replaces the cache
    /// entry. It is never longer than the path it replaces.
    pub(super) fn apply_through_hints(&mut self, from_idx: NodeIndex) {
        let throughs: Vec<(String, String)> = self.graph[from_idx]
            .through_associations()
            .filter_map(|a| a.through.clone().map(|via| (via, a.target.clone())))
            .collect();

        for (via, target) in throughs {
            let (Some(&via_idx), Some(&target_idx)) =
                (self.node_indices.get(&via), self.node_indices.get(&target))
            else {
                continue;
            };

            if self.graph.find_edge(from_idx, via_idx).is_none()
                || self.graph.find_edge(via_idx, target_idx).is_none()
            {
                continue;
            }

            let hinted = vec![from_idx, via_idx, target_idx];
            let replace = match self.paths.get(&(from_idx, target_idx)) {
                Some(existing) => existing.len() >= self.through_hint_min_nodes && *existing != hinted,
                None => true,
            };

            if replace {
                trace!(
                    from = %self.graph[from_idx].name,
                    via = %via,
                    to = %target,
                    "through association overrides cached path"
                );
                self.paths.insert((from_idx, target_idx), hinted);
            }
        }
    }

    /// Cached shortest path between two registered entities, both ends included.
    ///
    /// Returns `None` if either entity is unregistered or `to` is unreachable.
    pub fn cached_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let from_idx = self.node_indices.get(from)?;
        let to_idx = self.node_indices.get(to)?;
        self.paths
            .get(&(*from_idx, *to_idx))
            .map(|path| path.iter().map(|idx| self.graph[*idx].name.clone()).collect())
    }

    /// Shortest path from `from` to `to`, registering both lazily.
    pub fn shortest_path(&mut self, from: &str, to: &str) -> ReportResult<Vec<String>> {
        self.register_entities(&[from, to])?;
        self.cached_path(from, to).ok_or_else(|| ReportError::PathNotFound {
            from: from.to_string(),
            to: to.to_string(),
            requested: vec![from.to_string(), to.to_string()],
        })
    }

    /// Hop count of the cached shortest path, if any.
    pub fn distance(&self, from: &str, to: &str) -> Option<usize> {
        let from_idx = self.node_indices.get(from)?;
        let to_idx = self.node_indices.get(to)?;
        self.paths.get(&(*from_idx, *to_idx)).map(|p| p.len() - 1)
    }
}
