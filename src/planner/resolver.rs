//! PathResolver - from an ordered entity wish-list to one concrete join path.

use std::collections::HashMap;

use tracing::trace;

use crate::entity::{Layer, LayerEntity};
use crate::error::{ReportError, ReportResult};
use crate::graph::GraphRegistry;

/// Splices memoized shortest paths into a single path.
#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: GraphRegistry,
}

impl PathResolver {
    pub fn new(registry: GraphRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    /// One join path visiting every requested entity in order.
    ///
    /// Adjacent duplicates are skipped. Each remaining consecutive pair
    /// contributes its cached shortest path minus the first element. The
    /// result never names an entity twice.
    ///
    /// # Errors
    ///
    /// - `PathNotFound` if a consecutive pair is disconnected
    /// - `PathDoublesBack` if the spliced path revisits an entity
    pub fn path_through<S: AsRef<str>>(&self, entities: &[S]) -> ReportResult<Vec<String>> {
        let requested: Vec<String> = entities.iter().map(|e| e.as_ref().to_string()).collect();
        if requested.is_empty() {
            return Ok(vec![]);
        }

        self.registry.register(&requested)?;

        let mut stops: Vec<&str> = Vec::with_capacity(requested.len());
        for entity in &requested {
            if stops.last() != Some(&entity.as_str()) {
                stops.push(entity);
            }
        }

        let mut path = vec![stops[0].to_string()];
        for pair in stops.windows(2) {
            let segment = self
                .registry
                .try_path(pair[0], pair[1])?
                .ok_or_else(|| ReportError::PathNotFound {
                    from: pair[0].to_string(),
                    to: pair[1].to_string(),
                    requested: requested.clone(),
                })?;
            path.extend(segment.into_iter().skip(1));
        }

        check_repeat_free(&path)?;
        trace!(requested = ?requested, path = ?path, "resolved path");
        Ok(path)
    }

    /// Path through the join points of report layers.
    ///
    /// Subgroups collapse onto their backing entity, so `Product` followed by
    /// `Product.color` resolves to a single `Product` stop.
    pub fn path_through_layers(&self, layers: &[Layer]) -> ReportResult<Vec<String>> {
        let join_points: Vec<&str> = layers.iter().map(|l| l.join_point()).collect();
        self.path_through(&join_points)
    }
}

fn check_repeat_free(path: &[String]) -> ReportResult<()> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(path.len());
    for (i, entity) in path.iter().enumerate() {
        if let Some(&first) = seen.get(entity.as_str()) {
            return Err(ReportError::doubles_back(path, first, i));
        }
        seen.insert(entity, i);
    }
    Ok(())
}
