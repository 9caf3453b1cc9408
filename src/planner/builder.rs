//! RelationBuilder - incremental relation composition.
//!
//! Entities enter the relation through [`RelationBuilder::join_to_entity`],
//! which routes from whatever is already joined. Every entity is joined at
//! most once; asking again is a no-op. Projections, conditions and access
//! rules join the entities they reference before attaching themselves, so a
//! relation never mentions an entity it does not contain.

use std::collections::HashSet;

use inflector::Inflector;
use tracing::{debug, trace};

use super::PathResolver;
use crate::entity::{Layer, LayerEntity};
use crate::error::{ReportError, ReportResult};
use crate::graph::GraphRegistry;
use crate::relation::{lit, ColumnRef, Expr, Projection, Relation, RelationJoin, TableRef};
use crate::store::{AccessFilter, EntityRecord};

/// A filter to attach to a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// An arbitrary predicate
    Expr(Expr),
    /// Primary-key equality with one record
    Record(EntityRecord),
    /// Disjunction of primary-key equalities
    Records(Vec<EntityRecord>),
}

impl From<Expr> for Condition {
    fn from(expr: Expr) -> Self {
        Condition::Expr(expr)
    }
}

/// A candidate route from a joined entity to a join target.
struct Route {
    source: String,
    path: Vec<String>,
    /// Distance from the innermost spine entry; `None` off the spine
    spine_rank: Option<usize>,
}

/// Composes one relation, one entity at a time.
#[derive(Debug)]
pub struct RelationBuilder {
    registry: GraphRegistry,
    resolver: PathResolver,
    /// Entities the caller asked for as layers, outermost first
    spine: Vec<String>,
    /// Joined entities in join order
    joined: Vec<String>,
    relation: Option<Relation>,
    aliases: HashSet<String>,
}

impl RelationBuilder {
    pub fn new<S: AsRef<str>>(registry: GraphRegistry, spine: &[S]) -> Self {
        Self {
            resolver: PathResolver::new(registry.clone()),
            registry,
            spine: spine.iter().map(|s| s.as_ref().to_string()).collect(),
            joined: vec![],
            relation: None,
            aliases: HashSet::new(),
        }
    }

    /// Joined entities in join order.
    pub fn joined(&self) -> &[String] {
        &self.joined
    }

    pub fn is_joined(&self, entity: &str) -> bool {
        self.joined.iter().any(|e| e == entity)
    }

    /// Number of physical joins so far.
    pub fn join_count(&self) -> usize {
        self.relation.as_ref().map_or(0, |r| r.join_count())
    }

    pub fn relation(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }

    // =========================================================================
    // Joins
    // =========================================================================

    /// Bring `target` into the relation.
    ///
    /// The first entity becomes the base table. Later entities are routed in
    /// along the shortest cached path from any joined entity; among equally
    /// short routes spine entities win over incidental ones, nearest the
    /// innermost layer first, then names decide. Other joined sources whose own route to `target` shares no
    /// joined interior entity contribute their predicates too: their interior
    /// entities are joined physically and the final hop becomes a filter.
    ///
    /// # Errors
    ///
    /// `JoinUnreachable` if no joined entity has a path to `target`.
    pub fn join_to_entity(&mut self, target: &str) -> ReportResult<()> {
        if self.is_joined(target) {
            return Ok(());
        }

        let schema = self.registry.entity(target)?;
        if self.relation.is_none() {
            self.relation = Some(Relation::new(TableRef::new(schema.storage(), target)));
            self.joined.push(target.to_string());
            debug!(entity = %target, "base entity");
            return Ok(());
        }

        let mut routes = Vec::new();
        for source in &self.joined {
            if let Some(path) = self.registry.try_path(source, target)? {
                routes.push(Route {
                    source: source.clone(),
                    path,
                    spine_rank: self.spine.iter().rev().position(|s| s == source),
                });
            }
        }

        routes.sort_by(|a, b| {
            a.path
                .len()
                .cmp(&b.path.len())
                .then_with(|| match (a.spine_rank, b.spine_rank) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.source.cmp(&b.source))
        });

        let mut routes = routes.into_iter();
        let Some(best) = routes.next() else {
            return Err(ReportError::JoinUnreachable {
                target: target.to_string(),
                attempted: self.joined.clone(),
            });
        };

        debug!(target = %target, from = %best.source, path = ?best.path, "routing join");
        self.follow(&best.path)?;

        for redundant in routes {
            let interior = &redundant.path[1..redundant.path.len() - 1];
            if interior.iter().any(|e| self.is_joined(e)) {
                continue;
            }
            trace!(target = %target, from = %redundant.source, path = ?redundant.path, "redundant route");
            self.follow(&redundant.path)?;
        }

        Ok(())
    }

    /// Join each entity of a path along its own edges.
    ///
    /// Entities not yet present are joined physically. A hop into an entity
    /// that is already present becomes a filter instead.
    fn follow(&mut self, path: &[String]) -> ReportResult<()> {
        for hop in path.windows(2) {
            let (from, to) = (&hop[0], &hop[1]);
            let edge = self.registry.edge_join(from, to)?;

            if self.is_joined(to) {
                self.push_filter(edge.predicate());
                continue;
            }

            let schema = self.registry.entity(to)?;
            let relation = self.relation_mut()?;
            relation.joins.push(RelationJoin {
                table: TableRef::new(schema.storage(), to),
                on: edge.predicate(),
            });
            self.joined.push(to.clone());
        }
        Ok(())
    }

    /// Join every entity on the resolved path through `entities`.
    ///
    /// The path's first entity is routed in like any other target; the rest
    /// follow the path's own edges.
    pub fn join_path<S: AsRef<str>>(&mut self, entities: &[S]) -> ReportResult<()> {
        let path = self.resolver.path_through(entities)?;
        let Some(first) = path.first() else {
            return Ok(());
        };

        self.join_to_entity(first)?;
        for hop in path.windows(2) {
            if !self.is_joined(&hop[1]) {
                self.follow(hop)?;
            }
        }
        Ok(())
    }

    fn join_referenced(&mut self, expr: &Expr) -> ReportResult<()> {
        for entity in expr.entities() {
            self.join_to_entity(&entity)?;
        }
        Ok(())
    }

    fn relation_mut(&mut self) -> ReportResult<&mut Relation> {
        self.relation
            .as_mut()
            .ok_or_else(|| ReportError::ConfigurationError("relation has no base entity".into()))
    }

    fn push_filter(&mut self, expr: Expr) {
        if let Some(relation) = self.relation.as_mut() {
            relation.filters.push(expr);
        }
    }

    // =========================================================================
    // Projections
    // =========================================================================

    fn unique_alias(&mut self, base: String) -> String {
        let mut alias = base.clone();
        let mut n = 2;
        while self.aliases.contains(&alias) {
            alias = format!("{}_{}", base, n);
            n += 1;
        }
        self.aliases.insert(alias.clone());
        alias
    }

    /// Project a column, joining its entity first. Returns the output alias.
    pub fn select_column(&mut self, column: &ColumnRef) -> ReportResult<String> {
        self.join_to_entity(&column.entity)?;
        let alias = self.unique_alias(format!(
            "{}_{}",
            column.entity.to_snake_case(),
            column.column.to_snake_case()
        ));
        self.relation_mut()?.projections.push(Projection {
            expr: Expr::Column(column.clone()),
            alias: alias.clone(),
        });
        Ok(alias)
    }

    /// Project a layer's identity column (primary key, or subgroup column).
    pub fn select_identity_column(&mut self, layer: &Layer) -> ReportResult<String> {
        let backing = self.registry.entity(layer.join_point())?;
        self.select_column(&layer.identity_column(&backing))
    }

    /// Project an aggregate expression under a readable alias.
    pub fn select_aggregate(&mut self, expr: Expr, name: &str) -> ReportResult<String> {
        self.join_referenced(&expr)?;
        let alias = self.unique_alias(name.to_snake_case());
        self.relation_mut()?.projections.push(Projection {
            expr,
            alias: alias.clone(),
        });
        Ok(alias)
    }

    /// Group by a column and project it. Returns the output alias.
    pub fn group_by_column(&mut self, column: &ColumnRef) -> ReportResult<String> {
        let alias = self.select_column(column)?;
        self.relation_mut()?.group_by.push(Expr::Column(column.clone()));
        Ok(alias)
    }

    pub fn distinct(&mut self) -> ReportResult<()> {
        self.relation_mut()?.distinct = true;
        Ok(())
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Attach a filter, joining every entity it references first.
    ///
    /// Records become primary-key equalities; a record list becomes their
    /// disjunction (an empty list matches nothing).
    pub fn apply_condition(&mut self, condition: impl Into<Condition>) -> ReportResult<()> {
        let expr = match condition.into() {
            Condition::Expr(expr) => expr,
            Condition::Record(record) => self.record_equality(&record)?,
            Condition::Records(records) => {
                let mut equalities = Vec::with_capacity(records.len());
                for record in &records {
                    equalities.push(self.record_equality(record)?);
                }
                Expr::any(equalities).unwrap_or_else(|| lit(false))
            }
        };

        self.join_referenced(&expr)?;
        trace!(filter = %expr, "apply condition");
        self.relation_mut()?.filters.push(expr);
        Ok(())
    }

    fn record_equality(&self, record: &EntityRecord) -> ReportResult<Expr> {
        let schema = self.registry.entity(&record.entity)?;
        Ok(Expr::Column(ColumnRef::new(&record.entity, &schema.primary_key)).eq(lit(record.id.clone())))
    }

    /// Ask the access filter about every currently joined entity.
    ///
    /// Extra join paths are joined before the returned condition is applied.
    /// Entities joined as a result are not themselves filtered.
    pub fn apply_access_filter(&mut self, filter: &dyn AccessFilter) -> ReportResult<()> {
        let entities = self.joined.clone();
        for entity in entities {
            let rule = filter.rule_for(&entity)?;
            if rule.is_empty() {
                continue;
            }

            for path in &rule.extra_join_paths {
                self.join_path(path)?;
            }
            if let Some(condition) = rule.condition {
                debug!(entity = %entity, condition = %condition, "access rule");
                self.apply_condition(condition)?;
            }
        }
        Ok(())
    }

    /// The composed relation.
    pub fn finish(self) -> ReportResult<Relation> {
        self.relation
            .ok_or_else(|| ReportError::ConfigurationError("relation has no base entity".into()))
    }
}
