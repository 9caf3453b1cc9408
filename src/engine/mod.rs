//! QueryEngine - plans, executes and assembles layered reports.
//!
//! Planning happens once per report definition:
//! 1. Resolve the canonical path through the layers' join points
//! 2. Build the identity relation (one identity column per layer, distinct)
//! 3. For each aggregate source, find the anchor where the data path leaves
//!    the canonical path and build one grouped relation per layer prefix
//!
//! Running a plan restricts every relation to the targets, executes them, and
//! assembles the result tree outer layer first, then overlays aggregates.

mod assemble;
mod definition;

pub use definition::{AggregateSource, Measure, ReportDefinition};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::entity::{Layer, LayerEntity};
use crate::error::{ReportError, ReportResult};
use crate::graph::GraphRegistry;
use crate::planner::{PathResolver, RelationBuilder};
use crate::relation::{col, lit, Expr, Relation};
use crate::schema::EntitySchema;
use crate::store::{AccessFilter, DataStore, DefaultFocus, EntityRecord, Focus};
use crate::tree::ResultTree;

/// One grouped aggregate relation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatePlan {
    pub focus: String,
    pub data: String,
    /// Number of leading layers grouped on; 0 is the grand total
    pub depth: usize,
    /// Tree field filled by each aggregate column, in projection order
    pub fields: Vec<String>,
    /// Projects the aggregates first, then the `depth` group keys
    pub relation: Relation,
}

/// A configured report, ready to run against any target set.
#[derive(Debug, Clone)]
pub struct ReportPlan {
    layers: Vec<Layer>,
    layer_schemas: Vec<EntitySchema>,
    root_name: String,
    canonical_path: Vec<String>,
    identity: Relation,
    aggregates: Vec<AggregatePlan>,
}

impl ReportPlan {
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Join path through every layer, intermediate entities included.
    pub fn canonical_path(&self) -> &[String] {
        &self.canonical_path
    }

    pub fn identity(&self) -> &Relation {
        &self.identity
    }

    pub fn aggregates(&self) -> &[AggregatePlan] {
        &self.aggregates
    }
}

impl fmt::Display for ReportPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- path: {}", self.canonical_path.join(" -> "))?;
        writeln!(f, "-- identity")?;
        writeln!(f, "{}", self.identity)?;
        for plan in &self.aggregates {
            writeln!(
                f,
                "\n-- {} from {} (depth {})",
                plan.fields.join(", "),
                plan.focus,
                plan.depth
            )?;
            writeln!(f, "{}", plan.relation)?;
        }
        Ok(())
    }
}

/// Plans and runs reports against a shared entity graph.
pub struct QueryEngine {
    registry: GraphRegistry,
    focus: Arc<dyn Focus>,
    access: Option<Arc<dyn AccessFilter>>,
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("registry", &self.registry)
            .field("access_filter", &self.access.is_some())
            .finish()
    }
}

impl QueryEngine {
    pub fn new(registry: GraphRegistry) -> Self {
        Self {
            registry,
            focus: Arc::new(DefaultFocus),
            access: None,
        }
    }

    pub fn with_focus(mut self, focus: Arc<dyn Focus>) -> Self {
        self.focus = focus;
        self
    }

    pub fn with_access_filter(mut self, access: Arc<dyn AccessFilter>) -> Self {
        self.access = Some(access);
        self
    }

    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    fn builder(&self, canonical: &[String]) -> ReportResult<RelationBuilder> {
        let mut builder = RelationBuilder::new(self.registry.clone(), canonical);
        builder.join_path(canonical)?;
        Ok(builder)
    }

    fn finish(&self, mut builder: RelationBuilder) -> ReportResult<Relation> {
        if let Some(access) = &self.access {
            builder.apply_access_filter(access.as_ref())?;
        }
        builder.finish()
    }

    // =========================================================================
    // Configure
    // =========================================================================

    /// Plan a report.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError` if there are no layers
    /// - `PathNotFound` / `PathDoublesBack` if the layers cannot be joined
    /// - `JoinUnreachable` if an aggregate's data entity cannot be reached
    ///   from the layer path
    pub fn configure(&self, definition: &ReportDefinition) -> ReportResult<ReportPlan> {
        if definition.layers.is_empty() {
            return Err(ReportError::ConfigurationError("report has no layers".into()));
        }

        let resolver = PathResolver::new(self.registry.clone());
        let canonical = resolver.path_through_layers(&definition.layers)?;
        let layer_schemas = definition
            .layers
            .iter()
            .map(|layer| self.registry.entity(layer.join_point()))
            .collect::<ReportResult<Vec<_>>>()?;

        let mut builder = self.builder(&canonical)?;
        for layer in &definition.layers {
            builder.select_identity_column(layer)?;
        }
        builder.distinct()?;
        let identity = self.finish(builder)?;

        let mut aggregates = Vec::new();
        for source in &definition.aggregates {
            let focus: Layer = source.focus.parse()?;
            let data_schema = self.registry.entity(&source.data)?;

            let route = resolver.path_through(&[focus.join_point(), source.data.as_str()])?;
            let anchor = route
                .iter()
                .rposition(|entity| canonical.contains(entity))
                .ok_or_else(|| ReportError::JoinUnreachable {
                    target: source.data.clone(),
                    attempted: canonical.clone(),
                })?;
            let data_path = &route[anchor..];
            debug!(focus = %source.focus, data = %source.data, anchor = %route[anchor], "aggregate anchor");

            let fields: Vec<String> = source
                .measures
                .iter()
                .map(|m| m.field_name(&source.data))
                .collect();

            for depth in 0..=definition.layers.len() {
                let mut builder = self.builder(&canonical)?;
                builder.join_path(data_path)?;
                for (measure, field) in source.measures.iter().zip(&fields) {
                    builder.select_aggregate(measure.expr(&source.data, &data_schema.primary_key), field)?;
                }
                for (layer, schema) in definition.layers[..depth].iter().zip(&layer_schemas) {
                    builder.group_by_column(&layer.identity_column(schema))?;
                }

                aggregates.push(AggregatePlan {
                    focus: source.focus.clone(),
                    data: source.data.clone(),
                    depth,
                    fields: fields.clone(),
                    relation: self.finish(builder)?,
                });
            }
        }

        info!(
            layers = definition.layers.len(),
            path = ?canonical,
            aggregate_relations = aggregates.len(),
            "configured report"
        );

        Ok(ReportPlan {
            layers: definition.layers.clone(),
            layer_schemas,
            root_name: definition.root_name.clone(),
            canonical_path: canonical,
            identity,
            aggregates,
        })
    }

    // =========================================================================
    // Execute
    // =========================================================================

    /// Primary-key disjunction over the targets, checking they are one layer type.
    fn target_filter(&self, plan: &ReportPlan, targets: &[EntityRecord]) -> ReportResult<Expr> {
        let target_type = &targets[0].entity;
        if let Some(other) = targets.iter().find(|t| t.entity != *target_type) {
            return Err(ReportError::InvalidTarget(format!(
                "targets mix '{}' and '{}'",
                target_type, other.entity
            )));
        }

        if !plan.layers.iter().any(|layer| layer.join_point() == target_type) {
            let layers: Vec<String> = plan.layers.iter().map(|l| l.name()).collect();
            return Err(ReportError::InvalidTarget(format!(
                "'{}' is not a layer of this report ({})",
                target_type,
                layers.join(", ")
            )));
        }

        let schema = self.registry.entity(target_type)?;
        let equalities = targets
            .iter()
            .map(|t| col(target_type, &schema.primary_key).eq(lit(t.id.clone())));
        Ok(Expr::any(equalities).unwrap_or_else(|| lit(false)))
    }

    /// Run a plan for the given targets.
    ///
    /// No targets yields a childless root without touching the store. Errors
    /// abort the run; no partial tree is returned.
    pub fn run(
        &self,
        plan: &ReportPlan,
        store: &dyn DataStore,
        targets: &[EntityRecord],
    ) -> ReportResult<ResultTree> {
        let mut tree = ResultTree::new(&plan.root_name);
        if targets.is_empty() {
            info!(root = %plan.root_name, "no targets, empty report");
            return Ok(tree);
        }

        let filter = self.target_filter(plan, targets)?;

        let mut identity = plan.identity.clone();
        identity.filters.push(filter.clone());
        let rows = store.execute(&identity)?;
        debug!(rows = rows.len(), "identity tuples");

        let levels = assemble::build_levels(
            &mut tree,
            &plan.layers,
            &plan.layer_schemas,
            &rows,
            store,
            self.focus.as_ref(),
        )?;

        for aggregate in &plan.aggregates {
            let mut relation = aggregate.relation.clone();
            relation.filters.push(filter.clone());
            let rows = store.execute(&relation)?;
            assemble::insert_aggregates(&mut tree, &levels[aggregate.depth], aggregate, &rows)?;
        }

        info!(
            root = %plan.root_name,
            targets = targets.len(),
            nodes = tree.len(),
            "report assembled"
        );
        Ok(tree)
    }

    /// Configure and run in one step.
    pub fn report(
        &self,
        definition: &ReportDefinition,
        store: &dyn DataStore,
        targets: &[EntityRecord],
    ) -> ReportResult<ResultTree> {
        let plan = self.configure(definition)?;
        self.run(&plan, store, targets)
    }
}
