//! # Strata
//!
//! Layered hierarchical reports with aggregate roll-ups over a relational
//! schema graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Report Definition                           │
//! │  (layers outermost first, aggregate sources, measures)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [PathResolver over EntityGraph]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Canonical Join Path                         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [RelationBuilder]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Identity relation + one grouped relation per prefix    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [DataStore, target filter]
//! ┌─────────────────────────────────────────────────────────┐
//! │              ResultTree (root → layer nodes)             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use strata::prelude::*;
//!
//! let registry = GraphRegistry::new(Arc::new(schema));
//! let engine = QueryEngine::new(registry);
//!
//! let definition = ReportDefinition::from_layer_specs(&["Category", "Product"])?
//!     .with_aggregate(AggregateSource::count("Product", "Sales"));
//! let plan = engine.configure(&definition)?;
//! let tree = engine.run(&plan, &store, &targets)?;
//! ```

pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod graph;
pub mod planner;
pub mod relation;
pub mod schema;
pub mod store;
pub mod tree;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::engine::{AggregateSource, Measure, QueryEngine, ReportDefinition, ReportPlan};
    pub use crate::entity::{Layer, LayerEntity, SubgroupEntity};
    pub use crate::error::{ReportError, ReportResult};
    pub use crate::graph::{EntityGraph, GraphRegistry};
    pub use crate::planner::{PathResolver, RelationBuilder};
    pub use crate::relation::{col, lit, Expr, Relation};
    pub use crate::schema::{Association, EntitySchema, SchemaProvider, StaticSchema};
    pub use crate::store::{DataStore, DefaultFocus, EntityRecord, Focus, MemoryStore};
    pub use crate::tree::{ResultTree, TreeVisitor};
    pub use crate::value::Value;
}
