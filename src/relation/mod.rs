//! Relation algebra: expressions and composed relations.
//!
//! This is the description handed to the data-store collaborator. Turning it
//! into a concrete SQL dialect (or evaluating it in memory) is the store's job;
//! the `Display` rendering here is ANSI-flavoured text for logs and plans.

mod expr;
#[allow(clippy::module_inception)]
mod relation;

pub use expr::{
    aggregate, col, count_star, lit, AggregateFunc, BinaryOperator, ColumnRef, Expr,
};
pub use relation::{Projection, Relation, RelationJoin, TableRef};
