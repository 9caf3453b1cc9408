//! Relation planning.
//!
//! - `resolver`: turns an ordered wish-list of entities into one repeat-free path
//! - `builder`: composes a relation incrementally, routing each new entity in
//!   along the shortest path from something already joined

mod builder;
mod resolver;

pub use builder::{Condition, RelationBuilder};
pub use resolver::PathResolver;
