//! Relation - the accumulated join/projection/filter/group-by description.
//!
//! A `Relation` is what the relation builder produces and what the data store
//! collaborator consumes. Every joined entity appears exactly once and is
//! aliased by its entity name.

use std::fmt;

use super::expr::Expr;

/// A physical table bound to an entity alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub storage: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(storage: &str, alias: &str) -> Self {
        Self {
            storage: storage.into(),
            alias: alias.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.storage == self.alias {
            write!(f, "{}", self.storage)
        } else {
            write!(f, "{} AS {}", self.storage, self.alias)
        }
    }
}

/// An inner join onto one more entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationJoin {
    pub table: TableRef,
    pub on: Expr,
}

/// A projected expression with its unique output alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: Expr,
    pub alias: String,
}

/// One composed relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub base: TableRef,
    pub joins: Vec<RelationJoin>,
    pub projections: Vec<Projection>,
    pub filters: Vec<Expr>,
    pub group_by: Vec<Expr>,
    pub distinct: bool,
}

impl Relation {
    pub fn new(base: TableRef) -> Self {
        Self {
            base,
            joins: vec![],
            projections: vec![],
            filters: vec![],
            group_by: vec![],
            distinct: false,
        }
    }

    /// Entity aliases in join order, base first.
    pub fn entities(&self) -> Vec<&str> {
        std::iter::once(self.base.alias.as_str())
            .chain(self.joins.iter().map(|j| j.table.alias.as_str()))
            .collect()
    }

    pub fn has_entity(&self, alias: &str) -> bool {
        self.base.alias == alias || self.joins.iter().any(|j| j.table.alias == alias)
    }

    pub fn table(&self, alias: &str) -> Option<&TableRef> {
        if self.base.alias == alias {
            return Some(&self.base);
        }
        self.joins.iter().map(|j| &j.table).find(|t| t.alias == alias)
    }

    /// Number of physical joins (the base table is not a join).
    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    /// All filters folded with AND.
    pub fn predicate(&self) -> Option<Expr> {
        Expr::all(self.filters.iter().cloned())
    }

    /// Output position of a projection alias.
    pub fn column_index(&self, alias: &str) -> Option<usize> {
        self.projections.iter().position(|p| p.alias == alias)
    }

    /// Whether any projection is an aggregate.
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || self.projections.iter().any(|p| p.expr.is_aggregate())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.projections.is_empty() {
            write!(f, "*")?;
        }
        for (i, p) in self.projections.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} AS {}", p.expr, p.alias)?;
        }

        write!(f, "\nFROM {}", self.base)?;
        for join in &self.joins {
            write!(f, "\nINNER JOIN {} ON {}", join.table, join.on)?;
        }

        if let Some(predicate) = self.predicate() {
            write!(f, "\nWHERE {}", predicate)?;
        }

        if !self.group_by.is_empty() {
            write!(f, "\nGROUP BY ")?;
            for (i, g) in self.group_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", g)?;
            }
        }

        Ok(())
    }
}
