//! Expression AST for relation predicates, projections and aggregates.
//!
//! Every column reference is qualified by the entity that owns it, so a
//! structural scan ([`Expr::entities`]) tells the relation builder exactly
//! which entities must be joined before the expression is usable.

use std::collections::BTreeSet;
use std::fmt;

use crate::value::Value;

// =============================================================================
// Expression AST
// =============================================================================

/// A column owned by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub entity: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(entity: &str, column: &str) -> Self {
        Self {
            entity: entity.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.column)
    }
}

/// A relation expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Entity-qualified column reference
    Column(ColumnRef),

    /// Literal value
    Literal(Value),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// NOT expr
    Not(Box<Expr>),

    /// expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Value>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// Aggregate call; `arg` is `None` for `COUNT(*)`
    Aggregate {
        func: AggregateFunc,
        arg: Option<Box<Expr>>,
        distinct: bool,
    },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl BinaryOperator {
    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            _ => 3,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }
}

/// Aggregate functions understood by the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Entity-qualified column.
pub fn col(entity: &str, column: &str) -> Expr {
    Expr::Column(ColumnRef::new(entity, column))
}

pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

pub fn count_star() -> Expr {
    Expr::Aggregate {
        func: AggregateFunc::Count,
        arg: None,
        distinct: false,
    }
}

pub fn aggregate(func: AggregateFunc, arg: Expr, distinct: bool) -> Expr {
    Expr::Aggregate {
        func,
        arg: Some(Box::new(arg)),
        distinct,
    }
}

impl Expr {
    fn binary(self, op: BinaryOperator, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, right)
    }

    pub fn ne(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Ne, right)
    }

    pub fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Lt, right)
    }

    pub fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Gt, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::And, right)
    }

    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Or, right)
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn in_list(self, values: Vec<Value>) -> Expr {
        Expr::In {
            expr: Box::new(self),
            values,
            negated: false,
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// Fold expressions with AND. `None` when empty.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Fold expressions with OR. `None` when empty.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::or)
    }

    /// Entities referenced anywhere in this expression.
    pub fn entities(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        self.collect_entities(&mut found);
        found
    }

    fn collect_entities(&self, found: &mut BTreeSet<String>) {
        match self {
            Expr::Column(c) => {
                found.insert(c.entity.clone());
            }
            Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_entities(found);
                right.collect_entities(found);
            }
            Expr::Not(inner) => inner.collect_entities(found),
            Expr::In { expr, .. } | Expr::IsNull { expr, .. } => expr.collect_entities(found),
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.collect_entities(found);
                }
            }
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        other => write!(f, "{}", other),
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parent: BinaryOperator) -> fmt::Result {
    match expr {
        Expr::BinaryOp { op, .. } if op.precedence() < parent.precedence() => {
            write!(f, "({})", expr)
        }
        _ => write!(f, "{}", expr),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Literal(v) => write_literal(f, v),
            Expr::BinaryOp { left, op, right } => {
                write_operand(f, left, *op)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, *op)
            }
            Expr::Not(inner) => write!(f, "NOT ({})", inner),
            Expr::In {
                expr,
                values,
                negated,
            } => {
                write!(f, "{}{} IN (", expr, if *negated { " NOT" } else { "" })?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_literal(f, v)?;
                }
                write!(f, ")")
            }
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Aggregate {
                func,
                arg,
                distinct,
            } => match arg {
                None => write!(f, "{}(*)", func.as_str()),
                Some(arg) if *distinct => write!(f, "{}(DISTINCT {})", func.as_str(), arg),
                Some(arg) => write!(f, "{}({})", func.as_str(), arg),
            },
        }
    }
}
