//! In-memory relational store.
//!
//! Tables are lists of column maps keyed by storage identifier. Relations are
//! evaluated directly: nested-loop inner joins, filters with SQL three-valued
//! logic, grouping with aggregates, then `DISTINCT`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use super::{DataStore, EntityRecord, Row};
use crate::error::{ReportError, ReportResult};
use crate::relation::{AggregateFunc, BinaryOperator, ColumnRef, Expr, Relation};
use crate::schema::EntitySchema;
use crate::value::Value;

type Record = BTreeMap<String, Value>;

/// Rows visible to an expression, keyed by entity alias.
type Binding<'a> = HashMap<&'a str, &'a Record>;

#[derive(Debug, Default)]
struct Table {
    columns: BTreeSet<String>,
    rows: Vec<Record>,
}

impl Table {
    fn push(&mut self, row: Record) {
        self.columns.extend(row.keys().cloned());
        self.rows.push(row);
    }
}

/// A relational store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    executed: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tables from a JSON object of `{ "storage": [ {row}, ... ] }`.
    pub fn from_json(source: &str) -> ReportResult<Self> {
        let parsed: BTreeMap<String, Vec<Record>> = serde_json::from_str(source)
            .map_err(|e| ReportError::Store(format!("invalid data file: {}", e)))?;

        let mut store = Self::new();
        for (storage, rows) in parsed {
            let table = store.tables.entry(storage).or_default();
            for row in rows {
                table.push(row);
            }
        }
        Ok(store)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| ReportError::Store(format!("cannot read '{}': {}", path.display(), e)))?;
        Self::from_json(&source)
    }

    /// Declare an (initially empty) table.
    pub fn with_table(mut self, storage: &str) -> Self {
        self.tables.entry(storage.to_string()).or_default();
        self
    }

    pub fn with_row<K: Into<String>>(
        mut self,
        storage: &str,
        row: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        self.insert(storage, row);
        self
    }

    pub fn insert<K: Into<String>>(&mut self, storage: &str, row: impl IntoIterator<Item = (K, Value)>) {
        let row = row.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.tables.entry(storage.to_string()).or_default().push(row);
    }

    /// Number of relations executed so far.
    pub fn executed_count(&self) -> usize {
        self.executed.load(Ordering::Relaxed)
    }

    fn table(&self, storage: &str) -> ReportResult<&Table> {
        self.tables
            .get(storage)
            .ok_or_else(|| ReportError::Store(format!("unknown table '{}'", storage)))
    }

    fn check_columns(&self, relation: &Relation, scope: &HashMap<&str, &Table>) -> ReportResult<()> {
        let exprs = relation
            .joins
            .iter()
            .map(|j| &j.on)
            .chain(relation.projections.iter().map(|p| &p.expr))
            .chain(relation.filters.iter())
            .chain(relation.group_by.iter());

        let mut refs = Vec::new();
        for expr in exprs {
            column_refs(expr, &mut refs);
        }

        for column in refs {
            let known = scope
                .get(column.entity.as_str())
                .is_some_and(|t| t.columns.contains(&column.column) || t.rows.is_empty());
            if !known {
                return Err(ReportError::UnknownColumn {
                    entity: column.entity.clone(),
                    column: column.column.clone(),
                });
            }
        }
        Ok(())
    }
}

impl DataStore for MemoryStore {
    fn execute(&self, relation: &Relation) -> ReportResult<Vec<Row>> {
        self.executed.fetch_add(1, Ordering::Relaxed);

        let base = self.table(&relation.base.storage)?;
        let mut scope: HashMap<&str, &Table> = HashMap::new();
        scope.insert(relation.base.alias.as_str(), base);
        for join in &relation.joins {
            scope.insert(join.table.alias.as_str(), self.table(&join.table.storage)?);
        }
        self.check_columns(relation, &scope)?;

        let mut bindings: Vec<Binding> = base
            .rows
            .iter()
            .map(|row| HashMap::from([(relation.base.alias.as_str(), row)]))
            .collect();

        for join in &relation.joins {
            let table = scope[join.table.alias.as_str()];
            let mut joined = Vec::new();
            for binding in &bindings {
                for row in &table.rows {
                    let mut candidate = binding.clone();
                    candidate.insert(join.table.alias.as_str(), row);
                    if truthy(&eval(&join.on, &candidate)?) {
                        joined.push(candidate);
                    }
                }
            }
            bindings = joined;
        }

        let mut kept = Vec::with_capacity(bindings.len());
        'rows: for binding in bindings {
            for filter in &relation.filters {
                if !truthy(&eval(filter, &binding)?) {
                    continue 'rows;
                }
            }
            kept.push(binding);
        }

        let mut rows = if relation.is_grouped() {
            group_rows(relation, &kept)?
        } else {
            kept.iter()
                .map(|b| relation.projections.iter().map(|p| eval(&p.expr, b)).collect())
                .collect::<ReportResult<Vec<Row>>>()?
        };

        if relation.distinct {
            let mut seen = BTreeSet::new();
            rows.retain(|row| seen.insert(row.clone()));
        }

        debug!(base = %relation.base.alias, joins = relation.join_count(), rows = rows.len(), "executed relation");
        Ok(rows)
    }

    fn fetch_records(&self, entity: &EntitySchema, ids: &[Value]) -> ReportResult<Vec<EntityRecord>> {
        let table = self.table(entity.storage())?;
        if !table.rows.is_empty() && !table.columns.contains(&entity.primary_key) {
            return Err(ReportError::UnknownColumn {
                entity: entity.name.clone(),
                column: entity.primary_key.clone(),
            });
        }

        let wanted: BTreeSet<&Value> = ids.iter().collect();
        Ok(table
            .rows
            .iter()
            .filter_map(|row| {
                let id = row.get(&entity.primary_key)?;
                wanted.contains(id).then(|| EntityRecord {
                    entity: entity.name.clone(),
                    id: id.clone(),
                    columns: row.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                })
            })
            .collect())
    }
}

// =============================================================================
// Evaluation
// =============================================================================

fn column_refs<'a>(expr: &'a Expr, out: &mut Vec<&'a ColumnRef>) {
    match expr {
        Expr::Column(c) => out.push(c),
        Expr::Literal(_) => {}
        Expr::BinaryOp { left, right, .. } => {
            column_refs(left, out);
            column_refs(right, out);
        }
        Expr::Not(inner) => column_refs(inner, out),
        Expr::In { expr, .. } | Expr::IsNull { expr, .. } => column_refs(expr, out),
        Expr::Aggregate { arg, .. } => {
            if let Some(arg) = arg {
                column_refs(arg, out);
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn eval(expr: &Expr, binding: &Binding) -> ReportResult<Value> {
    Ok(match expr {
        Expr::Column(c) => binding
            .get(c.entity.as_str())
            .and_then(|row| row.get(&c.column))
            .cloned()
            .unwrap_or_default(),
        Expr::Literal(v) => v.clone(),
        Expr::BinaryOp { left, op, right } => {
            let l = eval(left, binding)?;
            let r = eval(right, binding)?;
            binary(*op, &l, &r)
        }
        Expr::Not(inner) => match eval(inner, binding)? {
            Value::Bool(b) => Value::Bool(!b),
            _ => Value::Null,
        },
        Expr::In {
            expr,
            values,
            negated,
        } => {
            let v = eval(expr, binding)?;
            if v.is_null() {
                Value::Null
            } else {
                Value::Bool(values.contains(&v) != *negated)
            }
        }
        Expr::IsNull { expr, negated } => Value::Bool(eval(expr, binding)?.is_null() != *negated),
        Expr::Aggregate { .. } => {
            return Err(ReportError::Store(format!(
                "aggregate '{}' used outside a grouped projection",
                expr
            )))
        }
    })
}

fn binary(op: BinaryOperator, l: &Value, r: &Value) -> Value {
    use std::cmp::Ordering::*;

    match op {
        BinaryOperator::And => match (l, r) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
            (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
            _ => Value::Null,
        },
        BinaryOperator::Or => match (l, r) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
            (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
            _ => Value::Null,
        },
        _ if l.is_null() || r.is_null() => Value::Null,
        cmp => {
            let ord = l.cmp(r);
            Value::Bool(match cmp {
                BinaryOperator::Eq => ord == Equal,
                BinaryOperator::Ne => ord != Equal,
                BinaryOperator::Lt => ord == Less,
                BinaryOperator::Lte => ord != Greater,
                BinaryOperator::Gt => ord == Greater,
                _ => ord != Less,
            })
        }
    }
}

/// Group bindings by the relation's group-by keys, in first-seen order.
///
/// Without group-by expressions every binding forms one group, which exists
/// even when empty (`COUNT(*)` of nothing is 0).
fn group_rows(relation: &Relation, bindings: &[Binding]) -> ReportResult<Vec<Row>> {
    let mut groups: Vec<Vec<&Binding>> = Vec::new();
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();

    if relation.group_by.is_empty() {
        groups.push(bindings.iter().collect());
    } else {
        for binding in bindings {
            let key = relation
                .group_by
                .iter()
                .map(|g| eval(g, binding))
                .collect::<ReportResult<Vec<_>>>()?;
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(binding);
        }
    }

    groups
        .iter()
        .map(|group| {
            relation
                .projections
                .iter()
                .map(|p| match &p.expr {
                    Expr::Aggregate {
                        func,
                        arg,
                        distinct,
                    } => aggregate_value(*func, arg.as_deref(), *distinct, group),
                    expr => match group.first() {
                        Some(first) => eval(expr, first),
                        None => Ok(Value::Null),
                    },
                })
                .collect()
        })
        .collect()
}

fn aggregate_value(
    func: AggregateFunc,
    arg: Option<&Expr>,
    distinct: bool,
    group: &[&Binding],
) -> ReportResult<Value> {
    let Some(arg) = arg else {
        return Ok(Value::Int(group.len() as i64));
    };

    let mut values = Vec::with_capacity(group.len());
    for binding in group {
        let v = eval(arg, binding)?;
        if !v.is_null() {
            values.push(v);
        }
    }
    if distinct {
        values = values.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    }

    Ok(match func {
        AggregateFunc::Count => Value::Int(values.len() as i64),
        AggregateFunc::Sum => sum(&values)?,
        AggregateFunc::Avg => match sum(&values)?.as_f64() {
            Some(total) => Value::Float(total / values.len() as f64),
            None => Value::Null,
        },
        AggregateFunc::Min => values.iter().min().cloned().unwrap_or_default(),
        AggregateFunc::Max => values.iter().max().cloned().unwrap_or_default(),
    })
}

fn sum(values: &[Value]) -> ReportResult<Value> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        return Ok(Value::Int(
            values.iter().filter_map(|v| if let Value::Int(i) = v { Some(*i) } else { None }).sum(),
        ));
    }

    let mut total = 0.0;
    for v in values {
        total += v
            .as_f64()
            .ok_or_else(|| ReportError::Store(format!("cannot sum non-numeric value '{}'", v)))?;
    }
    Ok(Value::Float(total))
}
