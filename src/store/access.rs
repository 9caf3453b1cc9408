//! Access filter collaborator: per-entity row restrictions.

use std::collections::BTreeMap;

use crate::config::AccessSettings;
use crate::error::{ReportError, ReportResult};
use crate::relation::{col, lit, Expr};

/// What an access filter asks for on one joined entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessRule {
    /// Extra restriction; entities it references are joined first
    pub condition: Option<Expr>,
    /// Entity paths to join before the condition applies
    pub extra_join_paths: Vec<Vec<String>>,
}

impl AccessRule {
    pub fn is_empty(&self) -> bool {
        self.condition.is_none() && self.extra_join_paths.is_empty()
    }
}

/// Produces an access rule for an entity type.
pub trait AccessFilter: Send + Sync {
    fn rule_for(&self, entity: &str) -> ReportResult<AccessRule>;
}

impl<F> AccessFilter for F
where
    F: Fn(&str) -> ReportResult<AccessRule> + Send + Sync,
{
    fn rule_for(&self, entity: &str) -> ReportResult<AccessRule> {
        self(entity)
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccessFilter;

impl AccessFilter for NoAccessFilter {
    fn rule_for(&self, _entity: &str) -> ReportResult<AccessRule> {
        Ok(AccessRule::default())
    }
}

/// Rules read from `[access.<Entity>]` settings tables.
///
/// Condition keys are either a column of the filtered entity (`region`) or a
/// qualified column of another entity (`Store.region`).
#[derive(Debug, Clone, Default)]
pub struct StaticAccessFilter {
    rules: BTreeMap<String, AccessSettings>,
}

impl StaticAccessFilter {
    pub fn new(rules: BTreeMap<String, AccessSettings>) -> Self {
        Self { rules }
    }
}

impl AccessFilter for StaticAccessFilter {
    fn rule_for(&self, entity: &str) -> ReportResult<AccessRule> {
        let Some(settings) = self.rules.get(entity) else {
            return Ok(AccessRule::default());
        };

        let mut equalities = Vec::with_capacity(settings.condition.len());
        for (key, value) in &settings.condition {
            let column = match key.split_once('.') {
                None => col(entity, key),
                Some((other, column)) if !other.is_empty() && !column.is_empty() => {
                    col(other, column)
                }
                Some(_) => {
                    return Err(ReportError::ConfigurationError(format!(
                        "access rule for '{}' has malformed column '{}'",
                        entity, key
                    )))
                }
            };
            equalities.push(column.eq(lit(value.clone())));
        }

        Ok(AccessRule {
            condition: Expr::all(equalities),
            extra_join_paths: settings.join_paths.clone(),
        })
    }
}
