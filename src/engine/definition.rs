//! Report definitions: layers, aggregate sources and measures.

use std::fmt;
use std::str::FromStr;

use crate::config::{ReportSettings, Settings};
use crate::entity::Layer;
use crate::error::{ReportError, ReportResult};
use crate::relation::{aggregate, col, AggregateFunc, Expr};

/// One aggregate computed over a data entity's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub func: AggregateFunc,
    /// Column of the data entity; `None` counts rows by primary key
    pub column: Option<String>,
    pub distinct: bool,
}

impl Measure {
    pub fn count() -> Self {
        Self {
            func: AggregateFunc::Count,
            column: None,
            distinct: false,
        }
    }

    pub fn of(func: AggregateFunc, column: &str) -> Self {
        Self {
            func,
            column: Some(column.into()),
            distinct: false,
        }
    }

    pub fn count_distinct(column: &str) -> Self {
        Self {
            distinct: true,
            ..Self::of(AggregateFunc::Count, column)
        }
    }

    /// Aggregate expression over `data`, whose primary key is `primary_key`.
    pub fn expr(&self, data: &str, primary_key: &str) -> Expr {
        let column = self.column.as_deref().unwrap_or(primary_key);
        aggregate(self.func, col(data, column), self.distinct)
    }

    /// Name of the tree field this measure fills for `data`.
    pub fn field_name(&self, data: &str) -> String {
        format!("{} {}", data, self)
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = match (self.func, self.distinct) {
            (AggregateFunc::Count, true) => "count_distinct",
            (func, _) => match func {
                AggregateFunc::Count => "count",
                AggregateFunc::Sum => "sum",
                AggregateFunc::Avg => "avg",
                AggregateFunc::Min => "min",
                AggregateFunc::Max => "max",
            },
        };
        match &self.column {
            Some(column) => write!(f, "{} {}", func, column),
            None => write!(f, "{}", func),
        }
    }
}

/// Parses `count`, `count:<col>`, `count_distinct:<col>`, `sum:<col>`,
/// `avg:<col>`, `min:<col>` and `max:<col>`.
impl FromStr for Measure {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReportError::ConfigurationError(format!("unknown measure '{}'", s));

        let (name, column) = match s.trim().split_once(':') {
            Some((name, column)) if !column.trim().is_empty() => (name.trim(), Some(column.trim())),
            Some(_) => return Err(invalid()),
            None => (s.trim(), None),
        };

        match (name, column) {
            ("count", None) => Ok(Measure::count()),
            ("count", Some(column)) => Ok(Measure::of(AggregateFunc::Count, column)),
            ("count_distinct", Some(column)) => Ok(Measure::count_distinct(column)),
            ("sum", Some(column)) => Ok(Measure::of(AggregateFunc::Sum, column)),
            ("avg", Some(column)) => Ok(Measure::of(AggregateFunc::Avg, column)),
            ("min", Some(column)) => Ok(Measure::of(AggregateFunc::Min, column)),
            ("max", Some(column)) => Ok(Measure::of(AggregateFunc::Max, column)),
            _ => Err(invalid()),
        }
    }
}

/// A (focus, data) pair and the measures to roll up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSource {
    /// Entity the data path is routed from
    pub focus: String,
    /// Entity whose rows are aggregated
    pub data: String,
    pub measures: Vec<Measure>,
}

impl AggregateSource {
    /// Count rows of `data` reached from `focus`.
    pub fn count(focus: &str, data: &str) -> Self {
        Self {
            focus: focus.into(),
            data: data.into(),
            measures: vec![Measure::count()],
        }
    }

    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }
}

/// Everything needed to plan one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDefinition {
    /// Layers, outermost first
    pub layers: Vec<Layer>,
    pub aggregates: Vec<AggregateSource>,
    /// Type name of the root node
    pub root_name: String,
}

impl ReportDefinition {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            layers,
            aggregates: vec![],
            root_name: "Report".to_string(),
        }
    }

    /// Parse layer specs (`Entity` or `Entity.column`).
    pub fn from_layer_specs<S: AsRef<str>>(specs: &[S]) -> ReportResult<Self> {
        let layers = specs
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<ReportResult<Vec<Layer>>>()?;
        Ok(Self::new(layers))
    }

    pub fn with_aggregate(mut self, source: AggregateSource) -> Self {
        self.aggregates.push(source);
        self
    }

    pub fn with_root_name(mut self, name: &str) -> Self {
        self.root_name = name.into();
        self
    }

    /// Build a definition from a `[reports.<name>]` table.
    pub fn from_settings(settings: &Settings, report: &ReportSettings) -> ReportResult<Self> {
        let mut definition =
            Self::from_layer_specs(&report.layers)?.with_root_name(&settings.root_name_for(report));

        for source in &report.aggregates {
            let measures = source
                .measures
                .iter()
                .map(|m| m.parse())
                .collect::<ReportResult<Vec<Measure>>>()?;
            definition.aggregates.push(AggregateSource {
                focus: source.focus.clone(),
                data: source.data.clone(),
                measures,
            });
        }

        Ok(definition)
    }
}
