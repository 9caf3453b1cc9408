//! TOML-based configuration for strata.
//!
//! Supports a config file (strata.toml) with environment variable expansion
//! in store paths.
//!
//! Example configuration:
//! ```toml
//! [engine]
//! root_name = "Report"
//! through_hint_min_nodes = 3
//!
//! [logging]
//! filter = "strata=debug"
//!
//! [store]
//! schema = "${STRATA_HOME}/schema.toml"
//! data = "./data/shop.json"
//!
//! [reports.sales_by_product]
//! layers = ["Category", "Product"]
//!
//! [[reports.sales_by_product.aggregates]]
//! focus = "Product"
//! data = "Sales"
//! measures = ["count", "sum:amount"]
//!
//! [access.Sales]
//! condition = { "Store.region" = "north" }
//! join_paths = [["Sales", "Store"]]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::graph::DEFAULT_THROUGH_HINT_MIN_NODES;
use crate::value::Value;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Report engine tuning.
    pub engine: EngineSettings,

    /// Log filter used by the CLI.
    pub logging: LoggingSettings,

    /// Files backing the bundled in-memory store.
    pub store: StoreSettings,

    /// Named report definitions.
    pub reports: BTreeMap<String, ReportSettings>,

    /// Static access rules keyed by entity name.
    pub access: BTreeMap<String, AccessSettings>,
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Type name of every report's root node, unless a report overrides it.
    pub root_name: String,

    /// A cached path with at least this many entities may be replaced by a
    /// through-association's two-hop route.
    pub through_hint_min_nodes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            root_name: "Report".to_string(),
            through_hint_min_nodes: DEFAULT_THROUGH_HINT_MIN_NODES,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// In-memory store configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Schema file (TOML `[[entity]]` tables). Supports ${ENV_VAR} expansion.
    pub schema: Option<String>,

    /// Data file (JSON object of tables). Supports ${ENV_VAR} expansion.
    pub data: Option<String>,
}

impl StoreSettings {
    /// Schema path with environment variables expanded.
    pub fn resolved_schema_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        resolve_path(self.schema.as_deref())
    }

    /// Data path with environment variables expanded.
    pub fn resolved_data_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        resolve_path(self.data.as_deref())
    }
}

fn resolve_path(raw: Option<&str>) -> Result<Option<PathBuf>, SettingsError> {
    raw.map(|p| expand_env_vars(p).map(PathBuf::from)).transpose()
}

/// One named report.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportSettings {
    /// Layers outermost first: `Entity` or `Entity.column`.
    pub layers: Vec<String>,

    /// Aggregate roll-ups.
    #[serde(default)]
    pub aggregates: Vec<AggregateSettings>,

    /// Root node type name for this report.
    #[serde(default)]
    pub root_name: Option<String>,
}

/// One aggregate source of a report.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSettings {
    /// Layer entity the roll-up is routed from.
    pub focus: String,

    /// Entity supplying the rows to aggregate.
    pub data: String,

    /// Measures such as `count`, `sum:amount`, `count_distinct:store_id`.
    #[serde(default = "default_measures")]
    pub measures: Vec<String>,
}

fn default_measures() -> Vec<String> {
    vec!["count".to_string()]
}

/// Static access rule for one entity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccessSettings {
    /// Column equalities; keys are `column` or `Entity.column`.
    #[serde(default)]
    pub condition: BTreeMap<String, Value>,

    /// Entity paths joined before the condition applies.
    #[serde(default)]
    pub join_paths: Vec<Vec<String>>,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `STRATA_CONFIG`
    /// 2. `./strata.toml`
    /// 3. `~/.config/strata/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("STRATA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("strata.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("strata").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a report by name.
    pub fn report(&self, name: &str) -> Result<&ReportSettings, SettingsError> {
        self.reports
            .get(name)
            .ok_or_else(|| SettingsError::ReportNotFound(name.to_string()))
    }

    /// Root name for a report: its own override, else the engine default.
    pub fn root_name_for(&self, report: &ReportSettings) -> String {
        report
            .root_name
            .clone()
            .unwrap_or_else(|| self.engine.root_name.clone())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = std::iter::from_fn(|| chars.next_if(|&ch| ch != '}')).collect();
            if chars.next_if_eq(&'}').is_none() {
                return Err(SettingsError::InvalidConfig(format!("unterminated '${{' in '{}'", s)));
            }
            name
        } else {
            std::iter::from_fn(|| chars.next_if(|&ch| ch.is_alphanumeric() || ch == '_')).collect()
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
