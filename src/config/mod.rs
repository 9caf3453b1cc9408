//! Configuration module for strata.
//!
//! Handles report definitions, access rules, store locations and logging.

mod settings;

pub use settings::{
    expand_env_vars, AccessSettings, AggregateSettings, EngineSettings, LoggingSettings,
    ReportSettings, Settings, SettingsError, StoreSettings,
};
