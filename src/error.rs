//! Unified error type for report construction.
//!
//! Every stage (graph registration, path resolution, relation building,
//! execution and tree assembly) fails fast with a `ReportError`. Nothing is
//! retried and no partial tree is ever returned.

use thiserror::Error;

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors raised while planning, executing or assembling a report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    /// Two entity types claim the same storage without a shared lineage.
    #[error("Schema conflict: '{first}' and '{second}' both claim storage '{storage}' but neither inherits from the other")]
    SchemaConflict {
        storage: String,
        first: String,
        second: String,
    },

    /// The schema collaborator cannot describe an entity.
    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    /// A column could not be resolved on an entity.
    #[error("Unknown column '{column}' on entity '{entity}'")]
    UnknownColumn { entity: String, column: String },

    /// A requested layer or join path is disconnected.
    #[error("No association path from '{from}' to '{to}' (requested: {})", .requested.join(" -> "))]
    PathNotFound {
        from: String,
        to: String,
        requested: Vec<String>,
    },

    /// A resolved path visits the same entity type twice.
    #[error("Path doubles back on '{entity}': {}", .cycle.join(" -> "))]
    PathDoublesBack { entity: String, cycle: Vec<String> },

    /// No direct edge exists between two entities.
    #[error("'{from}' is not directly connected to '{to}'")]
    ElementNotConnected { from: String, to: String },

    /// No joined entity can reach the join target.
    #[error("Cannot join '{target}' from any of: {}", .attempted.join(", "))]
    JoinUnreachable {
        target: String,
        attempted: Vec<String>,
    },

    /// Targets of mixed type, or of a type outside the configured layers.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Unknown option keys or otherwise malformed configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A node of the wrong type was added to a typed layer.
    #[error("Type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    /// The data store failed to execute a relation.
    #[error("Data store error: {0}")]
    Store(String),
}

impl ReportError {
    /// Build a `PathDoublesBack` error from the offending slice of a path.
    pub fn doubles_back(path: &[String], first: usize, second: usize) -> Self {
        ReportError::PathDoublesBack {
            entity: path[first].clone(),
            cycle: path[first..=second].to_vec(),
        }
    }
}

impl From<crate::config::SettingsError> for ReportError {
    fn from(err: crate::config::SettingsError) -> Self {
        ReportError::ConfigurationError(err.to_string())
    }
}
