//! Error types for strata-state

use thiserror::Error;

/// Errors that can occur while talking to the target database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// A revision's forward script was rejected by the database.
    ///
    /// The enclosing transaction has been rolled back when this is returned.
    #[error("Script for revision {revision} failed: {message}")]
    ScriptExecution { revision: String, message: String },

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// The revision already has a row in the tracking table
    #[error("Revision already recorded as applied: {0}")]
    AlreadyRecorded(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// The profile names a dialect this build cannot open
    #[error("Unsupported database dialect: {0}")]
    UnsupportedDialect(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested environment is not present in the configuration file
    #[error("Environment not found in configuration: {0}")]
    EnvironmentNotFound(String),
}

impl StateError {
    /// True for failures of the connection itself rather than of a statement.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StateError::Connection(_))
    }
}

impl From<rusqlite::Error> for StateError {
    fn from(err: rusqlite::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_yaml::Error> for StateError {
    fn from(err: serde_yaml::Error) -> Self {
        StateError::Config(err.to_string())
    }
}
