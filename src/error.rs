//! Error types for tosdb
//!
//! Provides a unified error type for all operations.
//!
//! Every variant except the transport-level ones is recoverable at the session
//! level: the dispatcher turns it into an `Error: ...` response line and keeps
//! the connection open.

use thiserror::Error;

/// Result type alias using TosError
pub type Result<T> = std::result::Result<T, TosError>;

/// Unified error type for tosdb operations
#[derive(Debug, Error)]
pub enum TosError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("Invalid command syntax: {0}")]
    Malformed(String),

    #[error("Command too long: {len} bytes (max {max})")]
    CommandTooLong { len: usize, max: usize },

    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Catalog Errors
    // -------------------------------------------------------------------------
    #[error("Database '{0}' does not exist")]
    NoSuchDatabase(String),

    #[error("Table '{table}' does not exist in database '{database}'")]
    NoSuchTable { database: String, table: String },

    #[error("Database '{0}' already exists")]
    DatabaseExists(String),

    #[error("Table '{table}' already exists in database '{database}'")]
    TableExists { database: String, table: String },

    #[error("No database selected. Use 'use <name>' first")]
    NoDatabaseSelected,

    #[error("Corrupt schema for table '{table}': {reason}")]
    CorruptSchema { table: String, reason: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TosError {
    /// True for the duplicate-creation class of errors (database or table)
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            TosError::DatabaseExists(_) | TosError::TableExists { .. }
        )
    }
}

impl From<bincode::Error> for TosError {
    fn from(err: bincode::Error) -> Self {
        TosError::Serialization(err.to_string())
    }
}
