//! Persistence error handling
//!
//! Errors are split the way callers need to react to them:
//!
//! - configuration errors abort construction of the offending entity type
//! - storage errors are surfaced for the failing operation and never retried
//! - precondition failures (missing primary key, no matching row) are not
//!   errors at all; the engine reports them as `Ok(false)`

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while mapping records to rows
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Entity declares nothing that can be stored
    #[error("Table '{table}' declares no persistable fields besides its primary key")]
    NoPersistableFields { table: String },

    /// Entity does not declare a schema version
    #[error("Table '{table}' has to declare a version")]
    MissingVersion { table: String },

    /// Declared schema version is out of range
    #[error("Version of table '{table}' has to be >= 1, got {version}")]
    InvalidVersion { table: String, version: i32 },

    /// Table, column or index name is not a plain SQL identifier
    #[error("Invalid {kind} name '{name}': use ASCII letters, digits and '_', not starting with a digit")]
    InvalidIdentifier { kind: &'static str, name: String },

    /// Two fields map to the same column
    #[error("Column '{column}' is declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// More than one field is flagged as primary key
    #[error("Table '{table}' declares more than one primary key")]
    MultiplePrimaryKeys { table: String },

    /// Primary key cannot hold a storage-assigned row id
    #[error("Primary key '{column}' of table '{table}' must be an integer column")]
    InvalidPrimaryKey { table: String, column: String },

    /// Entity maps onto the version registry's own table
    #[error("Table name '{table}' is reserved")]
    ReservedTable { table: String },

    /// Column is not part of the table schema
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Stored value cannot be converted into the requested type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Version registry could not persist a version record
    #[error("Could not record version {version} for table '{table}'")]
    VersionNotRecorded { table: String, version: i32 },

    /// Cursor was used after `close`
    #[error("Cursor is closed")]
    CursorClosed,

    /// Cursor is before the first or after the last row
    #[error("Cursor is not positioned on a row")]
    NoCurrentRow,

    /// Column index outside the cursor's column range
    #[error("Column index {index} out of range for {count} column(s)")]
    ColumnOutOfRange { index: usize, count: usize },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create the directory holding the database file
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PersistenceError {
    /// Shorthand used by `Record::set_value` implementations
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        PersistenceError::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Check if this error comes from a bad entity declaration
    ///
    /// Configuration errors are fatal for the entity type: retrying the
    /// operation cannot succeed until the declaration is fixed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PersistenceError::NoPersistableFields { .. }
                | PersistenceError::MissingVersion { .. }
                | PersistenceError::InvalidVersion { .. }
                | PersistenceError::InvalidIdentifier { .. }
                | PersistenceError::DuplicateColumn { .. }
                | PersistenceError::MultiplePrimaryKeys { .. }
                | PersistenceError::InvalidPrimaryKey { .. }
                | PersistenceError::ReservedTable { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            PersistenceError::NoPersistableFields { .. } => {
                Some("Declare at least one persistable field in the entity descriptor.")
            }
            PersistenceError::MissingVersion { .. } | PersistenceError::InvalidVersion { .. } => {
                Some("Declare a schema version of 1 or higher with `EntityDescriptor::version`.")
            }
            PersistenceError::InvalidIdentifier { .. } => {
                Some("Rename the table, column or index to a plain identifier such as `order_items`.")
            }
            PersistenceError::DuplicateColumn { .. }
            | PersistenceError::MultiplePrimaryKeys { .. } => {
                Some("Remove the duplicate declaration; every table has exactly one primary key.")
            }
            PersistenceError::ReservedTable { .. } => {
                Some("Pick another table name with `EntityDescriptor::table`.")
            }
            PersistenceError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            _ => None,
        }
    }
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;
