//! Error types for the supportal-store library.
//!
//! Every write path reports constraint violations through [`StoreError`], whether
//! the violation was caught by [`crate::validation::InputValidator`] before the
//! write or raised by SQLite itself.

use rusqlite::ffi;
use thiserror::Error;

/// Errors that can occur in the supportal-store library.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database-related errors not covered by a more specific variant
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Migration could not be applied or reverted
    #[error("Migration error: {0}")]
    Migration(String),

    /// A table the migration would create is already present
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// A migration dependency or referenced table is absent
    #[error("Missing migration dependency: {0}")]
    MissingDependency(String),

    /// Uniqueness constraint violated
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Required field missing or blank
    #[error("Field is required: {0}")]
    NotNull(String),

    /// Value outside an enumerated set of choices
    #[error("Invalid choice for {field}: {value}")]
    InvalidChoice {
        /// Field being written
        field: String,
        /// Rejected value
        value: String,
    },

    /// Uploaded file has a disallowed extension
    #[error("File extension \"{extension}\" is not allowed. Allowed extensions are: pdf, docx, txt")]
    InvalidFileExtension {
        /// Rejected extension (lowercased, may be empty)
        extension: String,
    },

    /// Value longer than the column allows
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Field being written
        field: String,
        /// Maximum number of characters
        max: usize,
    },

    /// Referenced parent row does not exist
    #[error("Foreign key constraint violated: {0}")]
    ForeignKey(String),

    /// Other input validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Row lookup found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience type alias for Result with StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// True for any variant describing a violated data constraint.
    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::UniqueViolation(_)
                | Self::NotNull(_)
                | Self::InvalidChoice { .. }
                | Self::InvalidFileExtension { .. }
                | Self::TooLong { .. }
                | Self::ForeignKey(_)
                | Self::Validation(_)
        )
    }

    /// Translate a SQLite constraint failure into a typed variant.
    ///
    /// Non-constraint errors are wrapped unchanged in [`StoreError::Database`].
    #[must_use]
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(code, ref message) = err else {
            return Self::Database(err);
        };
        let detail = message.clone().unwrap_or_else(|| code.to_string());
        match code.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Self::UniqueViolation(detail)
            }
            ffi::SQLITE_CONSTRAINT_NOTNULL => Self::NotNull(detail),
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::ForeignKey(detail),
            ffi::SQLITE_CONSTRAINT_CHECK => Self::Validation(detail),
            _ => Self::Database(err),
        }
    }
}

impl From<config::ConfigError> for StoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
