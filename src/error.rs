//! Error taxonomy shared by the repository, analytics and configuration layers.

use rusqlite::ffi;

/// Result type alias for gradebook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the presentation layer.
///
/// Everything except `Configuration` and `Connection` is recoverable per action:
/// the UI shows the message and the user retries with corrected input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} with {field} '{value}' already exists")]
    UniqueConstraint {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Cannot delete {entity} {id}: {dependents} grade(s) still reference it")]
    ReferentialIntegrity {
        entity: &'static str,
        id: i64,
        dependents: usize,
    },

    /// Foreign-key backstop: a write named a student or course that no longer exists
    #[error("Referenced record does not exist: {0}")]
    MissingReference(String),

    #[error("Configuration error for {key}: {reason}")]
    Configuration { key: &'static str, reason: String },

    #[error("Cannot connect to database: {0}")]
    Connection(String),

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),
}

impl Error {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Error::NotFound { entity, id }
    }

    /// Whether the error must abort startup rather than a single action
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration { .. } | Error::Connection(_))
    }
}

/// Constraint failures that slip past the explicit checks still land in the taxonomy.
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, ref message) = err {
            let detail = message.clone().unwrap_or_else(|| code.to_string());
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Error::UniqueConstraint {
                        entity: "Row",
                        field: "key",
                        value: detail,
                    };
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return Error::MissingReference(detail);
                }
                ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    return Error::Validation {
                        field: "row",
                        reason: detail,
                    };
                }
                _ => {}
            }
        }
        Error::Storage(err)
    }
}
