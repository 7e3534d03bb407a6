//! Error types for the CMS core.
//!
//! Every fallible operation in the crate returns [`CmsResult`]. Lifecycle
//! operations on modules convert these errors into an
//! [`OperationResult`](crate::modules::OperationResult) instead of propagating
//! them, see [`ModuleManager`](crate::modules::ModuleManager).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CmsError {
    /// Referenced module, content type, field or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate install, duplicate field name, slug collision or a
    /// dependency constraint violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Underlying persistence operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A migration unit's `up` or `down` failed
    #[error("Migration {unit} of module {module} failed: {reason}")]
    Migration {
        module: String,
        unit: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Event error: {0}")]
    Event(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`CmsError`], used when reporting outcomes
/// across the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Storage,
    Migration,
    Configuration,
    Event,
    Internal,
}

impl ErrorKind {
    /// HTTP status the routing layer should answer with for this kind of failure
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Storage | Self::Internal => 500,
            _ => 200,
        }
    }
}

impl CmsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Migration { .. } => ErrorKind::Migration,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Event(_) => ErrorKind::Event,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    pub fn storage(what: impl Into<String>) -> Self {
        Self::Storage(what.into())
    }

    /// Message without the kind prefix, as shown to admin users
    pub fn detail(&self) -> String {
        match self {
            Self::NotFound(message) | Self::Conflict(message) | Self::Validation(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for CmsError {
    fn from(error: serde_json::Error) -> Self {
        CmsError::Validation(format!("JSON serialization error: {error}"))
    }
}

impl From<serde_yaml::Error> for CmsError {
    fn from(error: serde_yaml::Error) -> Self {
        CmsError::Validation(format!("YAML parsing error: {error}"))
    }
}

impl From<std::io::Error> for CmsError {
    fn from(error: std::io::Error) -> Self {
        CmsError::Storage(format!("I/O error: {error}"))
    }
}

/// Postgres SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for CmsError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => CmsError::NotFound(err.to_string()),
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                CmsError::Conflict(db_err.message().to_string())
            }
            _ => CmsError::Storage(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CmsError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CmsError::Storage(format!("Core schema migration failed: {err}"))
    }
}

impl From<crate::config::ConfigurationError> for CmsError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        CmsError::Configuration(err.to_string())
    }
}

pub type CmsResult<T> = anyhow::Result<T, CmsError>;
