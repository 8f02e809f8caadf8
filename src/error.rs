use std::fmt::Display;
use std::io;

use thiserror::Error;

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;

/// Standardized application error type
#[derive(Debug, Error)]
pub enum AppError {
    // Infrastructure errors
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Application-level errors
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a not-found error for an entity type and identifier
    pub fn not_found(entity: &str, id: impl Display) -> Self {
        Self::NotFound(format!("{entity} with ID {id}"))
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error reports an operation against a table that is not
    /// present in the schema. The versions table is legitimately absent in
    /// some deployments, so cleanup code treats this condition as benign.
    ///
    /// SQLite reports "no such table"; server backends phrase it as
    /// "does not exist". Message matching is isolated here so the
    /// heuristic lives in exactly one place.
    pub fn is_missing_table(&self) -> bool {
        let message = self.to_string();
        message.contains("no such table") || message.contains("does not exist")
    }

    /// Whether this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
