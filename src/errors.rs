//! Centralized error handling.
//!
//! Provides a unified error type for every layer of the data-access core.
//! The specification evaluator never produces these; repositories and the
//! unit of work do.

use thiserror::Error;
use uuid::Uuid;

/// Boxed cause carried by storage failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Update/remove on an id that is neither staged nor committed.
    #[error("Resource not found")]
    NotFound,

    /// A row's version changed between staging and commit.
    #[error("Concurrency conflict on {table} {id}")]
    ConcurrencyConflict { table: String, id: Uuid },

    /// Raised upstream; the core only propagates it.
    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Cancelled => "CANCELLED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether rebuilding the unit of work and retrying may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict { .. })
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Storage(Box::new(err))
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(table: impl Into<String>, id: Uuid) -> Self {
        AppError::ConcurrencyConflict {
            table: table.into(),
            id,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn storage(err: impl Into<BoxError>) -> Self {
        AppError::Storage(err.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
