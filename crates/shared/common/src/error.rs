//! Unified error handling for the identity stores.
//!
//! Store lookups do not fail on a missing record: they return `Option::None`
//! and lists return an empty `Vec`. [`AppError::NotFound`] is for callers
//! that require the record, such as the admin CLI. Storage refusals such as
//! duplicate keys are reported through `IdentityResult` by the repositories.

use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    // Operation lifecycle
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    // Configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Storage
    #[cfg(feature = "database")]
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[cfg(feature = "database")]
    #[error("Could not connect to database")]
    Connection(#[source] sea_orm::DbErr),
}

impl AppError {
    /// Get stable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NotSupported(_) => "NOT_SUPPORTED",
            AppError::Cancelled => "CANCELLED",
            AppError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            #[cfg(feature = "database")]
            AppError::Database(_) => "DATABASE_ERROR",
            #[cfg(feature = "database")]
            AppError::Connection(_) => "CONNECTION_ERROR",
        }
    }

    /// Check if the error came from cancellation or an expired deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AppError::Cancelled | AppError::DeadlineExceeded)
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self, what: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, what: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(what.into()))
    }
}

/// Convenience constructors
impl AppError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        AppError::NotSupported(operation.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }
}
