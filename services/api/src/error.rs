//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the mapping
//! from port errors to HTTP responses used by every handler.

use crate::config::ConfigError;
use axum::http::StatusCode;
use emr_core::ports::PortError;
use tracing::{error, warn};

/// The primary error type for the `emr_api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The error half of every handler's return type.
pub type HandlerError = (StatusCode, String);

/// Maps a port failure to a status code and a client-safe message.
///
/// Validation, not-found and conflict messages are written by us and safe to
/// echo. Storage failures are logged in full and replaced with a generic text.
pub fn port_failure(action: &str, err: PortError) -> HandlerError {
    match err {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
        PortError::Unavailable(detail) => {
            warn!("Failed to {}: storage unavailable: {}", action, detail);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Failed to {}: service temporarily unavailable", action),
            )
        }
        PortError::Unexpected(detail) => {
            error!("Failed to {}: {}", action, detail);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to {}", action))
        }
    }
}
