//! Unified error type for the renewal hub.
//!
//! Network and persistence failures, validation failures and configuration
//! problems all flow through [`Error`]. Numeric parse failures are not errors:
//! they coerce to zero (see [`crate::models::Numeric`]).

use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Database layer failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No service with this id exists
    #[error("Service not found: {id}")]
    ServiceNotFound {
        /// The id that was looked up
        id: String,
    },

    /// No category with this id exists
    #[error("Category not found: {id}")]
    CategoryNotFound {
        /// The id that was looked up
        id: String,
    },

    /// Another category already uses this name (case-insensitive)
    #[error("Category with this name already exists: {name}")]
    DuplicateCategory {
        /// The rejected name
        name: String,
    },

    /// Command-line arguments the binary does not understand
    #[error("Unknown command '{command}', expected 'export <pdf|excel|csv> [category_id]'")]
    UnknownCommand {
        /// The rejected command
        command: String,
    },

    /// Export format token outside the supported set
    #[error("Unknown export format: {token}")]
    UnknownExportFormat {
        /// The rejected token
        token: String,
    },

    /// The export endpoint answered with a non-success status
    #[error("Export failed: {message}")]
    ExportFailed {
        /// Status or reason reported for the failure
        message: String,
    },

    /// Required fields are missing; raised before any request is made
    #[error("Missing required fields: {}", missing.join(", "))]
    Validation {
        /// Names of the empty required fields
        missing: Vec<&'static str>,
    },

    /// The action is already in flight
    #[error("{action} already in progress")]
    Busy {
        /// Which action was refused
        action: &'static str,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
