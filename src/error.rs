//! Error types for keep-sweep
//!
//! This module defines the error hierarchy for:
//! - API transport and query errors
//! - Sweep failures (consumer, invariant, completeness, cancellation)
//! - SQLite inventory errors
//! - Configuration and CLI errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors that gate destructive follow-up work must be distinguishable
//! - Preserve error chains for debugging

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by per-collection callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for a sweep
#[derive(Error, Debug)]
pub enum SweepError {
    /// List or count request failed
    #[error("API error: {0}")]
    Transport(#[from] ApiError),

    /// The per-collection callback failed
    #[error("Collection callback failed: {0}")]
    Consumer(#[source] BoxError),

    /// The source returned data that makes forward progress impossible
    #[error("BUG: collection {uuid} has no modified_at timestamp; cannot make progress")]
    InvariantViolation { uuid: String },

    /// Post-sweep count shows collections that were never visited
    #[error(
        "Retrieved {visited} collections with modified_at <= {}, but server now reports there are {expected} collections with modified_at <= that time",
        .boundary.to_rfc3339()
    )]
    Incomplete {
        visited: u64,
        expected: u64,
        boundary: DateTime<Utc>,
    },

    /// Cancellation was observed between page requests
    #[error("Sweep cancelled")]
    Cancelled,

    /// Inventory errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// True when the sweep result must not be acted on (e.g. no block deletion)
    pub fn is_data_integrity_failure(&self) -> bool {
        matches!(
            self,
            SweepError::Incomplete { .. } | SweepError::InvariantViolation { .. }
        )
    }

    /// True when the sweep stopped because cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SweepError::Cancelled)
    }
}

/// API transport and query errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP transport failure (connect, timeout, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request itself was malformed (unknown attribute, bad operand)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An exact count was requested but the response carried none
    #[error("Server response did not include items_available")]
    MissingCount,
}

impl ApiError {
    /// HTTP status code, if the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Inventory database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to create database file
    #[error("Failed to create database at '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// Writer channel closed unexpectedly
    #[error("Inventory writer channel closed unexpectedly")]
    ChannelClosed,

    /// Writer thread panicked
    #[error("Inventory writer thread panicked")]
    WriterPanicked,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No API host given on the command line or in the environment
    #[error("API host is required (--api-host or ARVADOS_API_HOST)")]
    MissingApiHost,

    /// API host could not be parsed
    #[error("Invalid API host '{host}': {reason}")]
    InvalidApiHost { host: String, reason: String },

    /// No API token given
    #[error("API token is required (--api-token or ARVADOS_API_TOKEN)")]
    MissingToken,

    /// Page size out of range
    #[error("Invalid page size {size}: must be between 0 (server maximum) and {max}")]
    InvalidPageSize { size: u64, max: u64 },

    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Timeout of zero seconds
    #[error("Invalid timeout: must be at least 1 second")]
    InvalidTimeout,

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Result type alias for SweepError
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for ApiError
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;
