//! Error types for romhacks.
//!
//! This module defines all error types used throughout the crate. The HTTP
//! layer maps each variant onto a status code in `http::error`.

use std::path::PathBuf;
use thiserror::Error;

/// A single problem found while validating user input.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldIssue {
    /// The offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldIssue {
    /// Create a new field issue.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The main error type for romhacks operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Catalog Errors ===
    /// A record could not be found.
    #[error("{what} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        what: &'static str,
        /// The identifier that was requested.
        id: String,
    },

    /// User input failed validation.
    #[error("validation failed: {}", format_issues(.issues))]
    Validation {
        /// Every problem found in the input.
        issues: Vec<FieldIssue>,
    },

    /// A `YYYY-MM` month string could not be parsed.
    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    /// A request was malformed in a way not covered by field validation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An import file could not be understood.
    #[error("failed to import {path}: {message}")]
    Import {
        /// The file being imported.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Access Errors ===
    /// Admin credentials or session are missing or invalid.
    #[error("unauthorized")]
    Unauthorized,

    /// Admin endpoints are disabled because no credentials are configured.
    #[error("admin access is not configured")]
    AdminDisabled,

    /// The client exceeded its request budget.
    #[error("too many requests, slow down")]
    RateLimited,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for romhacks operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Create a validation error carrying a single issue.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            issues: vec![FieldIssue::new(field, message)],
        }
    }

    /// Create a new bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the requested record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error was caused by the caller rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Validation { .. }
                | Self::InvalidMonth(_)
                | Self::BadRequest(_)
                | Self::Unauthorized
                | Self::RateLimited
        )
    }
}
