//! Error taxonomy for the export pipeline.
//!
//! `ValidationError` and `NotFoundError` surface synchronously to the caller.
//! `DestinationError` and `StoreError` raised inside a background export are
//! recorded on the job and in the integration log instead.

use serde_json::{json, Value as JsonValue};
use thiserror::Error;

/// Bad filter or request input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    #[error("Invalid value for `{field}`: {message}")]
    InvalidField { field: String, message: String },

    #[error("Unsupported destination: {0}")]
    UnsupportedDestination(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<(String, String)> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    (field.to_string(), message)
                })
            })
            .collect();
        fields.sort();

        match fields.into_iter().next() {
            Some((field, message)) => ValidationError::InvalidField { field, message },
            None => ValidationError::Invalid("Validation failed".to_string()),
        }
    }
}

/// A requested entity does not exist (or is not visible to the caller).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource} not found: {id}")]
pub struct NotFoundError {
    pub resource: &'static str,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &'static str, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
        }
    }
}

/// Failure while transferring records to an external destination.
#[derive(Debug, Clone, Error)]
pub enum DestinationError {
    #[error("Destination rejected the transfer: {message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    #[error("Destination transport error: {0}")]
    Transport(String),

    #[error("Destination not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to write export artifact: {0}")]
    Artifact(String),

    #[error("Destination call timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Export cancelled")]
    Cancelled,
}

impl DestinationError {
    /// Structured diagnostic stored in the integration log detail.
    pub fn diagnostic(&self) -> JsonValue {
        match self {
            DestinationError::Rejected { status, message } => {
                json!({ "kind": "rejected", "status": status, "message": message })
            }
            DestinationError::Transport(message) => {
                json!({ "kind": "transport", "message": message })
            }
            DestinationError::NotConfigured(message) => {
                json!({ "kind": "not_configured", "message": message })
            }
            DestinationError::Artifact(message) => {
                json!({ "kind": "artifact", "message": message })
            }
            DestinationError::TimedOut(secs) => json!({ "kind": "timeout", "seconds": secs }),
            DestinationError::Cancelled => json!({ "kind": "cancelled" }),
        }
    }
}

/// Data access failure.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Stored data is invalid: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// Any error the export pipeline can produce.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Export queue is full")]
    QueueFull,

    #[error("Export queue is shut down")]
    QueueClosed,
}
