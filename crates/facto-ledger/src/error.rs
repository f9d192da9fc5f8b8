//! Error types for the ledger layer.

use thiserror::Error;

/// Errors that can occur while talking to the accounting system.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[cfg(feature = "json2")]
    #[error("connection error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error.
    #[error("{model}.{method} failed: {message}")]
    Remote {
        model: String,
        method: String,
        message: String,
    },

    /// The server answered, but not with the shape we expected.
    #[error("unexpected response from {model}.{method}: {detail}")]
    UnexpectedResponse {
        model: String,
        method: String,
        detail: String,
    },

    /// Credentials were rejected or no user is attached to the key.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn remote(model: &str, method: &str, message: impl Into<String>) -> Self {
        Self::Remote {
            model: model.to_string(),
            method: method.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unexpected(model: &str, method: &str, detail: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            model: model.to_string(),
            method: method.to_string(),
            detail: detail.into(),
        }
    }
}
