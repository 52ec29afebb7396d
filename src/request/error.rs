//! Error types for inbound request handling.

use thiserror::Error;

/// Errors that can occur while building or reading a [`Request`](crate::Request).
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP method handed over by the transport is not supported.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// Error parsing a JSON body.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
