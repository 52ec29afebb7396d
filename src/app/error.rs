//! Error types for building an application.

use thiserror::Error;

use crate::routing::PatternError;

/// Errors that can occur while configuring or building an [`App`](crate::App).
#[derive(Debug, Error)]
pub enum Error {
    /// A route pattern did not compile.
    #[error("Route error: {0}")]
    Pattern(#[from] PatternError),

    /// Malformed configuration.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
