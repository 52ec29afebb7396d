//! Error types for route compilation and lookup.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::request::Method;

/// A route pattern that could not be compiled. Raised at registration time.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid route pattern `{spec}`: {source}")]
    Invalid {
        spec: String,
        #[source]
        source: regex::Error,
    },
}

/// Why a `(path, method)` pair has no route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingFailure {
    /// No route pattern accepts the path.
    #[error("No route matches the requested path")]
    NotFound,

    /// Routes accept the path, but none of them accepts the method.
    /// Carries the union of every rejecting route's allowed methods.
    #[error("Method not allowed; allowed methods: {}", join_methods(.0))]
    MethodNotAllowed(BTreeSet<Method>),
}

impl RoutingFailure {
    /// The status code this failure maps to.
    pub fn code(&self) -> u16 {
        match self {
            RoutingFailure::NotFound => 404,
            RoutingFailure::MethodNotAllowed(_) => 405,
        }
    }
}

/// Comma-join methods in their sort order, as written in an `Allow` header.
pub(crate) fn join_methods(methods: &BTreeSet<Method>) -> String {
    methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(",")
}
