//! Route patterns and the ordered route table.

mod error;
mod pattern;
mod router;

// Re-export public items
pub use error::{PatternError, RoutingFailure};
pub(crate) use error::join_methods;
pub use pattern::{translate, RoutePattern, RAW_MARKER};
pub use router::{Route, RouteMatch, Router};
