//! Inbound request model.
//!
//! This module holds everything the dispatch core needs to know about an
//! inbound request: its method, headers, decoded body, the route it matched
//! and the errors being handled on its behalf.

mod error;
mod header_value;
mod headers;
mod method;
mod request;

// Re-export public items
pub use error::Error;
pub use header_value::{parse_header_value, HeaderValue};
pub use headers::Headers;
pub use method::{ExtensionMethod, Method, MAX_EXTENSION_LEN};
pub use request::Request;
