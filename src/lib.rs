//! A minimal request-dispatch core.
//!
//! This library maps already-parsed requests onto handler functions and turns
//! whatever those handlers produce, including failures, into a well-formed
//! response. Socket handling and HTTP parsing are left to the embedding
//! transport.
//!
//! # Features
//!
//! - Ordered route table with a small pattern language (`*`, `<name>`, `<name:regex>`, raw `^regex`)
//! - Automatic 404 and 405 responses, with the `Allow` header listing every accepted method
//! - Standard methods plus extension tokens such as `PROPFIND`
//! - Structured [`HttpError`]s with kinds, causal chains and per-kind, per-cause or per-status handlers
//! - Response flavors for HTML text, JSON, bytes and lazily streamed bodies
//! - Panics in handlers are caught and reported as 500 responses
//! - Immutable, thread-safe [`App`] with hot replacement through [`SharedApp`]
//!
//! # Examples
//!
//! ## Basic usage
//!
//! ```
//! use tinydispatch::{App, Headers, Method, Request};
//!
//! let mut builder = App::builder();
//! builder
//!     .add_route("/hello/<name>", [Method::GET], |req: &Request, _: &mut _| {
//!         format!("Hello, {}!", req.route_var("name").unwrap_or("stranger"))
//!     })
//!     .unwrap();
//! let app = builder.build();
//!
//! let response = app.handle(&Request::new(Method::GET, "/hello/world", Headers::new()));
//! assert_eq!(response.status.code, 200);
//! assert_eq!(response.body.into_bytes(), b"Hello, world!");
//! ```
//!
//! ## Error handling
//!
//! ```
//! use tinydispatch::{App, Headers, HttpError, Method, Request, Response};
//!
//! let mut builder = App::builder();
//! builder
//!     .add_route("/items/<id:\\d+>", [Method::GET], |_: &Request, _: &mut Response| {
//!         Err::<(), _>(HttpError::new(410).with_short("Item retired"))
//!     })
//!     .unwrap();
//! builder.set_error_handler(404u16, |_: &Request, _: &mut Response| "Nothing here");
//! let app = builder.build();
//!
//! let missing = app.handle(&Request::new(Method::GET, "/nope", Headers::new()));
//! assert_eq!(missing.status.code, 404);
//! assert_eq!(missing.body.into_bytes(), b"Nothing here");
//!
//! // No handler for 410, so the built-in error page renders it.
//! let retired = app.handle(&Request::new(Method::GET, "/items/7", Headers::new()));
//! assert_eq!(retired.status.code, 410);
//! ```
//!
//! ## JSON support
//!
//! ```
//! use serde_json::json;
//! use tinydispatch::{App, Flavor, Headers, Method, Request, Response};
//!
//! let mut builder = App::builder();
//! builder
//!     .add_route_with("/status", [Method::GET], Flavor::Json, |_: &Request, _: &mut Response| {
//!         json!({"ok": true})
//!     })
//!     .unwrap();
//! let app = builder.build();
//!
//! let response = app.handle(&Request::new(Method::GET, "/status", Headers::new()));
//! assert_eq!(response.header("Content-Type"), Some("application/json;charset=utf-8"));
//! assert_eq!(response.body.into_bytes(), br#"{"ok":true}"#);
//! ```
//!
//! See the `demos` directory for a complete program.

// Export the request module
pub mod request;

// Export the routing module
pub mod routing;

// Export the app module
pub mod app;

// Re-export commonly used items for convenience
pub use app::{
    App, AppBuilder, AppConfig, Body, Error as AppError, ErrorKey, ErrorKind, Flavor, HttpError, IntoReply, Reply,
    Response, ResultExt, SharedApp, StatusCode, WireBody, WireResponse, HTTP_ERROR, METHOD_NOT_ALLOWED, REDIRECT,
};
pub use request::{parse_header_value, Error as RequestError, ExtensionMethod, HeaderValue, Headers, Method, Request};
pub use routing::{PatternError, RoutePattern, Router};
