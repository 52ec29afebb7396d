//! Application core: handlers, errors, responses and the request pipeline.

mod config;
mod error;
mod handler;
mod http_error;
mod pipeline;
mod resolver;
mod response;
mod shared;
mod status;
mod tests;

// Re-export public items
pub use config::AppConfig;
pub use error::Error;
pub use handler::{Handler, HandlerFn, IntoReply, Reply};
pub use http_error::{
    Cause, Causes, Diagnostic, ErrorKind, HttpError, PanicError, ResultExt, HTTP_ERROR, MAX_CAUSES, METHOD_NOT_ALLOWED,
    REDIRECT,
};
pub use pipeline::{App, AppBuilder};
pub use resolver::{CauseKey, ErrorHandlers, ErrorKey, Tier};
pub use response::{Body, ByteStream, Flavor, Response, WireBody, WireResponse};
pub use shared::SharedApp;
pub use status::{reason_phrase, StatusCode, StatusLine, UNKNOWN_PHRASE};
