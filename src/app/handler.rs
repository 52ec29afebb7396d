//! Request handlers and the coalescing of their return values.

use std::fmt;
use std::sync::Arc;

use crate::app::http_error::HttpError;
use crate::app::response::{Body, Flavor, Response};
use crate::request::Request;

/// Type alias for a type-erased handler function.
pub type HandlerFn = Arc<dyn Fn(&Request, &mut Response) -> Result<Reply, HttpError> + Send + Sync>;

/// What a handler hands back.
pub enum Reply {
    /// Use the response the handler was given, as it left it.
    Empty,
    /// Use this response instead.
    Replace(Response),
    /// Store this content in the response the handler was given.
    Content(Body),
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Empty => f.write_str("Empty"),
            Reply::Replace(response) => f.debug_tuple("Replace").field(response).finish(),
            Reply::Content(body) => f.debug_tuple("Content").field(body).finish(),
        }
    }
}

/// Conversion of handler return values into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, HttpError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(Reply::Empty)
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(Reply::Replace(self))
    }
}

impl IntoReply for Body {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(Reply::Content(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(Reply::Content(Body::Text(self)))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(Reply::Content(Body::Text(self.to_string())))
    }
}

impl IntoReply for serde_json::Value {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(Reply::Content(Body::Json(self)))
    }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Result<Reply, HttpError> {
        Ok(Reply::Content(Body::Bytes(self)))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, HttpError> {
        match self {
            Some(value) => value.into_reply(),
            None => Ok(Reply::Empty),
        }
    }
}

impl<T: IntoReply> IntoReply for Result<T, HttpError> {
    fn into_reply(self) -> Result<Reply, HttpError> {
        self.and_then(IntoReply::into_reply)
    }
}

/// A handler function plus the flavor of the response it is handed.
#[derive(Clone)]
pub struct Handler {
    func: HandlerFn,
    flavor: Flavor,
}

impl Handler {
    pub fn new<F, R>(flavor: Flavor, func: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            func: Arc::new(move |request: &Request, response: &mut Response| func(request, response).into_reply()),
            flavor,
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Run the handler on a fresh response and coalesce its return value.
    ///
    /// The fresh response carries the error being handled, if any. A
    /// replacement response inherits that error unless it sets its own.
    pub fn handle_request(&self, request: &Request) -> Result<Response, HttpError> {
        let mut response = Response::new(self.flavor);
        if let Some(http_error) = request.http_error() {
            response = response.with_error(http_error.clone());
        }

        match (self.func)(request, &mut response)? {
            Reply::Empty => Ok(response),
            Reply::Replace(mut replacement) => {
                if replacement.http_error().is_none() {
                    if let Some(http_error) = response.take_error() {
                        replacement.inherit_error(http_error);
                    }
                }
                Ok(replacement)
            }
            Reply::Content(body) => {
                response.set_content(body)?;
                Ok(response)
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("flavor", &self.flavor).finish_non_exhaustive()
    }
}
