//! Response flavors and the response lifecycle.
//!
//! A [`Response`] is *open* while its handler runs: content is written,
//! headers are set. [`Response::finalize`] freezes it: the flavor's content
//! hook produces the body, default headers are filled in where the handler
//! left gaps, and [`Response::into_wire`] hands the transport a
//! [`WireResponse`].

use std::fmt;

use log::error;
use serde::{Deserialize, Serialize};

use crate::app::http_error::{Diagnostic, HttpError};
use crate::app::status::{StatusCode, StatusLine};
use crate::request::{Headers, Method, Request};

/// A lazily produced body.
pub type ByteStream = Box<dyn Iterator<Item = Vec<u8>> + Send>;

/// The kind of content a response accumulates.
///
/// Each route and error handler declares the flavor of the response it is
/// handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// No content type and no content hook. Accepts raw byte writes only.
    Raw,
    /// `text/html; charset=utf-8`, built from string writes.
    #[default]
    Text,
    /// `application/json; charset=utf-8`, built from one JSON value.
    Json,
    /// `application/octet-stream`, built from byte writes.
    Bytes,
    /// `application/octet-stream`, produced lazily by an iterator.
    Stream,
}

impl Flavor {
    pub fn default_content_type(self) -> Option<&'static str> {
        match self {
            Flavor::Raw => None,
            Flavor::Text => Some("text/html"),
            Flavor::Json => Some("application/json"),
            Flavor::Bytes | Flavor::Stream => Some("application/octet-stream"),
        }
    }

    pub fn default_charset(self) -> Option<&'static str> {
        match self {
            Flavor::Text | Flavor::Json => Some("utf-8"),
            Flavor::Raw | Flavor::Bytes | Flavor::Stream => None,
        }
    }
}

/// Content a handler hands back to be stored in its response.
pub enum Body {
    Text(String),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Stream(ByteStream),
}

impl Body {
    pub fn stream<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Body::Stream(Box::new(chunks.into_iter()))
    }

    fn describe(&self) -> &'static str {
        match self {
            Body::Text(_) => "text",
            Body::Json(_) => "json",
            Body::Bytes(_) => "bytes",
            Body::Stream(_) => "stream",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Flavor-specific content accumulator.
enum Content {
    Raw(Vec<u8>),
    Text(Vec<String>),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Stream(Option<ByteStream>),
}

impl Content {
    fn empty(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Raw => Content::Raw(Vec::new()),
            Flavor::Text => Content::Text(Vec::new()),
            Flavor::Json => Content::Json(serde_json::Value::Array(Vec::new())),
            Flavor::Bytes => Content::Bytes(Vec::new()),
            Flavor::Stream => Content::Stream(None),
        }
    }

    fn flavor(&self) -> Flavor {
        match self {
            Content::Raw(_) => Flavor::Raw,
            Content::Text(_) => Flavor::Text,
            Content::Json(_) => Flavor::Json,
            Content::Bytes(_) => Flavor::Bytes,
            Content::Stream(_) => Flavor::Stream,
        }
    }
}

/// The body handed to the transport.
pub enum WireBody {
    Full(Vec<u8>),
    Stream(ByteStream),
}

impl WireBody {
    /// Collect the body into one buffer, draining a stream.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            WireBody::Full(bytes) => bytes,
            WireBody::Stream(chunks) => chunks.flatten().collect(),
        }
    }
}

impl fmt::Debug for WireBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            WireBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Everything the transport needs to write a response.
#[derive(Debug)]
pub struct WireResponse {
    pub status: StatusLine,
    pub headers: Vec<(String, String)>,
    pub body: WireBody,
    /// Origin of the attached error's causal chain; `None` if it has none.
    pub diagnostic: Option<Diagnostic>,
}

impl WireResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

enum State {
    Open,
    Finalized(Option<WireBody>),
}

/// An outgoing response.
pub struct Response {
    code: u16,
    content_type: Option<String>,
    charset: Option<String>,
    headers: Headers,
    http_error: Option<HttpError>,
    content: Content,
    state: State,
}

impl Response {
    /// An empty `200` response of the given flavor.
    pub fn new(flavor: Flavor) -> Self {
        Self {
            code: StatusCode::Ok.as_u16(),
            content_type: flavor.default_content_type().map(str::to_string),
            charset: flavor.default_charset().map(str::to_string),
            headers: Headers::new(),
            http_error: None,
            content: Content::empty(flavor),
            state: State::Open,
        }
    }

    /// A text response holding `content`.
    pub fn text(content: impl Into<String>) -> Self {
        let mut response = Self::new(Flavor::Text);
        response.content = Content::Text(vec![content.into()]);
        response
    }

    /// A JSON response holding `value`.
    pub fn json(value: serde_json::Value) -> Self {
        let mut response = Self::new(Flavor::Json);
        response.content = Content::Json(value);
        response
    }

    /// A byte response holding `bytes`.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let mut response = Self::new(Flavor::Bytes);
        response.content = Content::Bytes(bytes.into());
        response
    }

    /// A streamed response producing `chunks` lazily.
    pub fn stream<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        let mut response = Self::new(Flavor::Stream);
        response.content = Content::Stream(Some(Box::new(chunks.into_iter())));
        response
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn with_status(self, status: StatusCode) -> Self {
        self.with_code(status.as_u16())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_charset(mut self, charset: Option<&str>) -> Self {
        self.charset = charset.map(str::to_string);
        self
    }

    /// Attach `error`; the response takes over its status code.
    pub fn with_error(mut self, error: HttpError) -> Self {
        self.code = error.code();
        self.http_error = Some(error);
        self
    }

    /// Attach `error` without touching the status code.
    pub(crate) fn inherit_error(&mut self, error: HttpError) {
        self.http_error = Some(error);
    }

    pub(crate) fn take_error(&mut self) -> Option<HttpError> {
        self.http_error.take()
    }

    pub fn flavor(&self) -> Flavor {
        self.content.flavor()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: Option<&str>) {
        self.content_type = content_type.map(str::to_string);
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn set_charset(&mut self, charset: Option<&str>) {
        self.charset = charset.map(str::to_string);
    }

    pub fn http_error(&self) -> Option<&HttpError> {
        self.http_error.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, State::Finalized(_))
    }

    /// Replace the content with what a handler returned.
    ///
    /// Fails with a 500 if this flavor cannot hold that kind of content.
    pub fn set_content(&mut self, body: Body) -> Result<(), HttpError> {
        let flavor = self.flavor();
        self.content = match (flavor, body) {
            (Flavor::Text, Body::Text(text)) => Content::Text(vec![text]),
            (Flavor::Json, Body::Json(value)) => Content::Json(value),
            (Flavor::Json, Body::Text(text)) => Content::Json(serde_json::Value::String(text)),
            (Flavor::Bytes, Body::Bytes(bytes)) => Content::Bytes(bytes),
            (Flavor::Bytes, Body::Text(text)) => Content::Bytes(text.into_bytes()),
            (Flavor::Stream, Body::Stream(chunks)) => Content::Stream(Some(chunks)),
            (Flavor::Stream, Body::Bytes(bytes)) => Content::Stream(Some(Box::new(std::iter::once(bytes)))),
            (Flavor::Stream, Body::Text(text)) => {
                Content::Stream(Some(Box::new(std::iter::once(text.into_bytes()))))
            }
            (flavor, body) => {
                return Err(HttpError::new(500)
                    .with_short("Unsupported response content")
                    .with_desc(format!(
                        "A {flavor:?} response cannot hold {} content returned by its handler.",
                        body.describe()
                    )));
            }
        };
        Ok(())
    }

    /// Append text to a text, byte or raw response.
    pub fn write(&mut self, text: &str) -> Result<(), HttpError> {
        match &mut self.content {
            Content::Text(parts) => parts.push(text.to_string()),
            Content::Raw(bytes) | Content::Bytes(bytes) => bytes.extend_from_slice(text.as_bytes()),
            Content::Json(_) | Content::Stream(_) => return Err(self.unwritable()),
        }
        Ok(())
    }

    /// Append bytes to a byte or raw response.
    pub fn write_bytes(&mut self, chunk: &[u8]) -> Result<(), HttpError> {
        match &mut self.content {
            Content::Raw(bytes) | Content::Bytes(bytes) => bytes.extend_from_slice(chunk),
            Content::Text(_) | Content::Json(_) | Content::Stream(_) => return Err(self.unwritable()),
        }
        Ok(())
    }

    fn unwritable(&self) -> HttpError {
        HttpError::new(500)
            .with_short("Unsupported response write")
            .with_desc(format!("A {:?} response does not accept incremental writes.", self.flavor()))
    }

    /// Freeze the response: produce the body and apply default headers.
    ///
    /// Idempotent. The content hook runs once; default headers are only ever
    /// set where absent, so explicit headers always win.
    pub fn finalize(&mut self, request: &Request) {
        if let State::Open = self.state {
            let body = self.produce_body();
            let body = if request.method() == Method::HEAD {
                Some(WireBody::Full(Vec::new()))
            } else {
                body
            };
            self.state = State::Finalized(body);
        }
        self.apply_default_headers();
    }

    /// Run the flavor's content hook. `None` means "keep the raw writes".
    fn produce_body(&mut self) -> Option<WireBody> {
        match &mut self.content {
            Content::Raw(_) => None,
            Content::Text(parts) => Some(WireBody::Full(parts.concat().into_bytes())),
            Content::Json(value) => match serde_json::to_vec(value) {
                Ok(bytes) => Some(WireBody::Full(bytes)),
                Err(e) => {
                    error!("Failed to serialize JSON response: {e}");
                    Some(WireBody::Full(Vec::new()))
                }
            },
            Content::Bytes(bytes) => Some(WireBody::Full(std::mem::take(bytes))),
            Content::Stream(chunks) => Some(match chunks.take() {
                Some(chunks) => WireBody::Stream(chunks),
                None => WireBody::Full(Vec::new()),
            }),
        }
    }

    fn apply_default_headers(&mut self) {
        if let Some(content_type) = &self.content_type {
            let value = match &self.charset {
                Some(charset) => format!("{content_type};charset={charset}"),
                None => content_type.clone(),
            };
            self.headers.set_default("Content-Type", value);
        }
        if let Some(http_error) = &self.http_error {
            for (name, value) in http_error.all_headers().iter() {
                self.headers.set_default(name, value);
            }
        }
    }

    /// Finalize if needed and convert into the transport's representation.
    pub fn into_wire(mut self, request: &Request) -> WireResponse {
        self.finalize(request);
        let body = match std::mem::replace(&mut self.state, State::Finalized(None)) {
            State::Finalized(Some(body)) => body,
            State::Finalized(None) | State::Open => match &mut self.content {
                Content::Raw(bytes) => WireBody::Full(std::mem::take(bytes)),
                _ => WireBody::Full(Vec::new()),
            },
        };
        WireResponse {
            status: StatusLine::new(self.code),
            headers: self.headers.into_vec(),
            body,
            diagnostic: self.http_error.as_ref().and_then(HttpError::diagnostic),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code)
            .field("flavor", &self.flavor())
            .field("content_type", &self.content_type)
            .field("charset", &self.charset)
            .field("headers", &self.headers)
            .field("http_error", &self.http_error)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}
