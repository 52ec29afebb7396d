//! Structured HTTP errors and their causal chains.

use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::app::status::reason_phrase;
use crate::request::{Headers, Method};
use crate::routing::{join_methods, RoutingFailure};

/// A node in the error-kind hierarchy.
///
/// Kinds are identified by name. Error handlers registered for a kind also
/// catch every kind that lists it as an ancestor.
///
/// ```
/// use tinydispatch::{ErrorKind, HTTP_ERROR};
///
/// static QUOTA_EXCEEDED: ErrorKind = ErrorKind::new("QuotaExceeded", &HTTP_ERROR);
/// assert!(QUOTA_EXCEEDED.is(&HTTP_ERROR));
/// ```
#[derive(Debug)]
pub struct ErrorKind {
    name: &'static str,
    parent: Option<&'static ErrorKind>,
}

impl ErrorKind {
    /// A kind with no ancestors.
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// A kind derived from `parent`.
    pub const fn new(name: &'static str, parent: &'static ErrorKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static ErrorKind> {
        self.parent
    }

    /// This kind followed by each ancestor, most specific first.
    pub fn ancestry(&self) -> impl Iterator<Item = &ErrorKind> {
        std::iter::successors(Some(self), |kind| kind.parent)
    }

    /// Whether this kind is `other` or derives from it.
    pub fn is(&self, other: &ErrorKind) -> bool {
        self.ancestry().any(|kind| kind.name == other.name)
    }
}

/// The root of every error kind.
pub static HTTP_ERROR: ErrorKind = ErrorKind::root("HttpError");

/// A request whose method no matching route accepts. Adds an `Allow` header.
pub static METHOD_NOT_ALLOWED: ErrorKind = ErrorKind::new("MethodNotAllowed", &HTTP_ERROR);

/// A redirect raised as an error. Adds a `Location` header.
pub static REDIRECT: ErrorKind = ErrorKind::new("Redirect", &HTTP_ERROR);

/// Kind-specific data that produces default headers.
#[derive(Debug, Clone)]
enum Detail {
    None,
    Allow(BTreeSet<Method>),
    Location(String),
}

/// The error an [`HttpError`] was raised from.
#[derive(Debug, Clone)]
pub struct Cause {
    error: Arc<dyn StdError + Send + Sync + 'static>,
    type_name: &'static str,
}

impl Cause {
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.error
    }

    /// Rust type name of the cause, captured when it was attached.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// What the transport's diagnostic channel receives for an error with a cause.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub type_name: &'static str,
    pub message: String,
    pub trace: Option<Arc<Backtrace>>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)?;
        if let Some(trace) = &self.trace {
            write!(f, "\n{trace}")?;
        }
        Ok(())
    }
}

/// An HTTP-facing fault: a status code, optional metadata and an optional cause.
///
/// Handlers return it as the `Err` side of their result; the pipeline
/// resolves it to an error handler.
#[derive(Debug, Clone)]
pub struct HttpError {
    code: u16,
    short: Option<String>,
    desc: Option<String>,
    headers: Headers,
    kind: &'static ErrorKind,
    detail: Detail,
    cause: Option<Cause>,
    trace: Option<Arc<Backtrace>>,
}

impl HttpError {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            short: None,
            desc: None,
            headers: Headers::new(),
            kind: &HTTP_ERROR,
            detail: Detail::None,
            cause: None,
            trace: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// A 405 whose `Allow` header lists `allow`.
    pub fn method_not_allowed(allow: impl IntoIterator<Item = Method>) -> Self {
        let mut error = Self::new(405).with_kind(&METHOD_NOT_ALLOWED);
        error.detail = Detail::Allow(allow.into_iter().collect());
        error
    }

    /// A 302 whose `Location` header points at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        let mut error = Self::new(302).with_kind(&REDIRECT);
        error.detail = Detail::Location(location.into());
        error
    }

    /// A 500 raised from `cause`.
    pub fn internal(cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::new(500).with_cause(cause)
    }

    /// A 500 raised from a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::internal(PanicError::from_payload(payload))
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Add a header the response should carry. Overrides a kind default of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_kind(mut self, kind: &'static ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Record `cause` as the error this one was raised from, capturing a trace.
    pub fn with_cause<E>(self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.with_shared_cause(Arc::new(cause), std::any::type_name::<E>())
    }

    pub(crate) fn with_shared_cause(
        mut self,
        error: Arc<dyn StdError + Send + Sync + 'static>,
        type_name: &'static str,
    ) -> Self {
        self.cause = Some(Cause { error, type_name });
        self.trace = Some(Arc::new(Backtrace::capture()));
        self
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn short(&self) -> Option<&str> {
        self.short.as_deref()
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Headers set explicitly on this error.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn kind(&self) -> &'static ErrorKind {
        self.kind
    }

    pub fn is_kind(&self, kind: &ErrorKind) -> bool {
        self.kind.is(kind)
    }

    /// Methods listed in the `Allow` header of a 405.
    pub fn allowed_methods(&self) -> Option<&BTreeSet<Method>> {
        match &self.detail {
            Detail::Allow(methods) => Some(methods),
            _ => None,
        }
    }

    /// Target of a redirect.
    pub fn location(&self) -> Option<&str> {
        match &self.detail {
            Detail::Location(location) => Some(location),
            _ => None,
        }
    }

    /// Headers implied by the error kind.
    pub fn default_headers(&self) -> Headers {
        let mut headers = Headers::new();
        match &self.detail {
            Detail::None => {}
            Detail::Allow(methods) => headers.set("Allow", join_methods(methods)),
            Detail::Location(location) => headers.set("Location", location.as_str()),
        }
        headers
    }

    /// Kind defaults overlaid with explicit headers.
    pub fn all_headers(&self) -> Headers {
        let mut headers = self.default_headers();
        for (name, value) in self.headers.iter() {
            headers.set(name, value);
        }
        headers
    }

    pub fn has_cause(&self) -> bool {
        self.cause.is_some()
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// Trace captured when the cause was attached.
    pub fn trace(&self) -> Option<&Backtrace> {
        self.trace.as_deref()
    }

    /// Walk the causal chain: the cause, its source, and so on.
    ///
    /// Stops at the first error already visited, and after [`MAX_CAUSES`]
    /// entries, so cyclic chains terminate.
    pub fn causes(&self) -> Causes<'_> {
        Causes {
            next: self.cause.as_ref().map(|c| &*c.error as &(dyn StdError + 'static)),
            seen: Vec::new(),
        }
    }

    /// The origin of this error for the diagnostic channel, if it has a cause.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        let cause = self.cause.as_ref()?;
        Some(Diagnostic {
            type_name: cause.type_name,
            message: cause.error.to_string(),
            trace: self.trace.clone(),
        })
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}", self.code, reason_phrase(self.code))?;
        if let Some(short) = &self.short {
            write!(f, ": {short}")?;
        }
        Ok(())
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|c| &*c.error as &(dyn StdError + 'static))
    }
}

impl From<RoutingFailure> for HttpError {
    fn from(failure: RoutingFailure) -> Self {
        match failure {
            RoutingFailure::NotFound => HttpError::not_found(),
            RoutingFailure::MethodNotAllowed(allow) => HttpError::method_not_allowed(allow),
        }
    }
}

/// Upper bound on the causes [`Causes`] yields.
pub const MAX_CAUSES: usize = 64;

/// Cycle-safe iterator over a causal chain. See [`HttpError::causes`].
pub struct Causes<'a> {
    next: Option<&'a (dyn StdError + 'static)>,
    seen: Vec<*const (dyn StdError + 'static)>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        // Identity is address plus vtable: a wrapper and the field it stores
        // at offset zero share an address but not a type.
        let identity = current as *const (dyn StdError + 'static);
        if self.seen.len() >= MAX_CAUSES || self.seen.iter().any(|&seen| std::ptr::eq(seen, identity)) {
            return None;
        }
        self.seen.push(identity);
        self.next = current.source();
        Some(current)
    }
}

/// A panic caught at the pipeline boundary.
#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
pub struct PanicError {
    message: String,
}

impl PanicError {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Convert foreign errors into [`HttpError`]s, keeping the original as cause.
///
/// An error that already is an `HttpError` passes through unchanged.
pub trait ResultExt<T> {
    /// Wrap a failure into a 500.
    fn wrap_internal(self) -> Result<T, HttpError>;

    /// Wrap a failure into `template`, e.g. `HttpError::new(422).with_short("bad input")`.
    fn wrap_with(self, template: HttpError) -> Result<T, HttpError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn wrap_internal(self) -> Result<T, HttpError> {
        self.wrap_with(HttpError::new(500))
    }

    fn wrap_with(self, template: HttpError) -> Result<T, HttpError> {
        self.map_err(|err| {
            let boxed: Box<dyn StdError + Send + Sync + 'static> = Box::new(err);
            match boxed.downcast::<HttpError>() {
                Ok(http_error) => *http_error,
                Err(other) => template.with_shared_cause(Arc::from(other), std::any::type_name::<E>()),
            }
        })
    }
}
