//! Error-handler tables and their lookup order.

use std::any::TypeId;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use log::debug;

use crate::app::handler::Handler;
use crate::app::http_error::{ErrorKind, HttpError};
use crate::app::status::StatusCode;

/// Matches a cause of a given Rust type anywhere in an error's causal chain.
#[derive(Clone, Copy)]
pub struct CauseKey {
    type_id: TypeId,
    type_name: &'static str,
    is_type: fn(&(dyn StdError + 'static)) -> bool,
}

impl CauseKey {
    pub fn of<E: StdError + 'static>() -> Self {
        fn is_type<E: StdError + 'static>(error: &(dyn StdError + 'static)) -> bool {
            error.is::<E>()
        }
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            is_type: is_type::<E>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn matches(&self, error: &(dyn StdError + 'static)) -> bool {
        (self.is_type)(error)
    }
}

impl PartialEq for CauseKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for CauseKey {}

impl fmt::Debug for CauseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CauseKey").field(&self.type_name).finish()
    }
}

/// What an error handler is registered for.
#[derive(Debug, Clone, Copy)]
pub enum ErrorKey {
    /// An error kind and every kind derived from it.
    Kind(&'static ErrorKind),
    /// A cause type found in the causal chain.
    Cause(CauseKey),
    /// A status code.
    Status(u16),
    /// Anything nothing else caught.
    Default,
}

impl ErrorKey {
    pub fn cause<E: StdError + 'static>() -> Self {
        ErrorKey::Cause(CauseKey::of::<E>())
    }
}

impl From<u16> for ErrorKey {
    fn from(code: u16) -> Self {
        ErrorKey::Status(code)
    }
}

impl From<StatusCode> for ErrorKey {
    fn from(status: StatusCode) -> Self {
        ErrorKey::Status(status.as_u16())
    }
}

impl From<&'static ErrorKind> for ErrorKey {
    fn from(kind: &'static ErrorKind) -> Self {
        ErrorKey::Kind(kind)
    }
}

/// Which lookup produced a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Kind,
    Cause,
    Status,
    Default,
}

/// Registered error handlers.
#[derive(Debug, Default, Clone)]
pub struct ErrorHandlers {
    by_kind: HashMap<&'static str, Handler>,
    by_cause: Vec<(CauseKey, Handler)>,
    by_status: HashMap<u16, Handler>,
    default: Option<Handler>,
}

impl ErrorHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `key`, replacing any handler already there.
    ///
    /// Cause handlers keep the position of their first registration.
    pub fn insert(&mut self, key: ErrorKey, handler: Handler) {
        match key {
            ErrorKey::Kind(kind) => {
                self.by_kind.insert(kind.name(), handler);
            }
            ErrorKey::Cause(cause) => {
                match self.by_cause.iter_mut().find(|(existing, _)| *existing == cause) {
                    Some(entry) => entry.1 = handler,
                    None => self.by_cause.push((cause, handler)),
                }
            }
            ErrorKey::Status(code) => {
                self.by_status.insert(code, handler);
            }
            ErrorKey::Default => self.default = Some(handler),
        }
    }

    pub fn len(&self) -> usize {
        self.by_kind.len() + self.by_cause.len() + self.by_status.len() + usize::from(self.default.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the handler for `error`. `None` means nothing is registered for it.
    pub fn resolve(&self, error: &HttpError) -> Option<&Handler> {
        self.resolve_with_tier(error).map(|(_, handler)| handler)
    }

    /// Like [`resolve`](Self::resolve), also reporting which lookup hit.
    ///
    /// Order: the error's kind and its ancestors, then each cause in the
    /// chain, then the status code, then the default handler.
    pub fn resolve_with_tier(&self, error: &HttpError) -> Option<(Tier, &Handler)> {
        let found = self
            .by_kind_lookup(error.kind())
            .map(|h| (Tier::Kind, h))
            .or_else(|| self.by_cause_lookup(error).map(|h| (Tier::Cause, h)))
            .or_else(|| self.by_status.get(&error.code()).map(|h| (Tier::Status, h)))
            .or_else(|| self.default.as_ref().map(|h| (Tier::Default, h)));

        match &found {
            Some((tier, _)) => debug!("Resolved handler for {error} via {tier:?}"),
            None => debug!("No handler registered for {error}"),
        }
        found
    }

    fn by_kind_lookup(&self, kind: &ErrorKind) -> Option<&Handler> {
        kind.ancestry().find_map(|kind| self.by_kind.get(kind.name()))
    }

    fn by_cause_lookup(&self, error: &HttpError) -> Option<&Handler> {
        for cause in error.causes() {
            if let Some(inner) = cause.downcast_ref::<HttpError>() {
                if let Some(handler) = self.by_kind.get(inner.kind().name()) {
                    return Some(handler);
                }
            }
            if let Some((_, handler)) = self.by_cause.iter().find(|(key, _)| key.matches(cause)) {
                return Some(handler);
            }
        }
        None
    }
}
