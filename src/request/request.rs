//! Inbound request representation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::app::HttpError;
use crate::request::error::Error;
use crate::request::header_value::{parse_header_value, HeaderValue};
use crate::request::headers::Headers;
use crate::request::method::Method;
use crate::routing::RouteMatch;

/// The parts of a request the transport hands over. Shared by every view.
#[derive(Debug, Clone)]
struct RequestHead {
    method: Method,
    path: String,
    query_string: String,
    headers: Headers,
    body: Vec<u8>,
    transport: HashMap<String, String>,
}

/// An inbound request, already decoded by the transport.
///
/// A `Request` is a cheap view: the transport data sits behind an `Arc`, and
/// [`with_route`](Request::with_route) / [`with_error`](Request::with_error)
/// return new views instead of mutating this one, so handlers sharing a base
/// request never observe each other's changes.
#[derive(Debug, Clone)]
pub struct Request {
    head: Arc<RequestHead>,
    route_match: Option<RouteMatch>,
    http_errors: Vec<HttpError>,
}

impl Request {
    /// Create a new request.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP method
    /// * `target` - The request target; anything after `?` is the query string
    /// * `headers` - The decoded request headers
    pub fn new(method: Method, target: &str, headers: Headers) -> Self {
        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target.to_string(), String::new()),
        };

        Self {
            head: Arc::new(RequestHead {
                method,
                path,
                query_string,
                headers,
                body: Vec::new(),
                transport: HashMap::new(),
            }),
            route_match: None,
            http_errors: Vec::new(),
        }
    }

    /// Create a request from a method name as the transport received it.
    pub fn from_parts(method: &str, target: &str, headers: Headers) -> Result<Self, Error> {
        Ok(Self::new(method.parse()?, target, headers))
    }

    /// Attach the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        Arc::make_mut(&mut self.head).body = body.into();
        self
    }

    /// Attach a raw transport parameter (peer address, server name, ...).
    pub fn with_transport_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.head).transport.insert(name.into(), value.into());
        self
    }

    /// A view of this request bound to a route match.
    pub fn with_route(&self, route_match: RouteMatch) -> Self {
        Self {
            head: Arc::clone(&self.head),
            route_match: Some(route_match),
            http_errors: self.http_errors.clone(),
        }
    }

    /// A view of this request carrying `http_error` as its most recent error.
    pub fn with_error(&self, http_error: HttpError) -> Self {
        let mut http_errors = Vec::with_capacity(self.http_errors.len() + 1);
        http_errors.push(http_error);
        http_errors.extend(self.http_errors.iter().cloned());
        Self {
            head: Arc::clone(&self.head),
            route_match: self.route_match.clone(),
            http_errors,
        }
    }

    pub fn method(&self) -> Method {
        self.head.method
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn query_string(&self) -> &str {
        &self.head.query_string
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.head.headers.contains(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.head.body
    }

    pub fn transport_param(&self, name: &str) -> Option<&str> {
        self.head.transport.get(name).map(String::as_str)
    }

    /// The route this request was dispatched to, if routing succeeded.
    pub fn route_match(&self) -> Option<&RouteMatch> {
        self.route_match.as_ref()
    }

    /// A single named capture from the matched route.
    pub fn route_var(&self, name: &str) -> Option<&str> {
        self.route_match.as_ref()?.captures.get(name).map(String::as_str)
    }

    /// Every named capture from the matched route.
    pub fn route_vars(&self) -> HashMap<String, String> {
        self.route_match
            .as_ref()
            .map(|m| m.captures.clone())
            .unwrap_or_default()
    }

    /// Query parameters, form-urlencoded decoded. A repeated key keeps the last value.
    pub fn query_vars(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.head.query_string.as_bytes())
            .into_owned()
            .collect()
    }

    /// Query parameters overlaid with route captures.
    pub fn vars(&self) -> HashMap<String, String> {
        let mut vars = self.query_vars();
        vars.extend(self.route_vars());
        vars
    }

    /// The parsed `Content-Type` header; empty if the header is absent.
    pub fn content_type(&self) -> HeaderValue {
        parse_header_value(self.header("Content-Type").unwrap_or(""))
    }

    /// Check if the request has a JSON body.
    pub fn is_json(&self) -> bool {
        self.content_type().value.eq_ignore_ascii_case("application/json")
    }

    /// Parse the request body as JSON.
    ///
    /// Fails if the `Content-Type` is not `application/json` or the body is not valid JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }
        Ok(serde_json::from_slice(&self.head.body)?)
    }

    /// The error currently being handled, most recent first.
    pub fn http_error(&self) -> Option<&HttpError> {
        self.http_errors.first()
    }

    /// Every error attached to this view, most recent first.
    pub fn http_errors(&self) -> &[HttpError] {
        &self.http_errors
    }
}
