//! HTTP request methods.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::request::error::Error;

/// HTTP request methods as defined in RFC 9110, plus extension methods.
///
/// The declaration order is the sort order, which is the order methods are
/// listed in an `Allow` header. Extension methods sort after the standard ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    /// GET method: Requests a representation of the specified resource.
    GET,
    /// POST method: Submits data to be processed to the identified resource.
    POST,
    /// PUT method: Replaces all current representations of the target resource with the request payload.
    PUT,
    /// DELETE method: Deletes the specified resource.
    DELETE,
    /// HEAD method: Same as GET but only transfers the status line and header section.
    HEAD,
    /// OPTIONS method: Describes the communication options for the target resource.
    OPTIONS,
    /// PATCH method: Applies partial modifications to a resource.
    PATCH,
    /// CONNECT method: Establishes a tunnel to the server identified by the target resource.
    CONNECT,
    /// TRACE method: Performs a message loop-back test along the path to the target resource.
    TRACE,
    /// Any other method token, such as WebDAV's `PROPFIND`.
    Extension(ExtensionMethod),
}

impl Method {
    /// Returns the wire representation (e.g. `"GET"`).
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::CONNECT => "CONNECT",
            Method::TRACE => "TRACE",
            Method::Extension(extension) => extension.as_str(),
        }
    }
}

/// Longest extension method name accepted.
pub const MAX_EXTENSION_LEN: usize = 24;

/// A non-standard method token, stored inline so `Method` stays `Copy`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionMethod {
    len: u8,
    bytes: [u8; MAX_EXTENSION_LEN],
}

impl ExtensionMethod {
    /// Accepts a non-empty RFC 9110 token of at most [`MAX_EXTENSION_LEN`] bytes.
    fn new(token: &str) -> Option<Self> {
        if token.is_empty() || token.len() > MAX_EXTENSION_LEN || !token.bytes().all(is_tchar) {
            return None;
        }
        let mut bytes = [0; MAX_EXTENSION_LEN];
        bytes[..token.len()].copy_from_slice(token.as_bytes());
        Some(Self {
            len: token.len() as u8,
            bytes,
        })
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII token bytes are ever stored.
        std::str::from_utf8(&self.bytes[..usize::from(self.len)]).unwrap_or_default()
    }
}

impl Ord for ExtensionMethod {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ExtensionMethod {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for ExtensionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Parses a method name. Case-sensitive per RFC 9110 §9.1; unknown tokens
/// become [`Method::Extension`].
impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "HEAD" => Ok(Method::HEAD),
            "OPTIONS" => Ok(Method::OPTIONS),
            "PATCH" => Ok(Method::PATCH),
            "CONNECT" => Ok(Method::CONNECT),
            "TRACE" => Ok(Method::TRACE),
            _ => ExtensionMethod::new(s)
                .map(Method::Extension)
                .ok_or_else(|| Error::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}
