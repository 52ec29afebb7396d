//! Application configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app::error::Error;
use crate::app::response::Flavor;

/// Application configuration.
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Include backtraces in the built-in error page.
    pub expose_traces: bool,
    /// Write backtraces of caught faults to the log.
    pub log_traces: bool,
    /// Flavor of routes and error handlers registered without one.
    pub default_flavor: Flavor,
    /// Value of the `Server` header, unless a handler sets its own.
    pub server_header: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            expose_traces: false,
            log_traces: false,
            default_flavor: Flavor::Text,
            server_header: Some(concat!("tinydispatch/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
