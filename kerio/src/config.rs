//! Static configuration consumed by the client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity announced to the server at login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Application {
    /// Application name.
    pub name: String,
    /// Vendor name.
    pub vendor: String,
    /// Application version.
    pub version: String,
}

impl Application {
    /// Creates an application identity.
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            version: version.into(),
        }
    }

    /// Fails when name, vendor and version are all empty.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() && self.vendor.is_empty() && self.version.is_empty() {
            return Err(Error::Config("Application not defined.".into()));
        }
        Ok(())
    }
}

/// JSON-RPC endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct JsonRpc {
    /// Protocol version sent in every envelope.
    pub version: String,
    /// TCP port.
    pub port: u16,
    /// Request path, e.g. `/admin/api/jsonrpc/`.
    pub path: String,
}

impl JsonRpc {
    /// Creates endpoint settings.
    pub fn new(version: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            port,
            path: path.into(),
        }
    }

    /// Fails when all three settings are empty, or the port is zero.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.version.is_empty() && self.port == 0 && self.path.is_empty() {
            return Err(Error::Config("JSON-RPC not defined.".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("JSON-RPC port must be positive.".into()));
        }
        Ok(())
    }
}

impl fmt::Display for JsonRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC {} on {} using port {}", self.version, self.path, self.port)
    }
}

/// Splits `host[:port]`; a present port must be a positive integer.
pub(crate) fn split_host(input: &str) -> Result<(&str, Option<u16>)> {
    let mut parts = input.split(':');
    let host = parts.next().unwrap_or_default();
    let port = match parts.next() {
        None => None,
        Some(p) => match p.parse::<u16>() {
            Ok(n) if n > 0 => Some(n),
            _ => return Err(Error::Config(format!("invalid port in hostname {input:?}"))),
        },
    };
    Ok((host, port))
}
