//! Per-product behavior plugged into the client.
//!
//! Products share the protocol engine and differ only in default endpoint,
//! what happens around login/logout, and how uploads are framed. Each of
//! those is a hook on [`Profile`].

use std::fmt;

use kerio_proto::{Request, multipart};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::{Application, JsonRpc};

/// Characters escaped in query values: everything but RFC 3986 unreserved.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A file to upload.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct Upload<'a> {
    /// Base name of the file.
    pub name: &'a str,
    /// Item the file is attached to, when the product needs one.
    pub parent: Option<u64>,
    /// File contents.
    pub data: &'a [u8],
}

impl<'a> Upload<'a> {
    /// Describes an upload.
    pub const fn new(name: &'a str, parent: Option<u64>, data: &'a [u8]) -> Self {
        Self { name, parent, data }
    }
}

/// Product-specific hooks.
pub trait Profile: fmt::Debug + Send {
    /// Endpoint settings used until reconfigured.
    fn json_rpc(&self) -> JsonRpc;

    /// Value of `application` in the `Session.login` params.
    fn login_application(&self, application: &Application) -> Value {
        json!({
            "name": application.name,
            "vendor": application.vendor,
            "version": application.version,
        })
    }

    /// Runs after a successful login with the login `result`.
    fn after_login(&mut self, _result: &Value, _json_rpc: &mut JsonRpc) {}

    /// Runs after logout, whether or not the logout call succeeded.
    fn after_logout(&mut self, _json_rpc: &mut JsonRpc) {}

    /// Builds the verb-specific part of an upload request.
    fn upload_request(&self, json_rpc: &JsonRpc, upload: &Upload<'_>) -> Request {
        Request::multipart_upload(&json_rpc.path, upload.data, &multipart::boundary())
    }
}

/// Kerio Control firewall administration API.
#[derive(Debug, Clone, Copy, Default)]
pub struct Control;

impl Control {
    /// Default JSON-RPC port.
    pub const PORT: u16 = 4081;
    /// Default JSON-RPC path.
    pub const PATH: &'static str = "/admin/api/jsonrpc/";
}

impl Profile for Control {
    fn json_rpc(&self) -> JsonRpc {
        JsonRpc::new("2.0", Self::PORT, Self::PATH)
    }
}

/// Samepage collaboration platform API.
///
/// Logging in scopes the RPC path to the user's tenant.
#[derive(Debug, Clone, Default)]
pub struct Samepage {
    /// Tenant id returned by the last login.
    tenant: Option<String>,
}

impl Samepage {
    /// Default JSON-RPC port.
    pub const PORT: u16 = 443;
    /// RPC path before login and after logout.
    pub const PATH: &'static str = "/server/data";

    /// Creates the profile with no tenant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tenant id of the current login.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

impl Profile for Samepage {
    fn json_rpc(&self) -> JsonRpc {
        JsonRpc::new("2.0", Self::PORT, Self::PATH)
    }

    fn login_application(&self, _application: &Application) -> Value {
        Value::from("CLIENT")
    }

    fn after_login(&mut self, result: &Value, json_rpc: &mut JsonRpc) {
        let Some(tenant) = result
            .get("tenant")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        else {
            return;
        };
        debug!("Setting tenant {tenant}.");
        json_rpc.path = format!("/{tenant}{}", Self::PATH);
        self.tenant = Some(tenant.to_owned());
    }

    fn after_logout(&mut self, json_rpc: &mut JsonRpc) {
        self.tenant = None;
        Self::PATH.clone_into(&mut json_rpc.path);
    }

    fn upload_request(&self, json_rpc: &JsonRpc, upload: &Upload<'_>) -> Request {
        let filename = utf8_percent_encode(upload.name, QUERY_VALUE);
        let line = format!(
            "POST {}?method=Files.create&filename={filename}&parentId={}&lenght={} HTTP/1.1",
            json_rpc.path,
            upload.parent.unwrap_or_default(),
            upload.data.len(),
        );
        Request::new(line, upload.data.to_vec())
            .header("Accept", "*/*")
            .header("Content-Type", "application/k-upload")
    }
}

/// Any other product, addressed through explicit endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generic {
    /// Endpoint settings.
    json_rpc: JsonRpc,
}

impl Generic {
    /// Creates a profile for the given endpoint.
    pub const fn new(json_rpc: JsonRpc) -> Self {
        Self { json_rpc }
    }
}

impl Profile for Generic {
    fn json_rpc(&self) -> JsonRpc {
        self.json_rpc.clone()
    }
}
