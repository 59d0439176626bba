//! JSON-RPC envelopes and server-reported errors.
//!
//! Requests are encoded with `token` and `params` omitted (not `null`)
//! when absent. Replies report failures in one of two shapes, checked in
//! this order:
//!
//! ```text
//! {"error":  {"message": "...", "code": ..., "data": {"messageParameters": {"positionalParameters": [...]}}}}
//! {"result": {"errors": [{"message": "...", "code": ..., "messageParameters": {"positionalParameters": [...]}}]}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Stand-in for absent members.
static NULL: Value = Value::Null;

/// JSON-RPC request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Envelope {
    /// Protocol version, e.g. `"2.0"`.
    pub jsonrpc: String,
    /// Request id, unique per client.
    pub id: u64,
    /// Session token, present only once logged in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// `Interface.method` name.
    pub method: String,
    /// Method parameters, present only when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Envelope {
    /// Creates an envelope without token or params.
    pub fn new(version: impl Into<String>, id: u64, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: version.into(),
            id,
            token: None,
            method: method.into(),
            params: None,
        }
    }

    /// Sets the token; an empty token is left out.
    #[must_use]
    pub fn token(mut self, token: Option<&str>) -> Self {
        self.token = token.filter(|t| !t.is_empty()).map(str::to_owned);
        self
    }

    /// Sets the params; `null`, `{}` and `[]` are left out.
    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.params = (!is_empty(&params)).then_some(params);
        self
    }

    /// Serializes the envelope to JSON bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Returns `true` for values that count as "no content" on the wire.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Number(_) | Value::Bool(true) => false,
    }
}

/// A decoded JSON-RPC reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply(Value);

impl Reply {
    /// Parses a reply body; fails on invalid JSON or an empty document.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| Error::InvalidReply(Some(e)))?;
        if is_empty(&value) {
            return Err(Error::InvalidReply(None));
        }
        Ok(Self(value))
    }

    /// Returns the whole reply document.
    pub const fn value(&self) -> &Value {
        &self.0
    }

    /// Returns `result`, or `null` when absent.
    pub fn result(&self) -> &Value {
        self.0.get("result").unwrap_or(&NULL)
    }

    /// Consumes the reply, returning `result` (or `null`).
    pub fn into_result(self) -> Value {
        match self.0 {
            Value::Object(mut map) => map.remove("result").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Returns a non-empty `result.token`.
    pub fn token(&self) -> Option<&str> {
        self.result()
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    /// Extracts a server-reported failure, if any.
    pub fn fault(&self) -> Option<Fault> {
        if let Some(error) = self.0.get("error").filter(|e| !e.is_null()) {
            if is_empty(error) {
                return None;
            }
            let params = error
                .get("data")
                .and_then(|d| d.get("messageParameters"))
                .map(positional_parameters)
                .unwrap_or_default();
            return Some(Fault::from_value(error, params));
        }

        let first = self
            .result()
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())?;
        let params = first
            .get("messageParameters")
            .map(positional_parameters)
            .unwrap_or_default();
        Some(Fault::from_value(first, params))
    }
}

/// Reads `positionalParameters` from a `messageParameters` object.
fn positional_parameters(message_parameters: &Value) -> Vec<String> {
    message_parameters
        .get("positionalParameters")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Error code reported by the server; either numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum RpcCode {
    /// Numeric code, e.g. `-32001`.
    Int(i64),
    /// Textual code.
    Text(String),
}

impl Default for RpcCode {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Error details as found in a reply, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Fault {
    /// Message template with `%N` placeholders.
    pub message: String,
    /// Error code.
    pub code: RpcCode,
    /// Values for the placeholders.
    pub params: Vec<String>,
}

impl Fault {
    /// Builds a fault from an error object.
    fn from_value(error: &Value, params: Vec<String>) -> Self {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let code = match error.get("code") {
            Some(Value::Number(n)) => n
                .as_i64()
                .map_or_else(|| RpcCode::Text(n.to_string()), RpcCode::Int),
            Some(Value::String(s)) => RpcCode::Text(s.clone()),
            _ => RpcCode::default(),
        };
        Self {
            message,
            code,
            params,
        }
    }
}

/// A JSON-RPC failure reported by the server.
///
/// The message is rendered once, at construction. The raw request and
/// response are kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    /// Rendered message.
    message: String,
    /// Error code.
    code: RpcCode,
    /// Placeholder values.
    params: Vec<String>,
    /// Request payload that triggered the error.
    request: String,
    /// Response body carrying the error.
    response: String,
}

impl RpcError {
    /// Renders `fault` and attaches the exchanged payloads.
    pub fn new(fault: Fault, request: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            message: render(&fault.message, &fault.params),
            code: fault.code,
            params: fault.params,
            request: request.into(),
            response: response.into(),
        }
    }

    /// Returns the rendered message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error code.
    pub const fn code(&self) -> &RpcCode {
        &self.code
    }

    /// Returns the positional parameters.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Returns the request payload.
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Returns the response body.
    pub fn response(&self) -> &str {
        &self.response
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RpcError {}

/// Substitutes `%N` with `params[N]`. Placeholders without a matching
/// parameter are kept as written.
pub fn render(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let param = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|i| params.get(i));

        match param {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[pos..=pos + digits]),
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}
