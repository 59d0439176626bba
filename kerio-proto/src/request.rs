//! HTTP/1.1 request framing.
//!
//! A [`Request`] starts with the verb-specific request line and headers,
//! then [`Request::finish`] appends the common headers and serializes
//! everything to the exact bytes written on the socket:
//!
//! ```text
//! POST /admin/api/jsonrpc/ HTTP/1.1\r\n
//! Accept: application/json-rpc\r\n
//! ...
//! Connection: close\r\n
//! \r\n
//! <body>
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::multipart;

/// Line terminator used throughout the wire format.
pub const CRLF: &str = "\r\n";

/// Port for which the `Host` header carries no explicit port.
const DEFAULT_HTTPS_PORT: u16 = 443;

/// Request kinds understood by the engine.
///
/// `Put` is a file upload; on the wire it is a `POST` to the upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Method {
    /// JSON-RPC call.
    Post,
    /// Raw file fetch.
    Get,
    /// File upload.
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Post => "POST",
            Self::Get => "GET",
            Self::Put => "PUT",
        })
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POST" => Ok(Self::Post),
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            other => Err(Error::UnsupportedMethod(other.to_owned())),
        }
    }
}

/// Session artifacts replayed into an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Replay<'a> {
    /// Accumulated cookie string (`" name=value;"` pairs).
    pub cookies: &'a str,
    /// CSRF token sent as `X-Token`.
    pub token: &'a str,
}

impl<'a> Replay<'a> {
    /// Creates a replay set from a cookie string and a token.
    pub const fn new(cookies: &'a str, token: &'a str) -> Self {
        Self { cookies, token }
    }
}

/// An HTTP request under construction.
///
/// Every request is a fresh value, so headers never leak between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request line without the trailing CRLF.
    line: String,
    /// Headers in insertion order.
    headers: Vec<(String, String)>,
    /// Final body bytes.
    body: Vec<u8>,
}

impl Request {
    /// Creates a request from a raw request line and body.
    pub fn new(line: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            line: line.into(),
            headers: Vec::new(),
            body,
        }
    }

    /// JSON-RPC call to `path`.
    ///
    /// Carriage returns, line feeds and tabs are stripped from the payload
    /// and a single CRLF is appended.
    pub fn rpc(path: &str, payload: &[u8], user_agent: &str) -> Self {
        let mut body: Vec<u8> = payload
            .iter()
            .copied()
            .filter(|b| !matches!(b, b'\r' | b'\n' | b'\t'))
            .collect();
        body.extend_from_slice(CRLF.as_bytes());

        Self::new(format!("POST {path} HTTP/1.1"), body)
            .header("Accept", "application/json-rpc")
            .header("Content-Type", "application/json-rpc; charset=UTF-8")
            .header("User-Agent", user_agent)
    }

    /// Raw fetch of `target`, which becomes the request-line target.
    pub fn fetch(target: &str) -> Self {
        let mut body = target.as_bytes().to_vec();
        body.extend_from_slice(CRLF.as_bytes());

        Self::new(format!("GET {target} HTTP/1.1"), body).header("Accept", "*/*")
    }

    /// Multipart upload of `payload` to `<path>upload/`.
    pub fn multipart_upload(path: &str, payload: &[u8], boundary: &str) -> Self {
        Self::new(
            format!("POST {path}upload/ HTTP/1.1"),
            multipart::frame(boundary, payload),
        )
        .header("Accept", "*/*")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the request line.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Returns the headers added so far.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Appends `Host`, `Content-Length`, `Connection` and, when a session
    /// token is present, `Cookie` and `X-Token`, then serializes the request.
    pub fn finish(mut self, host: &str, port: u16, replay: Option<Replay<'_>>) -> Vec<u8> {
        let host = if port == DEFAULT_HTTPS_PORT {
            host.to_owned()
        } else {
            format!("{host}:{port}")
        };
        let length = self.body.len().to_string();
        self = self
            .header("Host", host)
            .header("Content-Length", length)
            .header("Connection", "close");

        if let Some(replay) = replay.filter(|r| !r.token.is_empty()) {
            self = self
                .header("Cookie", replay.cookies)
                .header("X-Token", replay.token);
        }

        let mut out = String::with_capacity(256);
        out.push_str(&self.line);
        out.push_str(CRLF);
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(CRLF);
        }
        out.push_str(CRLF);

        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
