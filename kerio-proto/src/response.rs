//! Raw HTTP response parsing.
//!
//! The transport reads until the peer closes the connection, so a response
//! is always available as one byte buffer. [`Response::parse`] splits it at
//! the first blank line and de-chunks the body when the headers announce
//! `Transfer-Encoding: chunked`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Header/body separator.
const BOUNDARY: &[u8] = b"\r\n\r\n";

/// `HTTP/<major>.<minor> <code> <reason>`.
#[allow(clippy::expect_used)]
static STATUS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HTTP/\d+\.\d+ (\d+) (.+)").expect("valid regex"));

/// `Set-Cookie: <name>=<value>`, word characters only.
#[allow(clippy::expect_used)]
static SET_COOKIE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Set-Cookie:\s(\w*)=(\w*)").expect("valid regex"));

/// Parsed status line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Status {
    /// Numeric status code.
    pub code: u16,
    /// Reason phrase.
    pub reason: String,
}

/// A complete HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Header block including the status line, without the final blank line.
    head: String,
    /// Body, already de-chunked.
    body: Vec<u8>,
}

impl Response {
    /// Splits a raw response into header block and body.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let split = raw
            .windows(BOUNDARY.len())
            .position(|w| w == BOUNDARY)
            .ok_or(Error::MissingBoundary)?;

        let head = String::from_utf8_lossy(&raw[..split]).into_owned();
        let body = &raw[split + BOUNDARY.len()..];

        let body = if head
            .to_ascii_lowercase()
            .contains("transfer-encoding: chunked")
        {
            unchunk(body)?
        } else {
            body.to_vec()
        };

        Ok(Self { head, body })
    }

    /// Returns the raw header block, status line first.
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Returns header fields in order; the status line is the first entry
    /// with an empty value.
    pub fn headers(&self) -> Vec<(&str, &str)> {
        self.head
            .lines()
            .map(|line| match line.split_once(':') {
                Some((name, value)) if !line.starts_with("HTTP/") => (name.trim(), value.trim()),
                _ => (line.trim_end(), ""),
            })
            .collect()
    }

    /// Returns the body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the response, returning its body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Locates and parses the status line.
    pub fn status(&self) -> Result<Status> {
        let caps = STATUS_LINE.captures(&self.head).ok_or(Error::StatusLine)?;
        let code = caps[1].parse().map_err(|_| Error::StatusLine)?;
        Ok(Status {
            code,
            reason: caps[2].trim_end().to_owned(),
        })
    }

    /// Fails unless the status code equals `expected`.
    ///
    /// `remote` names the endpoint in the error message.
    pub fn expect_status(&self, expected: u16, remote: &str) -> Result<()> {
        let status = self.status()?;
        if status.code == expected {
            Ok(())
        } else {
            Err(Error::HttpStatus {
                code: status.code,
                reason: status.reason,
                remote: remote.to_owned(),
            })
        }
    }

    /// Returns every `name=value` pair announced by `Set-Cookie` lines,
    /// in header order. Cookie attributes are ignored.
    pub fn set_cookies(&self) -> Vec<(String, String)> {
        self.head
            .lines()
            .flat_map(|line| SET_COOKIE.captures_iter(line))
            .map(|c| (c[1].to_owned(), c[2].to_owned()))
            .collect()
    }
}

/// Decodes a `Transfer-Encoding: chunked` body.
///
/// Stops at the zero-length chunk or when the input runs out. Chunk
/// extensions after `;` are ignored.
pub fn unchunk(mut input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());

    while !input.is_empty() {
        let (size_line, rest) = match input.windows(2).position(|w| w == b"\r\n") {
            Some(pos) => (&input[..pos], &input[pos + 2..]),
            None => (input, &[][..]),
        };

        let text = std::str::from_utf8(size_line)
            .map_err(|_| Error::Chunk("chunk size is not ASCII".into()))?;
        let text = text.split(';').next().unwrap_or_default().trim();
        if text.is_empty() && rest.is_empty() {
            break;
        }
        let len = usize::from_str_radix(text, 16)
            .map_err(|_| Error::Chunk(format!("invalid chunk size {text:?}")))?;
        if len == 0 {
            break;
        }

        let take = len.min(rest.len());
        out.extend_from_slice(&rest[..take]);
        input = rest.get(take + 2..).unwrap_or_default();
    }

    Ok(out)
}
