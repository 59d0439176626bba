//! Scripted in-memory transport for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::transport::Transport;

/// Replays canned responses in order and records every request.
///
/// Clones share state, so a test keeps one handle while the client owns
/// another.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scripted {
    /// Shared script.
    state: Arc<Mutex<State>>,
    /// Report a plain-TCP exchange.
    plain: bool,
}

/// Script contents.
#[derive(Debug, Default)]
struct State {
    /// Pending responses.
    replies: VecDeque<Vec<u8>>,
    /// Recorded requests.
    sent: Vec<String>,
}

impl Scripted {
    /// Creates an empty script.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates an empty script that reports no TLS.
    pub(crate) fn plain() -> Self {
        Self {
            plain: true,
            ..Self::default()
        }
    }

    /// Queues a raw response.
    pub(crate) fn reply(&self, raw: impl Into<Vec<u8>>) -> &Self {
        self.state.lock().unwrap().replies.push_back(raw.into());
        self
    }

    /// Queues a `200 OK` response carrying `body`.
    pub(crate) fn ok(&self, body: &str) -> &Self {
        self.reply(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json-rpc\r\n\r\n{body}"
        ))
    }

    /// Returns every request sent so far, lossily decoded.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl Transport for Scripted {
    fn round_trip(&mut self, _host: &str, _port: u16, request: &[u8]) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(String::from_utf8_lossy(request).into_owned());
        state
            .replies
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof).into())
    }

    fn is_encrypted(&self) -> bool {
        !self.plain
    }
}
