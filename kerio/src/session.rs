//! Session artifacts replayed across calls.

use kerio_proto::{Replay, Reply, Response};
use tracing::debug;

/// CSRF token and cookie string for one login cycle.
///
/// The token is set once per cycle and never overwritten until
/// [`reset`](Self::reset). Cookies accumulate as `" name=value;"` pairs
/// and are never deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// X-Token issued by the server at login.
    token: Option<String>,
    /// Accumulated cookie string.
    cookies: String,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session token, if set.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the accumulated cookie string.
    pub fn cookies(&self) -> &str {
        &self.cookies
    }

    /// Updates the session from one response.
    ///
    /// The token is taken from `result.token` only while no token is held;
    /// cookies are collected only while the jar is empty.
    pub fn observe(&mut self, response: &Response, reply: Option<&Reply>) {
        if self.token.is_none() {
            if let Some(token) = reply.and_then(Reply::token) {
                debug!("Setting X-Token {token}.");
                self.token = Some(token.to_owned());
            }
        }
        if self.cookies.is_empty() {
            self.absorb_cookies(response);
        }
    }

    /// Appends every `Set-Cookie` pair of `response` to the cookie string.
    pub fn absorb_cookies(&mut self, response: &Response) {
        for (name, value) in response.set_cookies() {
            debug!("Setting {name}={value}.");
            self.cookies.push_str(&format!(" {name}={value};"));
        }
    }

    /// Clears token and cookies.
    pub fn reset(&mut self) {
        if self.token.take().is_some() {
            debug!("Removing X-Token.");
        }
        if !self.cookies.is_empty() {
            debug!("Removing Cookies.");
            self.cookies.clear();
        }
    }

    /// Returns what to replay into the next request.
    pub(crate) fn replay(&self) -> Option<Replay<'_>> {
        self.token().map(|token| Replay::new(&self.cookies, token))
    }
}
