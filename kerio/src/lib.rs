//! Blocking JSON-RPC client for Kerio administration APIs.
//!
//! `kerio` talks to Kerio Control, Samepage and other products that expose
//! the same JSON-RPC surface. Every call opens a fresh TCP (or TLS)
//! connection, sends one hand-framed HTTP/1.1 request and reads until the
//! server closes. The session token and cookies from login are replayed on
//! every later call.
//!
//! # Quick start
//!
//! ```no_run
//! use kerio::{Client, Control};
//! use serde_json::json;
//!
//! let mut api = Client::builder(Control)
//!     .application("Sample application", "Company Ltd.", "1.0")
//!     .build()?;
//!
//! api.login("firewall.company.tld", "admin", "SecretPassword")?;
//! let users = api.send_request("Users.get", json!({"query": {"limit": 10}}))?;
//! println!("{users}");
//! api.logout()?;
//! # Ok::<(), kerio::Error>(())
//! ```
//!
//! Products differ only in endpoint defaults and a few hooks; see
//! [`Profile`].

mod client;
mod config;
mod error;
#[cfg(test)]
mod mock;
mod profile;
mod session;
mod transport;

pub use client::{Client, ClientBuilder};
pub use config::{Application, JsonRpc};
pub use error::{Error, Result, RpcError};
pub use kerio_proto::RpcCode;
pub use profile::{Control, Generic, Profile, Samepage, Upload};
pub use session::Session;
pub use transport::{TcpTransport, Transport};
