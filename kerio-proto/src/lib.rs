//! Wire protocol for Kerio administration APIs.
//!
//! Requests are JSON-RPC envelopes carried in hand-framed HTTP/1.1
//! messages over a connection that the server closes after one reply.
//! This crate only builds and parses bytes; it never touches a socket.

pub mod error;
pub mod jsonrpc;
pub mod multipart;
pub mod request;
pub mod response;

pub use error::{Error, Result};
pub use jsonrpc::{Envelope, Fault, Reply, RpcCode, RpcError};
pub use request::{Method, Replay, Request};
pub use response::{Response, Status};
