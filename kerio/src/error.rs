//! Error types for client operations.

use std::path::PathBuf;

pub use kerio_proto::RpcError;

/// Alias for `Result<T, kerio::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by client operations.
///
/// No variant is retried internally; every call is all-or-nothing.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Required settings are missing or invalid; no I/O was attempted.
    #[error("{0}")]
    Config(String),

    /// A request was attempted before a hostname was set.
    #[error("cannot send data before login")]
    NotLoggedIn,

    /// The socket could not be opened.
    #[error("cannot connect to {host} using port {port}")]
    Connect {
        /// Target hostname.
        host: String,
        /// Target port.
        port: u16,
        /// Underlying resolver or socket error.
        #[source]
        source: std::io::Error,
    },

    /// TLS setup or handshake failed.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The HTTP response was malformed or carried an unexpected status.
    #[error(transparent)]
    Protocol(kerio_proto::Error),

    /// A JSON-RPC call returned a body that is not a JSON-RPC reply.
    #[error("invalid JSON data, cannot parse response")]
    InvalidResponse(#[source] kerio_proto::Error),

    /// The server reported a JSON-RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A local file could not be read or written.
    #[error("{action} {}", .path.display())]
    File {
        /// What was being attempted.
        action: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Socket read or write failed after connecting.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<kerio_proto::Error> for Error {
    fn from(err: kerio_proto::Error) -> Self {
        match err {
            kerio_proto::Error::InvalidReply(_) => Self::InvalidResponse(err),
            other => Self::Protocol(other),
        }
    }
}
