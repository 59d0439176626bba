//! Error types for wire-level operations.

/// Alias for `Result<T, kerio_proto::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while framing requests or decoding responses.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The response has no blank line between header block and body.
    #[error("malformed HTTP response: missing header/body boundary")]
    MissingBoundary,

    /// No `HTTP/x.y <code> <reason>` line could be found.
    #[error("malformed HTTP response: unparseable status line")]
    StatusLine,

    /// A chunk-size line of a chunked body was not valid hex.
    #[error("malformed chunked body: {0}")]
    Chunk(String),

    /// The server answered with an unexpected HTTP status.
    #[error("{code} - {reason} on remote server {remote}")]
    HttpStatus {
        /// Numeric status code.
        code: u16,
        /// Reason phrase from the status line.
        reason: String,
        /// Fully qualified URL of the JSON-RPC endpoint.
        remote: String,
    },

    /// The verb is not one of `POST`, `GET`, `PUT`.
    #[error("cannot send request, unknown method {0}")]
    UnsupportedMethod(String),

    /// A JSON-RPC body was not valid JSON, or was empty.
    #[error("invalid JSON data, cannot parse response")]
    InvalidReply(#[source] Option<serde_json::Error>),

    /// A request envelope could not be serialized.
    #[error("cannot encode JSON-RPC request")]
    Encode(#[from] serde_json::Error),
}
