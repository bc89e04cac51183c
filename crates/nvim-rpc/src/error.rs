//! Error types for the msgpack-RPC client.

use thiserror::Error;

/// Errors that can occur while talking to Neovim.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error while connecting or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// An incoming message could not be decoded.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A decoded value did not have the expected shape.
    #[error("invalid result: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer sent something that is not a msgpack-RPC message.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// No response arrived before the deadline.
    #[error("timed out waiting for response to {method}")]
    Timeout {
        /// Method of the request that timed out.
        method: String,
    },

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Disconnected,

    /// The peer answered with an error.
    #[error("{method} failed: {message}")]
    Remote {
        /// Method of the failed request.
        method: String,
        /// Error message reported by the peer.
        message: String,
    },

    /// The address kind is not available on this platform.
    #[error("unsupported address: {0}")]
    Unsupported(String),
}

/// Result type alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
