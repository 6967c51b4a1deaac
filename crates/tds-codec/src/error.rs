//! Token stream error types.

use std::io;

use tds_protocol::ProtocolError;
use thiserror::Error;

/// Errors yielded by a [`TokenStream`](crate::TokenStream).
///
/// Every variant ends the stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The server sent malformed token data.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Reading from the byte source failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The stream was cancelled before the next token.
    #[error("token stream cancelled")]
    Cancelled,
}

impl CodecError {
    /// Whether the stream ended because it was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the byte source ended in the middle of a token.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::UnexpectedEof { .. }))
    }
}
