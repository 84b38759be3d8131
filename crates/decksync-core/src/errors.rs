//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An inbound frame could not be decoded.
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
    /// An outbound message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}
