//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire data.
///
/// A `Decode` error on the receive path is not fatal to the connection:
/// the transport logs it and skips the offending frame, because one bad
/// frame from a mismatched build is cheaper to lose than the session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    /// Malformed JSON, an unknown message tag, or a payload whose shape
    /// doesn't match its tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates a protocol rule; e.g. an
    /// advertisement claiming more than two player slots.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
