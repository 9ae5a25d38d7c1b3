//! Error types for the transport layer.

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening or discovery socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// The outbound connection was refused or otherwise failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The outbound connection did not complete within the timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// An inbound frame declared a length beyond [`crate::MAX_FRAME_LEN`].
    /// Treated as a corrupt stream; the connection is dropped.
    #[error("frame length {0} exceeds maximum")]
    FrameTooLarge(usize),

    /// Encoding an outbound message failed.
    #[error(transparent)]
    Protocol(#[from] delvelink_protocol::ProtocolError),
}
