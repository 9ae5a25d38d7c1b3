//! Unified error type for the Delvelink sync core.

use delvelink_battle::BattleError;
use delvelink_protocol::ProtocolError;
use delvelink_session::SessionError;
use delvelink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `delvelink` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DelvelinkError {
    /// A transport-level error (bind, connect, send, framing).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad lifecycle transition, wrong password).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A battle-level error (acting out of turn).
    #[error(transparent)]
    Battle(#[from] BattleError),

    /// There is no active battle to act in.
    #[error("no active battle")]
    NoBattle,

    /// The join flow has not reached the connect stage yet.
    #[error("join attempt not ready to connect")]
    JoinNotReady,

    #[error("socket state unavailable")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::FrameTooLarge(1 << 20);
        let top: DelvelinkError = err.into();
        assert!(matches!(top, DelvelinkError::Transport(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::WrongPassword;
        let top: DelvelinkError = err.into();
        assert!(matches!(top, DelvelinkError::Session(_)));
        assert!(top.to_string().contains("password"));
    }

    #[test]
    fn test_from_battle_error() {
        let err = BattleError::AlreadyEnded;
        let top: DelvelinkError = err.into();
        assert!(matches!(top, DelvelinkError::Battle(_)));
    }
}
