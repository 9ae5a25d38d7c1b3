//! Error types for the session layer.

/// Errors that can occur in session lifecycle handling.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The requested transition doesn't exist from the current phase,
    /// e.g. starting a search while hosting.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A join step arrived out of order (e.g. a password submitted
    /// before the room info response).
    #[error("join flow out of order: {0}")]
    JoinOutOfOrder(String),

    /// The entered password didn't match the room's.
    #[error("wrong password")]
    WrongPassword,
}
