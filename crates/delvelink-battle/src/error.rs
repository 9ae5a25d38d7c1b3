use thiserror::Error;

/// Errors raised by the battle coordinator.
///
/// These mark caller mistakes (acting out of phase) rather than peer
/// misbehavior; messages from the wire that arrive in an unexpected
/// phase are logged and dropped instead of surfacing here.
#[derive(Debug, Error)]
pub enum BattleError {
    /// A local action was attempted outside the local turn.
    #[error("not your turn (phase: {0})")]
    NotYourTurn(String),

    /// The battle has already concluded.
    #[error("battle already ended")]
    AlreadyEnded,
}
