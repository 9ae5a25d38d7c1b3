//! Battle turn coordination for Delvelink.
//!
//! The most intricate part of the sync core: both peers must reach
//! identical battle outcomes although each computes parts of the state
//! independently. The rules that make that work:
//!
//! - **Authoritative echo.** The acting peer rolls its own outcome
//!   (damage, crit, status application), applies it locally, and sends the
//!   *result*; the receiver applies the given numbers verbatim and never
//!   re-rolls. This is the single most important consistency rule.
//! - **Host-driven monster turns.** Only the host (or the sole living
//!   player in solo mode) runs the monster AI and the status-effect chain;
//!   the other peer consumes `EnemyAction` messages.
//! - **Explicit advancement.** The status chain is a state machine moved
//!   by one `advance` event per resolved step (the renderer reports its
//!   animation finished), not a nested callback chain. Pacing and
//!   watchdog delays are plain deadlines polled by the simulation tick,
//!   so a disconnect cancels them by dropping the coordinator.
//!
//! The coordinator owns no sockets and no clocks: callers pass `Instant`s
//! in and carry the returned [`Message`](delvelink_protocol::Message)s
//! out, which keeps every scenario in this crate testable without a
//! network or a runtime.

mod combatant;
mod coordinator;
mod error;
mod rolls;
mod status;

pub use combatant::{BattleMonster, PlayerCombatant};
pub use coordinator::{
    BattleConfig, BattleCoordinator, BattleEvent, BattleOutcome,
    BattleOutput, BattlePhase,
};
pub use error::BattleError;
pub use status::{StatusEffectKind, StatusEffects};
