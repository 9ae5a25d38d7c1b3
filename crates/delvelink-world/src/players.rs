//! The party roster: both players' synchronized stat snapshots.
//!
//! Turn order and solo-mode decisions in the battle layer read from here,
//! so snapshots must be exchanged (and re-exchanged after stat changes)
//! before a battle starts.

use delvelink_protocol::{Message, PlayerSnapshot};

/// Local + remote player snapshots and their positions on the map.
#[derive(Debug)]
pub struct PartyRoster {
    local: PlayerSnapshot,
    remote: Option<PlayerSnapshot>,
    remote_pos: Option<(i32, i32)>,
}

impl PartyRoster {
    pub fn new(local: PlayerSnapshot) -> Self {
        Self { local, remote: None, remote_pos: None }
    }

    pub fn local(&self) -> &PlayerSnapshot {
        &self.local
    }

    pub fn remote(&self) -> Option<&PlayerSnapshot> {
        self.remote.as_ref()
    }

    /// Updates the local snapshot and returns the `PlayerInfo` to send.
    pub fn update_local(
        &mut self,
        update: impl FnOnce(&mut PlayerSnapshot),
    ) -> Message {
        update(&mut self.local);
        Message::PlayerInfo { player: self.local.clone() }
    }

    /// Applies a peer's `PlayerInfo`.
    pub fn apply_remote_info(&mut self, player: PlayerSnapshot) {
        self.remote = Some(player);
    }

    /// Applies a peer's `MapMove`.
    pub fn apply_remote_move(&mut self, x: i32, y: i32) {
        if self.remote.is_some() {
            self.remote_pos = Some((x, y));
        } else {
            tracing::debug!(x, y, "move before PlayerInfo ignored");
        }
    }

    pub fn remote_pos(&self) -> Option<(i32, i32)> {
        self.remote_pos
    }

    /// Drops the remote player (disconnect that didn't migrate into a new
    /// session, or lobby leave).
    pub fn clear_remote(&mut self) {
        self.remote = None;
        self.remote_pos = None;
    }

    /// Solo mode: the ally is absent or dead, so battles need only one
    /// action per round and flee is unilateral.
    pub fn is_solo(&self) -> bool {
        match &self.remote {
            Some(remote) => remote.hp <= 0,
            None => true,
        }
    }
}
