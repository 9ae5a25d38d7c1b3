//! Chest and trap state, including the chest busy-locks.
//!
//! A busy-lock is a network-visible mutual-exclusion flag: a peer that
//! wants to open a chest first claims it (`ChestBusy { busy: true }`),
//! interacts, then releases. Only the peer that set a lock may clear it;
//! the one exception is a disconnect, which force-clears every lock the
//! departed peer held.

use std::collections::HashMap;

use delvelink_protocol::Message;

/// Which peer holds a busy-lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOwner {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChestState {
    open: bool,
    busy_by: Option<LockOwner>,
}

/// All interactable objects on the current stage, keyed by coordinate.
///
/// Coordinates are the shared map grid both peers generated from the same
/// seed, so a coordinate key is stable across the wire.
#[derive(Debug, Default)]
pub struct ObjectBoard {
    chests: HashMap<(i32, i32), ChestState>,
    traps: HashMap<(i32, i32), bool>,
}

impl ObjectBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the stage's objects after map generation. Wipes the
    /// previous stage's state.
    pub fn reset_stage(
        &mut self,
        chest_coords: impl IntoIterator<Item = (i32, i32)>,
        trap_coords: impl IntoIterator<Item = (i32, i32)>,
    ) {
        self.chests = chest_coords
            .into_iter()
            .map(|c| (c, ChestState::default()))
            .collect();
        self.traps = trap_coords.into_iter().map(|c| (c, false)).collect();
    }

    // -- Chests ----------------------------------------------------------

    /// Tries to claim the chest at `(x, y)` for the local player.
    ///
    /// On success the chest is locked locally and the returned `ChestBusy`
    /// claim must be sent to the peer. Fails when the chest is unknown,
    /// already open, or busy (either side).
    pub fn try_claim_chest(
        &mut self,
        x: i32,
        y: i32,
    ) -> Option<Message> {
        let chest = match self.chests.get_mut(&(x, y)) {
            Some(c) => c,
            None => {
                tracing::debug!(x, y, "claim on unknown chest ignored");
                return None;
            }
        };
        if chest.open || chest.busy_by.is_some() {
            return None;
        }
        chest.busy_by = Some(LockOwner::Local);
        Some(Message::ChestBusy { x, y, busy: true })
    }

    /// Finishes the local interaction with a claimed chest: marks it open
    /// and releases the lock. Returns the update + release messages to
    /// send, or `None` if the local player doesn't actually hold the lock.
    pub fn open_claimed_chest(
        &mut self,
        x: i32,
        y: i32,
    ) -> Option<[Message; 2]> {
        let chest = self.chests.get_mut(&(x, y))?;
        if chest.busy_by != Some(LockOwner::Local) {
            tracing::debug!(x, y, "open without holding the lock ignored");
            return None;
        }
        chest.open = true;
        chest.busy_by = None;
        Some([
            Message::ChestUpdate { x, y, open: true },
            Message::ChestBusy { x, y, busy: false },
        ])
    }

    /// Releases a local claim without opening (interaction cancelled).
    pub fn release_chest(&mut self, x: i32, y: i32) -> Option<Message> {
        let chest = self.chests.get_mut(&(x, y))?;
        if chest.busy_by != Some(LockOwner::Local) {
            return None;
        }
        chest.busy_by = None;
        Some(Message::ChestBusy { x, y, busy: false })
    }

    /// Applies a peer's `ChestBusy` message.
    ///
    /// Only the remote peer may clear a remote lock; a stray release for
    /// a lock it doesn't hold is dropped.
    pub fn apply_remote_busy(&mut self, x: i32, y: i32, busy: bool) {
        let Some(chest) = self.chests.get_mut(&(x, y)) else {
            tracing::debug!(x, y, "remote busy for unknown chest ignored");
            return;
        };
        match (busy, chest.busy_by) {
            (true, None) => chest.busy_by = Some(LockOwner::Remote),
            (true, Some(_)) => {
                // Simultaneous claims: the local claim already went out,
                // the remote one loses here and on the other side the
                // local one wins by the same rule applied symmetrically
                // to whoever claimed first in arrival order.
                tracing::debug!(x, y, "remote claim on busy chest ignored");
            }
            (false, Some(LockOwner::Remote)) => chest.busy_by = None,
            (false, _) => {
                tracing::debug!(x, y, "remote release without lock ignored");
            }
        }
    }

    /// Applies a peer's `ChestUpdate`. An open chest stays open.
    pub fn apply_remote_update(&mut self, x: i32, y: i32, open: bool) {
        let Some(chest) = self.chests.get_mut(&(x, y)) else {
            tracing::debug!(x, y, "remote update for unknown chest ignored");
            return;
        };
        chest.open = chest.open || open;
    }

    /// Whether the chest at `(x, y)` is currently busy.
    pub fn is_chest_busy(&self, x: i32, y: i32) -> bool {
        self.chests
            .get(&(x, y))
            .is_some_and(|c| c.busy_by.is_some())
    }

    pub fn is_chest_open(&self, x: i32, y: i32) -> bool {
        self.chests.get(&(x, y)).is_some_and(|c| c.open)
    }

    /// Force-clears every lock the remote peer held. Called from the
    /// disconnect handler so a departed peer can't leave chests wedged.
    pub fn clear_remote_locks(&mut self) {
        let mut cleared = 0usize;
        for chest in self.chests.values_mut() {
            if chest.busy_by == Some(LockOwner::Remote) {
                chest.busy_by = None;
                cleared += 1;
            }
        }
        if cleared > 0 {
            tracing::info!(cleared, "cleared remote chest locks");
        }
    }

    // -- Traps -----------------------------------------------------------

    /// Marks a trap triggered locally. Returns the update to send, or
    /// `None` if the trap is unknown or already triggered.
    pub fn trigger_trap(&mut self, x: i32, y: i32) -> Option<Message> {
        match self.traps.get_mut(&(x, y)) {
            Some(triggered) if !*triggered => {
                *triggered = true;
                Some(Message::TrapUpdate { x, y, triggered: true })
            }
            Some(_) => None,
            None => {
                tracing::debug!(x, y, "trigger on unknown trap ignored");
                None
            }
        }
    }

    /// Applies a peer's `TrapUpdate`.
    pub fn apply_remote_trap(&mut self, x: i32, y: i32, triggered: bool) {
        match self.traps.get_mut(&(x, y)) {
            Some(t) => *t = *t || triggered,
            None => {
                tracing::debug!(x, y, "remote update for unknown trap ignored");
            }
        }
    }

    pub fn is_trap_triggered(&self, x: i32, y: i32) -> bool {
        self.traps.get(&(x, y)).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_chest() -> ObjectBoard {
        let mut board = ObjectBoard::new();
        board.reset_stage([(5, 9)], [(2, 2)]);
        board
    }

    #[test]
    fn test_claim_then_open_produces_update_and_release() {
        let mut board = board_with_chest();

        let claim = board.try_claim_chest(5, 9).expect("claim");
        assert_eq!(claim, Message::ChestBusy { x: 5, y: 9, busy: true });

        let msgs = board.open_claimed_chest(5, 9).expect("open");
        assert_eq!(
            msgs[0],
            Message::ChestUpdate { x: 5, y: 9, open: true }
        );
        assert_eq!(
            msgs[1],
            Message::ChestBusy { x: 5, y: 9, busy: false }
        );
        assert!(board.is_chest_open(5, 9));
        assert!(!board.is_chest_busy(5, 9));
    }

    #[test]
    fn test_remote_lock_blocks_local_claim() {
        let mut board = board_with_chest();
        board.apply_remote_busy(5, 9, true);

        assert!(board.is_chest_busy(5, 9));
        assert!(board.try_claim_chest(5, 9).is_none());

        board.apply_remote_busy(5, 9, false);
        assert!(board.try_claim_chest(5, 9).is_some());
    }

    #[test]
    fn test_local_lock_rejects_remote_claim_and_release() {
        let mut board = board_with_chest();
        board.try_claim_chest(5, 9).expect("claim");

        // Remote claim on our locked chest changes nothing.
        board.apply_remote_busy(5, 9, true);
        // Remote release must not clear a lock it doesn't own.
        board.apply_remote_busy(5, 9, false);
        assert!(board.is_chest_busy(5, 9));

        assert!(board.open_claimed_chest(5, 9).is_some());
    }

    #[test]
    fn test_open_without_lock_is_rejected() {
        let mut board = board_with_chest();
        assert!(board.open_claimed_chest(5, 9).is_none());
    }

    #[test]
    fn test_release_cancels_claim() {
        let mut board = board_with_chest();
        board.try_claim_chest(5, 9).unwrap();
        let release = board.release_chest(5, 9).expect("release");
        assert_eq!(
            release,
            Message::ChestBusy { x: 5, y: 9, busy: false }
        );
        assert!(!board.is_chest_busy(5, 9));
        assert!(!board.is_chest_open(5, 9));
    }

    #[test]
    fn test_disconnect_force_clears_only_remote_locks() {
        let mut board = ObjectBoard::new();
        board.reset_stage([(1, 1), (2, 2)], []);
        board.try_claim_chest(1, 1).unwrap();
        board.apply_remote_busy(2, 2, true);

        board.clear_remote_locks();
        assert!(board.is_chest_busy(1, 1), "local lock must survive");
        assert!(!board.is_chest_busy(2, 2));
    }

    #[test]
    fn test_unknown_coordinates_are_noops() {
        let mut board = board_with_chest();
        assert!(board.try_claim_chest(99, 99).is_none());
        board.apply_remote_busy(99, 99, true);
        board.apply_remote_update(99, 99, true);
        board.apply_remote_trap(99, 99, true);
        assert!(!board.is_chest_open(99, 99));
    }

    #[test]
    fn test_trap_triggers_once() {
        let mut board = board_with_chest();
        assert!(board.trigger_trap(2, 2).is_some());
        assert!(board.trigger_trap(2, 2).is_none());
        assert!(board.is_trap_triggered(2, 2));
    }

    #[test]
    fn test_remote_trap_update_applies() {
        let mut board = board_with_chest();
        board.apply_remote_trap(2, 2, true);
        assert!(board.is_trap_triggered(2, 2));
        // A stray `triggered: false` can't untrigger.
        board.apply_remote_trap(2, 2, false);
        assert!(board.is_trap_triggered(2, 2));
    }
}
