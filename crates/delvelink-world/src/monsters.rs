//! Monster positions on the dungeon map.
//!
//! The host is authoritative for monster movement and ships bulk position
//! refreshes; the guest applies them. Deaths outside battle bookkeeping
//! arrive as coordinates and are matched best-effort.

use std::collections::HashMap;

use delvelink_protocol::{Message, MonsterId, MonsterPos};

#[derive(Debug, Clone, Copy)]
struct MapMonster {
    x: i32,
    y: i32,
    alive: bool,
}

/// The living (and recently dead) monsters of the current stage.
#[derive(Debug, Default)]
pub struct MonsterBook {
    monsters: HashMap<MonsterId, MapMonster>,
}

impl MonsterBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the stage's monsters after map generation.
    pub fn reset_stage(
        &mut self,
        spawns: impl IntoIterator<Item = MonsterPos>,
    ) {
        self.monsters = spawns
            .into_iter()
            .map(|m| (m.id, MapMonster { x: m.x, y: m.y, alive: true }))
            .collect();
    }

    /// Moves a monster locally (host AI step). Unknown or dead monsters
    /// are ignored.
    pub fn set_position(&mut self, id: MonsterId, x: i32, y: i32) {
        if let Some(m) = self.monsters.get_mut(&id) {
            if m.alive {
                m.x = x;
                m.y = y;
            }
        }
    }

    /// Builds the bulk position refresh the host broadcasts.
    pub fn position_update(&self) -> Message {
        let mut monsters: Vec<MonsterPos> = self
            .monsters
            .iter()
            .filter(|(_, m)| m.alive)
            .map(|(id, m)| MonsterPos { id: *id, x: m.x, y: m.y })
            .collect();
        // Stable order keeps the wire image deterministic.
        monsters.sort_by_key(|m| m.id.0);
        Message::MonsterUpdate { monsters }
    }

    /// Applies a peer's bulk position refresh. Ids this peer doesn't know
    /// are skipped; they may belong to monsters that died locally first.
    pub fn apply_update(&mut self, monsters: &[MonsterPos]) {
        for pos in monsters {
            match self.monsters.get_mut(&pos.id) {
                Some(m) if m.alive => {
                    m.x = pos.x;
                    m.y = pos.y;
                }
                Some(_) => {}
                None => {
                    tracing::debug!(id = %pos.id, "position for unknown monster skipped");
                }
            }
        }
    }

    /// Kills the monster standing at `(x, y)`, if any. Returns the
    /// message to relay on a local kill, `None` when nothing matched.
    pub fn kill_at(&mut self, x: i32, y: i32) -> Option<Message> {
        let id = self
            .monsters
            .iter()
            .find(|(_, m)| m.alive && m.x == x && m.y == y)
            .map(|(id, _)| *id)?;
        self.monsters.get_mut(&id).expect("just found").alive = false;
        Some(Message::MonsterDead { x, y })
    }

    /// Applies a peer's `MonsterDead`. Coordinate matching is best-effort:
    /// if nothing stands there (the monster moved or died locally
    /// already), the message is dropped.
    pub fn apply_remote_death(&mut self, x: i32, y: i32) {
        let matched = self
            .monsters
            .iter_mut()
            .find(|(_, m)| m.alive && m.x == x && m.y == y);
        match matched {
            Some((_, m)) => m.alive = false,
            None => {
                tracing::debug!(x, y, "death for unmatched monster ignored");
            }
        }
    }

    pub fn is_alive(&self, id: MonsterId) -> bool {
        self.monsters.get(&id).is_some_and(|m| m.alive)
    }

    pub fn living_count(&self) -> usize {
        self.monsters.values().filter(|m| m.alive).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(id: u32, x: i32, y: i32) -> MonsterPos {
        MonsterPos { id: MonsterId(id), x, y }
    }

    #[test]
    fn test_position_update_lists_living_sorted() {
        let mut book = MonsterBook::new();
        book.reset_stage([spawn(2, 9, 2), spawn(1, 4, 4)]);
        book.kill_at(9, 2).unwrap();

        match book.position_update() {
            Message::MonsterUpdate { monsters } => {
                assert_eq!(monsters, vec![spawn(1, 4, 4)]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_apply_update_moves_known_monsters() {
        let mut book = MonsterBook::new();
        book.reset_stage([spawn(1, 0, 0)]);
        book.apply_update(&[spawn(1, 5, 6), spawn(7, 1, 1)]);

        match book.position_update() {
            Message::MonsterUpdate { monsters } => {
                assert_eq!(monsters, vec![spawn(1, 5, 6)]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_kill_at_matches_by_coordinate() {
        let mut book = MonsterBook::new();
        book.reset_stage([spawn(1, 3, 3)]);

        let msg = book.kill_at(3, 3).expect("kill");
        assert_eq!(msg, Message::MonsterDead { x: 3, y: 3 });
        assert!(!book.is_alive(MonsterId(1)));
        assert!(book.kill_at(3, 3).is_none());
    }

    #[test]
    fn test_remote_death_unmatched_is_noop() {
        let mut book = MonsterBook::new();
        book.reset_stage([spawn(1, 3, 3)]);
        // Monster moved locally before the death arrived: no match, no
        // crash, monster stays as-is.
        book.apply_remote_death(8, 8);
        assert!(book.is_alive(MonsterId(1)));
        assert_eq!(book.living_count(), 1);
    }

    #[test]
    fn test_remote_death_matched() {
        let mut book = MonsterBook::new();
        book.reset_stage([spawn(1, 3, 3)]);
        book.apply_remote_death(3, 3);
        assert!(!book.is_alive(MonsterId(1)));
    }
}
