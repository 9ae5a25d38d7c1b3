use delvelink_protocol::{MonsterSpawn, PlayerSnapshot};

use crate::status::StatusEffects;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// One player's battle-relevant stats.
///
/// Built from a [`PlayerSnapshot`] when the battle starts; the roster
/// snapshot stays the source of truth outside battle.
#[derive(Debug, Clone)]
pub struct PlayerCombatant {
    pub nickname: String,
    pub is_host: bool,
    pub hp: i32,
    pub max_hp: i32,
    pub atk: i32,
    pub def: i32,
    pub dex: i32,
    /// Set by a Guard action, cleared at the next round boundary.
    pub guarding: bool,
}

impl PlayerCombatant {
    pub fn from_snapshot(snap: &PlayerSnapshot, atk: i32) -> Self {
        Self {
            nickname: snap.nickname.clone(),
            is_host: snap.is_host,
            hp: snap.hp,
            max_hp: snap.max_hp,
            atk,
            def: snap.def,
            dex: snap.dex,
            guarding: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Applies damage, clamping at zero. Returns the amount actually lost.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let lost = amount.min(self.hp).max(0);
        self.hp -= lost;
        lost
    }
}

// ---------------------------------------------------------------------------
// Monster
// ---------------------------------------------------------------------------

/// The single monster both peers are fighting.
///
/// Status effects live on the monster: player skills apply them and the
/// host resolves them at the start of each monster turn.
#[derive(Debug, Clone)]
pub struct BattleMonster {
    pub hp: i32,
    pub max_hp: i32,
    pub atk: i32,
    pub def: i32,
    pub exp_reward: u32,
    pub from_trap: bool,
    pub effects: StatusEffects,
}

impl BattleMonster {
    pub fn from_spawn(spawn: &MonsterSpawn) -> Self {
        Self {
            hp: spawn.hp,
            max_hp: spawn.max_hp,
            atk: spawn.atk,
            def: spawn.def,
            exp_reward: spawn.exp_reward,
            from_trap: spawn.from_trap,
            effects: StatusEffects::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let lost = amount.min(self.hp).max(0);
        self.hp -= lost;
        lost
    }

    /// Effective attack after any attack-down debuff.
    pub fn effective_atk(&self) -> i32 {
        if self.effects.atk_down_turns > 0 {
            (self.atk * 7 / 10).max(1)
        } else {
            self.atk
        }
    }
}

#[cfg(test)]
mod tests {
    use delvelink_protocol::{MonsterId, PlayerClass};

    use super::*;

    fn snapshot() -> PlayerSnapshot {
        PlayerSnapshot {
            id: 1,
            nickname: "ash".into(),
            class: PlayerClass::Warrior,
            hp: 40,
            max_hp: 40,
            def: 5,
            dex: 12,
            is_host: true,
        }
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut p = PlayerCombatant::from_snapshot(&snapshot(), 10);
        assert_eq!(p.take_damage(55), 40);
        assert_eq!(p.hp, 0);
        assert!(!p.is_alive());
        assert_eq!(p.take_damage(5), 0);
    }

    #[test]
    fn test_atk_debuff_reduces_monster_attack() {
        let spawn = MonsterSpawn {
            monster_id: MonsterId(3),
            from_trap: false,
            x: 0,
            y: 0,
            hp: 30,
            max_hp: 30,
            atk: 10,
            def: 2,
            exp_reward: 15,
        };
        let mut m = BattleMonster::from_spawn(&spawn);
        assert_eq!(m.effective_atk(), 10);
        m.effects.atk_down_turns = 2;
        assert_eq!(m.effective_atk(), 7);
    }
}
