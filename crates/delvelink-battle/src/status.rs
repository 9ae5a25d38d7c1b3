//! Status effects on the battle monster and the fixed order in which the
//! monster turn resolves them.

/// Effects a player skill can leave on the monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEffectKind {
    StrongPoison,
    Poison,
    Bleed,
    Stun,
    AtkDown,
}

impl StatusEffectKind {
    /// Maps a skill tag from a `BattleAction` to the effect it applies.
    ///
    /// Skills that deal plain damage carry tags not listed here and map
    /// to `None`. The acting peer applies the effect locally and the tag
    /// lets the other side mirror it without a second negotiation.
    pub fn from_skill(skill: &str) -> Option<Self> {
        match skill {
            "strong_poison" => Some(Self::StrongPoison),
            "poison" => Some(Self::Poison),
            "bleed" => Some(Self::Bleed),
            "stun" => Some(Self::Stun),
            "atk_down" => Some(Self::AtkDown),
            _ => None,
        }
    }

    /// How many monster turns a fresh application lasts.
    pub fn default_turns(self) -> u8 {
        match self {
            Self::StrongPoison => 3,
            Self::Poison => 4,
            Self::Bleed => 3,
            Self::Stun => 1,
            Self::AtkDown => 2,
        }
    }
}

/// Remaining-turn counters for every effect.
///
/// Re-applying an effect refreshes its counter rather than stacking.
/// Both peers keep identical counters: the driving side decrements while
/// resolving the chain, the other side decrements on the mirrored
/// `EnemyAction` tick messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusEffects {
    pub strong_poison_turns: u8,
    pub poison_turns: u8,
    pub bleed_turns: u8,
    pub stun_turns: u8,
    pub atk_down_turns: u8,
}

impl StatusEffects {
    pub fn apply(&mut self, kind: StatusEffectKind) {
        let turns = kind.default_turns();
        match kind {
            StatusEffectKind::StrongPoison => self.strong_poison_turns = turns,
            StatusEffectKind::Poison => self.poison_turns = turns,
            StatusEffectKind::Bleed => self.bleed_turns = turns,
            StatusEffectKind::Stun => self.stun_turns = turns,
            StatusEffectKind::AtkDown => self.atk_down_turns = turns,
        }
    }
}

/// Per-tick damage. Deterministic fractions of max HP so both peers agree
/// without exchanging the numbers (the driving side still echoes them in
/// the tick messages, which is what the receiver applies).
pub fn strong_poison_damage(max_hp: i32) -> i32 {
    (max_hp / 8).max(1)
}

pub fn poison_damage(max_hp: i32) -> i32 {
    (max_hp / 16).max(1)
}

pub fn bleed_damage(max_hp: i32) -> i32 {
    (max_hp / 10).max(1)
}

/// One resolved step of the monster turn. The chain always runs in this
/// order, skipping steps whose counter is zero; `StunCheck` ends the turn
/// early when the monster is stunned, otherwise the chain ends with
/// `Attack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    StrongPoison,
    Poison,
    Bleed,
    StunCheck,
    Attack,
}

impl ChainStep {
    /// The next step with something to do, given the current counters.
    ///
    /// `after` is `None` when the turn is just starting. The attack-down
    /// counter has no step of its own; it decays silently right before
    /// the stun check.
    pub fn next(after: Option<ChainStep>, effects: &StatusEffects) -> ChainStep {
        let from = match after {
            None => 0,
            Some(ChainStep::StrongPoison) => 1,
            Some(ChainStep::Poison) => 2,
            Some(ChainStep::Bleed) => 3,
            Some(ChainStep::StunCheck) | Some(ChainStep::Attack) => 4,
        };
        if from < 1 && effects.strong_poison_turns > 0 {
            return ChainStep::StrongPoison;
        }
        if from < 2 && effects.poison_turns > 0 {
            return ChainStep::Poison;
        }
        if from < 3 && effects.bleed_turns > 0 {
            return ChainStep::Bleed;
        }
        if from < 4 && effects.stun_turns > 0 {
            return ChainStep::StunCheck;
        }
        ChainStep::Attack
    }
}
