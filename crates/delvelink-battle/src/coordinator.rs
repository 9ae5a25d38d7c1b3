use std::time::{Duration, Instant};

use delvelink_protocol::{
    EnemyActionKind, Message, MonsterSpawn, PlayerActionKind,
};
use rand::Rng;
use tracing::{debug, warn};

use crate::combatant::{BattleMonster, PlayerCombatant};
use crate::error::BattleError;
use crate::rolls;
use crate::status::{self, ChainStep, StatusEffectKind};

// ---------------------------------------------------------------------------
// Config & outputs
// ---------------------------------------------------------------------------

/// Timing knobs for the coordinator. All deadlines are plain `Instant`
/// comparisons made in [`BattleCoordinator::poll`]; nothing here spawns
/// a timer.
#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// Stall guard: if the round has seen at least one action but the
    /// monster turn has not started after this long, the driving peer
    /// forces it.
    pub watchdog: Duration,
    /// Pacing delay before the monster turn begins resolving, so the
    /// last player action stays readable on screen.
    pub monster_turn_delay: Duration,
    /// Chance per monster attack of using its skill attack instead.
    pub skill_attack_chance: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(3),
            monster_turn_delay: Duration::from_secs(1),
            skill_attack_chance: 0.2,
        }
    }
}

/// How a battle concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOutcome {
    Victory,
    Fled,
    Defeat,
}

/// Where the battle currently stands, from the local peer's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    /// Intro animation playing; no actions accepted yet.
    Intro,
    /// The local player may act.
    MyTurn,
    /// Waiting for the other player's action (or for the watchdog).
    WaitingForPeer,
    /// The monster turn is pending or resolving.
    MonsterTurn,
    Ended(BattleOutcome),
}

/// Something the renderer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    /// The local player's turn began.
    LocalTurn,
    /// Waiting on the other player.
    WaitingForPeer,
    /// The other player acted; numbers are theirs, applied verbatim.
    RemoteAction {
        kind: PlayerActionKind,
        damage: i32,
        crit: bool,
        skill: Option<String>,
    },
    /// One step of the monster turn resolved.
    MonsterStep {
        kind: EnemyActionKind,
        damage: i32,
        target_is_host: bool,
        skill: Option<String>,
    },
    /// A new round began (counters and flee flags reset).
    RoundStarted,
    /// Flee was requested and is now pending the other peer.
    FleeRequested,
    /// Flee already requested; nothing to do.
    FleeAlreadyRequested,
    /// This battle cannot be fled (sprung trap).
    FleeRefused,
    Ended(BattleOutcome),
}

/// What one coordinator call produced: messages to put on the wire and
/// events for the renderer. The coordinator never sends anything itself.
#[derive(Debug, Default)]
pub struct BattleOutput {
    pub messages: Vec<Message>,
    pub events: Vec<BattleEvent>,
}

impl BattleOutput {
    fn event(ev: BattleEvent) -> Self {
        Self { messages: Vec::new(), events: vec![ev] }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Drives one battle on one peer.
///
/// The acting side is authoritative for its own outcomes: it rolls,
/// applies locally, and sends the result. Everything arriving from the
/// wire is applied verbatim. Only the host (or the sole living player)
/// runs the monster turn; the other peer mirrors it from `EnemyAction`
/// messages.
#[derive(Debug)]
pub struct BattleCoordinator {
    config: BattleConfig,
    phase: BattlePhase,
    monster: BattleMonster,
    local: PlayerCombatant,
    remote: Option<PlayerCombatant>,
    /// Turn-order decision, fixed at battle start: does the local player
    /// act before the remote one each round.
    local_first: bool,
    actions_taken: u8,
    flee_local: bool,
    flee_remote: bool,
    /// Last time any battle action landed; feeds the watchdog.
    last_action_at: Instant,
    /// Pacing deadline for the monster turn (driving side only).
    monster_turn_at: Option<Instant>,
    /// Last resolved chain step, while the monster turn is in progress.
    chain_pos: Option<ChainStep>,
    /// The attack-down counter decays once per monster turn.
    atk_decayed_this_turn: bool,
    result_local_done: bool,
    result_remote_done: bool,
}

impl BattleCoordinator {
    /// Starts a battle from a spawn both peers already agree on.
    ///
    /// Turn order is computed here, once, from stats that are already
    /// synchronized: higher DEX first, host first on a tie. Both peers
    /// reach the same answer without exchanging anything.
    pub fn new(
        spawn: &MonsterSpawn,
        local: PlayerCombatant,
        remote: Option<PlayerCombatant>,
        config: BattleConfig,
        now: Instant,
    ) -> Self {
        let local_first = match &remote {
            None => true,
            Some(r) => {
                if local.dex != r.dex {
                    local.dex > r.dex
                } else {
                    local.is_host
                }
            }
        };
        Self {
            config,
            phase: BattlePhase::Intro,
            monster: BattleMonster::from_spawn(spawn),
            local,
            remote,
            local_first,
            actions_taken: 0,
            flee_local: false,
            flee_remote: false,
            last_action_at: now,
            monster_turn_at: None,
            chain_pos: None,
            atk_decayed_this_turn: false,
            result_local_done: false,
            result_remote_done: false,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn monster(&self) -> &BattleMonster {
        &self.monster
    }

    pub fn local(&self) -> &PlayerCombatant {
        &self.local
    }

    pub fn remote(&self) -> Option<&PlayerCombatant> {
        self.remote.as_ref()
    }

    pub fn actions_taken(&self) -> u8 {
        self.actions_taken
    }

    /// Solo mode: the ally is absent or down, so every rule that needs
    /// "the other player" collapses to the local one.
    pub fn is_solo(&self) -> bool {
        match &self.remote {
            None => true,
            Some(r) => !r.is_alive(),
        }
    }

    /// Whether this peer runs the monster turn.
    pub fn drives_monster(&self) -> bool {
        self.local.is_host || self.is_solo()
    }

    /// Actions needed to finish the player half of a round: one per
    /// living participant, never less than one.
    fn required_actions(&self) -> u8 {
        let mut living = 0;
        if self.local.is_alive() {
            living += 1;
        }
        if self.remote.as_ref().is_some_and(|r| r.is_alive()) {
            living += 1;
        }
        living.max(1)
    }

    fn ended(&self) -> bool {
        matches!(self.phase, BattlePhase::Ended(_))
    }

    // -- intro --------------------------------------------------------------

    /// Call when the intro animation finishes; opens the first round.
    pub fn intro_done(&mut self) -> BattleOutput {
        if self.phase != BattlePhase::Intro {
            return BattleOutput::default();
        }
        self.open_player_turns()
    }

    fn open_player_turns(&mut self) -> BattleOutput {
        if self.local.is_alive() && (self.local_first || self.is_solo()) {
            self.phase = BattlePhase::MyTurn;
            BattleOutput::event(BattleEvent::LocalTurn)
        } else {
            self.phase = BattlePhase::WaitingForPeer;
            BattleOutput::event(BattleEvent::WaitingForPeer)
        }
    }

    // -- local actions ------------------------------------------------------

    /// The local player acts. Rolls the outcome, applies it locally, and
    /// returns the messages describing the result for the other peer.
    pub fn local_action(
        &mut self,
        rng: &mut impl Rng,
        kind: PlayerActionKind,
        skill: Option<&str>,
        now: Instant,
    ) -> Result<BattleOutput, BattleError> {
        if self.ended() {
            return Err(BattleError::AlreadyEnded);
        }
        if self.phase != BattlePhase::MyTurn {
            return Err(BattleError::NotYourTurn(format!("{:?}", self.phase)));
        }

        let mut out = BattleOutput::default();
        let (damage, crit) = match kind {
            PlayerActionKind::Attack | PlayerActionKind::Skill => {
                let (dmg, crit) =
                    rolls::roll_player_damage(rng, self.local.atk, self.monster.def);
                self.monster.take_damage(dmg);
                if let Some(effect) =
                    skill.and_then(StatusEffectKind::from_skill)
                {
                    self.monster.effects.apply(effect);
                }
                (dmg, crit)
            }
            PlayerActionKind::Guard => {
                self.local.guarding = true;
                (0, false)
            }
            PlayerActionKind::Item => {
                let heal =
                    (self.local.max_hp * 3 / 10).min(self.local.max_hp - self.local.hp);
                self.local.hp += heal;
                (heal, false)
            }
        };

        out.messages.push(Message::BattleAction {
            kind,
            damage,
            crit,
            skill: skill.map(str::to_owned),
            target_is_host: self.local.is_host,
        });
        out.messages.push(Message::BattleTurnEnd);

        self.actions_taken += 1;
        self.last_action_at = now;
        debug!(?kind, damage, crit, actions = self.actions_taken, "local action");

        if !self.monster.is_alive() {
            self.finish(BattleOutcome::Victory, &mut out);
            return Ok(out);
        }
        self.after_player_action(now, &mut out);
        Ok(out)
    }

    /// The other player acted. Their numbers are applied exactly as
    /// given; this side never re-rolls.
    pub fn apply_remote_action(
        &mut self,
        kind: PlayerActionKind,
        damage: i32,
        crit: bool,
        skill: Option<String>,
        now: Instant,
    ) -> BattleOutput {
        let mut out = BattleOutput::default();
        if self.ended() {
            return out;
        }
        match kind {
            PlayerActionKind::Attack | PlayerActionKind::Skill => {
                self.monster.take_damage(damage);
                if let Some(effect) =
                    skill.as_deref().and_then(StatusEffectKind::from_skill)
                {
                    self.monster.effects.apply(effect);
                }
            }
            PlayerActionKind::Guard => {
                if let Some(r) = self.remote.as_mut() {
                    r.guarding = true;
                }
            }
            PlayerActionKind::Item => {
                if let Some(r) = self.remote.as_mut() {
                    r.hp = (r.hp + damage).min(r.max_hp);
                }
            }
        }
        self.last_action_at = now;
        out.events.push(BattleEvent::RemoteAction { kind, damage, crit, skill });

        if !self.monster.is_alive() {
            self.finish(BattleOutcome::Victory, &mut out);
        }
        out
    }

    /// The other player's explicit turn-end marker.
    pub fn apply_remote_turn_end(&mut self, now: Instant) -> BattleOutput {
        let mut out = BattleOutput::default();
        if self.ended() {
            return out;
        }
        self.actions_taken += 1;
        self.last_action_at = now;
        self.after_player_action(now, &mut out);
        out
    }

    fn after_player_action(&mut self, now: Instant, out: &mut BattleOutput) {
        if self.actions_taken >= self.required_actions() {
            self.phase = BattlePhase::MonsterTurn;
            if self.drives_monster() {
                self.monster_turn_at = Some(now + self.config.monster_turn_delay);
            }
            // the non-driving side just waits for EnemyAction messages
        } else if self.phase == BattlePhase::MyTurn {
            self.phase = BattlePhase::WaitingForPeer;
            out.events.push(BattleEvent::WaitingForPeer);
        } else if self.local.is_alive() {
            self.phase = BattlePhase::MyTurn;
            out.events.push(BattleEvent::LocalTurn);
        }
    }

    // -- monster turn (driving side) ----------------------------------------

    /// Tick hook. Fires the monster-turn pacing deadline and the stall
    /// watchdog; returns `None` when there was nothing to do.
    pub fn poll(&mut self, rng: &mut impl Rng, now: Instant) -> Option<BattleOutput> {
        if self.ended() || !self.drives_monster() {
            return None;
        }
        match self.phase {
            BattlePhase::MonsterTurn => {
                let due = self.monster_turn_at.is_some_and(|at| now >= at);
                if due {
                    self.monster_turn_at = None;
                    self.chain_pos = None;
                    self.atk_decayed_this_turn = false;
                    let mut out = BattleOutput::default();
                    self.resolve_next_step(rng, &mut out);
                    Some(out)
                } else {
                    None
                }
            }
            BattlePhase::WaitingForPeer
                if self.actions_taken >= 1
                    && now.duration_since(self.last_action_at)
                        >= self.config.watchdog =>
            {
                warn!(
                    actions = self.actions_taken,
                    "round stalled, forcing monster turn"
                );
                self.phase = BattlePhase::MonsterTurn;
                self.monster_turn_at = None;
                self.chain_pos = None;
                self.atk_decayed_this_turn = false;
                let mut out = BattleOutput::default();
                self.resolve_next_step(rng, &mut out);
                Some(out)
            }
            _ => None,
        }
    }

    /// The renderer finished animating the last monster-turn step; move
    /// the chain forward, or close the round if the step was terminal.
    pub fn advance_chain(
        &mut self,
        rng: &mut impl Rng,
        now: Instant,
    ) -> BattleOutput {
        let mut out = BattleOutput::default();
        if self.ended()
            || !self.drives_monster()
            || self.phase != BattlePhase::MonsterTurn
        {
            return out;
        }
        match self.chain_pos {
            Some(ChainStep::StunCheck) | Some(ChainStep::Attack) => {
                self.end_round(now, &mut out);
            }
            _ => self.resolve_next_step(rng, &mut out),
        }
        out
    }

    /// Resolves exactly one chain step, in the fixed order: strong
    /// poison, poison, bleed, (attack-down decay), stun check, attack.
    /// The chain aborts into victory the moment monster HP hits zero.
    fn resolve_next_step(&mut self, rng: &mut impl Rng, out: &mut BattleOutput) {
        let step = ChainStep::next(self.chain_pos, &self.monster.effects);
        self.chain_pos = Some(step);

        // the attack-power debuff has no step of its own; it decays
        // right before the stun check
        if matches!(step, ChainStep::StunCheck | ChainStep::Attack)
            && !self.atk_decayed_this_turn
        {
            self.atk_decayed_this_turn = true;
            self.monster.effects.atk_down_turns =
                self.monster.effects.atk_down_turns.saturating_sub(1);
        }

        match step {
            ChainStep::StrongPoison => {
                let dmg = status::strong_poison_damage(self.monster.max_hp);
                self.monster.take_damage(dmg);
                self.monster.effects.strong_poison_turns -= 1;
                self.emit_enemy(EnemyActionKind::StrongPoisonTick, dmg, false, None, out);
                if !self.monster.is_alive() {
                    self.finish(BattleOutcome::Victory, out);
                }
            }
            ChainStep::Poison => {
                let dmg = status::poison_damage(self.monster.max_hp);
                self.monster.take_damage(dmg);
                self.monster.effects.poison_turns -= 1;
                self.emit_enemy(EnemyActionKind::PoisonTick, dmg, false, None, out);
                if !self.monster.is_alive() {
                    self.finish(BattleOutcome::Victory, out);
                }
            }
            ChainStep::Bleed => {
                let dmg = status::bleed_damage(self.monster.max_hp);
                self.monster.take_damage(dmg);
                self.monster.effects.bleed_turns -= 1;
                self.emit_enemy(EnemyActionKind::BleedTick, dmg, false, None, out);
                if !self.monster.is_alive() {
                    self.finish(BattleOutcome::Victory, out);
                }
            }
            ChainStep::StunCheck => {
                // only reached when the monster is stunned
                self.monster.effects.stun_turns -= 1;
                self.emit_enemy(EnemyActionKind::Stunned, 0, false, None, out);
            }
            ChainStep::Attack => {
                self.resolve_monster_attack(rng, out);
            }
        }
    }

    fn resolve_monster_attack(&mut self, rng: &mut impl Rng, out: &mut BattleOutput) {
        // pick a living target; random between the two when both stand
        let target_is_host = {
            let remote_alive =
                self.remote.as_ref().is_some_and(|r| r.is_alive());
            if !remote_alive || !self.local.is_alive() {
                if self.local.is_alive() {
                    self.local.is_host
                } else {
                    !self.local.is_host
                }
            } else if rng.random_bool(0.5) {
                self.local.is_host
            } else {
                !self.local.is_host
            }
        };
        let target = if target_is_host == self.local.is_host {
            &mut self.local
        } else {
            self.remote.as_mut().expect("remote target was checked alive")
        };

        let mut dmg = rolls::roll_monster_damage(
            rng,
            self.monster.effective_atk(),
            target.def,
            target.guarding,
        );
        let (kind, skill) = if rng.random_bool(self.config.skill_attack_chance) {
            dmg = dmg * 3 / 2;
            (EnemyActionKind::SkillAttack, Some("savage_bite".to_owned()))
        } else {
            (EnemyActionKind::Attack, None)
        };
        target.take_damage(dmg);
        self.emit_enemy(kind, dmg, target_is_host, skill, out);

        if self.all_players_down() {
            self.finish(BattleOutcome::Defeat, out);
        }
    }

    fn emit_enemy(
        &self,
        kind: EnemyActionKind,
        damage: i32,
        target_is_host: bool,
        skill: Option<String>,
        out: &mut BattleOutput,
    ) {
        out.messages.push(Message::EnemyAction {
            kind,
            damage,
            target_is_host,
            skill: skill.clone(),
        });
        out.events.push(BattleEvent::MonsterStep {
            kind,
            damage,
            target_is_host,
            skill,
        });
    }

    // -- monster turn (mirroring side) --------------------------------------

    /// Applies one monster-turn step computed by the driving peer. Tick
    /// kinds decrement the same counters the driver decremented, so the
    /// two views of the monster stay identical.
    pub fn apply_remote_enemy_action(
        &mut self,
        kind: EnemyActionKind,
        damage: i32,
        target_is_host: bool,
        skill: Option<String>,
        now: Instant,
    ) -> BattleOutput {
        let mut out = BattleOutput::default();
        if self.ended() {
            return out;
        }
        let terminal = matches!(
            kind,
            EnemyActionKind::Attack
                | EnemyActionKind::SkillAttack
                | EnemyActionKind::Stunned
        );
        match kind {
            EnemyActionKind::StrongPoisonTick => {
                self.monster.take_damage(damage);
                self.monster.effects.strong_poison_turns =
                    self.monster.effects.strong_poison_turns.saturating_sub(1);
            }
            EnemyActionKind::PoisonTick => {
                self.monster.take_damage(damage);
                self.monster.effects.poison_turns =
                    self.monster.effects.poison_turns.saturating_sub(1);
            }
            EnemyActionKind::BleedTick => {
                self.monster.take_damage(damage);
                self.monster.effects.bleed_turns =
                    self.monster.effects.bleed_turns.saturating_sub(1);
            }
            EnemyActionKind::Stunned => {
                self.monster.effects.stun_turns =
                    self.monster.effects.stun_turns.saturating_sub(1);
            }
            EnemyActionKind::Attack | EnemyActionKind::SkillAttack => {
                if target_is_host == self.local.is_host {
                    self.local.take_damage(damage);
                } else if let Some(r) = self.remote.as_mut() {
                    r.take_damage(damage);
                }
            }
        }
        if terminal {
            // mirror the driver's once-per-turn attack-down decay
            self.monster.effects.atk_down_turns =
                self.monster.effects.atk_down_turns.saturating_sub(1);
        }
        out.events.push(BattleEvent::MonsterStep {
            kind,
            damage,
            target_is_host,
            skill,
        });

        if !self.monster.is_alive() {
            self.finish(BattleOutcome::Victory, &mut out);
        } else if self.all_players_down() {
            self.finish(BattleOutcome::Defeat, &mut out);
        } else if terminal {
            self.end_round(now, &mut out);
        }
        out
    }

    // -- rounds & endings ---------------------------------------------------

    fn end_round(&mut self, now: Instant, out: &mut BattleOutput) {
        self.actions_taken = 0;
        self.flee_local = false;
        self.flee_remote = false;
        self.local.guarding = false;
        if let Some(r) = self.remote.as_mut() {
            r.guarding = false;
        }
        self.chain_pos = None;
        self.monster_turn_at = None;
        self.last_action_at = now;
        out.events.push(BattleEvent::RoundStarted);
        let opened = self.open_player_turns();
        out.events.extend(opened.events);
    }

    fn all_players_down(&self) -> bool {
        !self.local.is_alive()
            && !self.remote.as_ref().is_some_and(|r| r.is_alive())
    }

    fn finish(&mut self, outcome: BattleOutcome, out: &mut BattleOutput) {
        self.phase = BattlePhase::Ended(outcome);
        self.monster_turn_at = None;
        out.events.push(BattleEvent::Ended(outcome));
    }

    // -- flee ---------------------------------------------------------------

    /// Local flee request. Immediate in solo mode, refused outright for
    /// inescapable battles, otherwise pending until the other peer asks
    /// too; a repeat request is a visible no-op, not an error.
    pub fn request_flee(&mut self, _now: Instant) -> BattleOutput {
        let mut out = BattleOutput::default();
        if self.ended() {
            return out;
        }
        if self.monster.from_trap {
            out.events.push(BattleEvent::FleeRefused);
            return out;
        }
        if self.is_solo() {
            self.phase = BattlePhase::Ended(BattleOutcome::Fled);
            out.messages.push(Message::BattleEnd);
            out.events.push(BattleEvent::Ended(BattleOutcome::Fled));
            return out;
        }
        if self.flee_local {
            out.events.push(BattleEvent::FleeAlreadyRequested);
            return out;
        }
        self.flee_local = true;
        if self.flee_remote {
            self.phase = BattlePhase::Ended(BattleOutcome::Fled);
            out.messages.push(Message::BattleEnd);
            out.events.push(BattleEvent::Ended(BattleOutcome::Fled));
        } else {
            out.messages.push(Message::FleeRequest);
            out.events.push(BattleEvent::FleeRequested);
        }
        out
    }

    /// The other peer asked to flee. Granted on the spot when we had
    /// already asked ourselves.
    pub fn apply_remote_flee(&mut self) -> BattleOutput {
        let mut out = BattleOutput::default();
        if self.ended() {
            return out;
        }
        self.flee_remote = true;
        if self.flee_local {
            self.phase = BattlePhase::Ended(BattleOutcome::Fled);
            out.messages.push(Message::BattleEnd);
            out.events.push(BattleEvent::Ended(BattleOutcome::Fled));
        }
        out
    }

    /// The ally disconnected mid-battle. The battle keeps going in solo
    /// mode: the remote slot empties, this peer takes over the monster
    /// turn, and a round stuck waiting on the lost peer unblocks.
    pub fn ally_left(&mut self, now: Instant) -> BattleOutput {
        let mut out = BattleOutput::default();
        self.remote = None;
        if self.ended() {
            return out;
        }
        match self.phase {
            BattlePhase::WaitingForPeer if self.local.is_alive() => {
                if self.actions_taken >= self.required_actions() {
                    self.phase = BattlePhase::MonsterTurn;
                    self.monster_turn_at =
                        Some(now + self.config.monster_turn_delay);
                } else {
                    self.phase = BattlePhase::MyTurn;
                    out.events.push(BattleEvent::LocalTurn);
                }
            }
            BattlePhase::MonsterTurn if self.monster_turn_at.is_none() => {
                // we were mirroring the host's monster turn; drive the
                // rest of the round ourselves
                self.monster_turn_at =
                    Some(now + self.config.monster_turn_delay);
            }
            _ => {}
        }
        out
    }

    /// The other peer declared the battle over (granted flee).
    pub fn apply_remote_battle_end(&mut self) -> BattleOutput {
        let mut out = BattleOutput::default();
        if !self.ended() {
            self.phase = BattlePhase::Ended(BattleOutcome::Fled);
            out.events.push(BattleEvent::Ended(BattleOutcome::Fled));
        }
        out
    }

    // -- result handshake ---------------------------------------------------

    /// Local result screen closed; tell the other peer.
    pub fn local_result_finished(&mut self) -> BattleOutput {
        self.result_local_done = true;
        BattleOutput {
            messages: vec![Message::BattleResultFinished],
            events: Vec::new(),
        }
    }

    pub fn apply_remote_result_finished(&mut self) {
        self.result_remote_done = true;
    }

    /// Both result screens are closed and the session can return to the
    /// map. Solo battles only wait on the local side.
    pub fn result_complete(&self) -> bool {
        self.result_local_done && (self.result_remote_done || self.is_solo())
    }
}
