//! Two coordinators playing one battle against each other, with every
//! output message relayed to the opposite side the way the session layer
//! would relay it over the wire.

use std::time::{Duration, Instant};

use delvelink_battle::{
    BattleConfig, BattleCoordinator, BattleOutcome, BattleOutput,
    BattlePhase, PlayerCombatant,
};
use delvelink_protocol::{
    Message, MonsterId, MonsterSpawn, PlayerActionKind, PlayerClass,
    PlayerSnapshot,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn spawn(hp: i32) -> MonsterSpawn {
    MonsterSpawn {
        monster_id: MonsterId(9),
        from_trap: false,
        x: 2,
        y: 2,
        hp,
        max_hp: hp,
        atk: 10,
        def: 3,
        exp_reward: 25,
    }
}

fn combatant(nick: &str, dex: i32, is_host: bool) -> PlayerCombatant {
    PlayerCombatant::from_snapshot(
        &PlayerSnapshot {
            id: if is_host { 0 } else { 1 },
            nickname: nick.into(),
            class: PlayerClass::Thief,
            hp: 60,
            max_hp: 60,
            def: 5,
            dex,
            is_host,
        },
        16,
    )
}

fn pair(monster_hp: i32) -> (BattleCoordinator, BattleCoordinator) {
    let s = spawn(monster_hp);
    let now = Instant::now();
    let host = BattleCoordinator::new(
        &s,
        combatant("host", 10, true),
        Some(combatant("guest", 15, false)),
        BattleConfig::default(),
        now,
    );
    let guest = BattleCoordinator::new(
        &s,
        combatant("guest", 15, false),
        Some(combatant("host", 10, true)),
        BattleConfig::default(),
        now,
    );
    (host, guest)
}

/// Feeds one side's output messages into the other coordinator, the way
/// the session loop dispatches inbound battle messages.
fn relay(out: &BattleOutput, to: &mut BattleCoordinator, now: Instant) -> BattleOutput {
    let mut combined = BattleOutput::default();
    for msg in &out.messages {
        let produced = match msg.clone() {
            Message::BattleAction { kind, damage, crit, skill, .. } => {
                to.apply_remote_action(kind, damage, crit, skill, now)
            }
            Message::BattleTurnEnd => to.apply_remote_turn_end(now),
            Message::EnemyAction { kind, damage, target_is_host, skill } => {
                to.apply_remote_enemy_action(kind, damage, target_is_host, skill, now)
            }
            Message::FleeRequest => to.apply_remote_flee(),
            Message::BattleEnd => to.apply_remote_battle_end(),
            Message::BattleResultFinished => {
                to.apply_remote_result_finished();
                BattleOutput::default()
            }
            other => panic!("unexpected battle message: {other:?}"),
        };
        combined.messages.extend(produced.messages);
        combined.events.extend(produced.events);
    }
    combined
}

#[test]
fn test_both_peers_agree_on_turn_order() {
    let (mut host, mut guest) = pair(500);
    host.intro_done();
    guest.intro_done();
    // guest has the higher DEX on both sides of the wire
    assert_eq!(host.phase(), BattlePhase::WaitingForPeer);
    assert_eq!(guest.phase(), BattlePhase::MyTurn);
}

#[test]
fn test_full_round_keeps_monster_hp_identical() {
    let (mut host, mut guest) = pair(500);
    host.intro_done();
    guest.intro_done();
    let now = Instant::now();
    let mut guest_rng = StdRng::seed_from_u64(21);
    let mut host_rng = StdRng::seed_from_u64(99);

    // guest acts first, host mirrors the exact roll
    let out = guest
        .local_action(&mut guest_rng, PlayerActionKind::Attack, None, now)
        .unwrap();
    relay(&out, &mut host, now);
    assert_eq!(host.monster().hp, guest.monster().hp);
    assert_eq!(host.phase(), BattlePhase::MyTurn);

    // host acts, guest mirrors; both now count two actions
    let out = host
        .local_action(&mut host_rng, PlayerActionKind::Attack, None, now)
        .unwrap();
    assert_eq!(host.actions_taken(), 2);
    relay(&out, &mut guest, now);
    assert_eq!(guest.actions_taken(), 2);
    assert_eq!(host.monster().hp, guest.monster().hp);
    assert_eq!(host.phase(), BattlePhase::MonsterTurn);
    assert_eq!(guest.phase(), BattlePhase::MonsterTurn);

    // only the host drives the monster; the guest mirrors each step
    assert!(guest.poll(&mut guest_rng, now + Duration::from_secs(2)).is_none());
    let mut step = host
        .poll(&mut host_rng, now + Duration::from_secs(2))
        .expect("monster turn due");
    loop {
        relay(&step, &mut guest, now);
        if matches!(host.phase(), BattlePhase::MyTurn | BattlePhase::WaitingForPeer) {
            break;
        }
        step = host.advance_chain(&mut host_rng, now);
        if step.messages.is_empty() && step.events.is_empty() {
            break;
        }
    }
    assert_eq!(host.monster().hp, guest.monster().hp);
    assert_eq!(host.local().hp, guest.remote().unwrap().hp);
    assert_eq!(host.remote().unwrap().hp, guest.local().hp);
    // round boundary reached on both sides
    assert_eq!(host.actions_taken(), 0);
    assert_eq!(guest.actions_taken(), 0);
}

#[test]
fn test_turn_conservation_never_exceeds_two() {
    let (mut host, mut guest) = pair(10_000);
    host.intro_done();
    guest.intro_done();
    let now = Instant::now();
    let mut guest_rng = StdRng::seed_from_u64(5);
    let mut host_rng = StdRng::seed_from_u64(6);

    for _ in 0..3 {
        let out = guest
            .local_action(&mut guest_rng, PlayerActionKind::Attack, None, now)
            .unwrap();
        relay(&out, &mut host, now);
        let out = host
            .local_action(&mut host_rng, PlayerActionKind::Attack, None, now)
            .unwrap();
        relay(&out, &mut guest, now);
        assert!(host.actions_taken() <= 2);
        assert!(guest.actions_taken() <= 2);

        // neither side accepts a third action this round
        assert!(host
            .local_action(&mut host_rng, PlayerActionKind::Attack, None, now)
            .is_err());
        assert!(guest
            .local_action(&mut guest_rng, PlayerActionKind::Attack, None, now)
            .is_err());

        // run the monster turn to the round boundary
        let mut step = host
            .poll(&mut host_rng, now + Duration::from_secs(2))
            .expect("monster turn due");
        loop {
            relay(&step, &mut guest, now);
            if matches!(
                host.phase(),
                BattlePhase::MyTurn | BattlePhase::WaitingForPeer
            ) {
                break;
            }
            step = host.advance_chain(&mut host_rng, now);
        }
    }
}

#[test]
fn test_flee_symmetry_within_one_round_trip() {
    let (mut host, mut guest) = pair(500);
    host.intro_done();
    guest.intro_done();
    let now = Instant::now();

    let host_req = host.request_flee(now);
    assert!(matches!(host_req.messages[0], Message::FleeRequest));
    let guest_req = guest.request_flee(now);

    // each side receives the other's pending request and grants it
    let granted_on_guest = relay(&host_req, &mut guest, now);
    let granted_on_host = relay(&guest_req, &mut host, now);
    assert_eq!(guest.phase(), BattlePhase::Ended(BattleOutcome::Fled));
    assert_eq!(host.phase(), BattlePhase::Ended(BattleOutcome::Fled));

    // the grant broadcasts land on peers that already ended; harmless
    relay(&granted_on_guest, &mut host, now);
    relay(&granted_on_host, &mut guest, now);
    assert_eq!(host.phase(), BattlePhase::Ended(BattleOutcome::Fled));
    assert_eq!(guest.phase(), BattlePhase::Ended(BattleOutcome::Fled));
}

#[test]
fn test_victory_reached_identically_on_both_sides() {
    let (mut host, mut guest) = pair(8);
    host.intro_done();
    guest.intro_done();
    let now = Instant::now();
    let mut guest_rng = StdRng::seed_from_u64(30);

    // one guest attack (minimum roll is 1, HP 8 needs a real roll; atk 16
    // vs def 3 floors well above 8)
    let out = guest
        .local_action(&mut guest_rng, PlayerActionKind::Attack, None, now)
        .unwrap();
    relay(&out, &mut host, now);
    assert_eq!(guest.phase(), BattlePhase::Ended(BattleOutcome::Victory));
    assert_eq!(host.phase(), BattlePhase::Ended(BattleOutcome::Victory));

    // result handshake completes in both directions
    let g = guest.local_result_finished();
    let h = host.local_result_finished();
    relay(&g, &mut host, now);
    relay(&h, &mut guest, now);
    assert!(host.result_complete());
    assert!(guest.result_complete());
}
