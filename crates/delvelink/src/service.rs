//! `PeerSession`: the per-process service object.
//!
//! Owns the sockets, the inbound queue, the lifecycle and battle state
//! machines, and the world mirrors, and ties them together. The game
//! loop calls [`PeerSession::tick`] once per frame; everything else is a
//! reaction to player input. No global state anywhere: tests run several
//! sessions side by side in one process.

use std::net::SocketAddr;
use std::time::Instant;

use delvelink_battle::{
    BattleConfig, BattleCoordinator, BattleOutput, PlayerCombatant,
};
use delvelink_protocol::{
    Message, MonsterSpawn, PlayerActionKind, PlayerClass, PlayerSnapshot,
    RoomAdvertisement,
};
use delvelink_session::{
    JoinAttempt, JoinStage, RoomDirectory, RoomListing, RoomProfile,
    SessionLifecycle, SessionPhase,
};
use delvelink_transport::{
    Advertiser, DiscoveredRoom, DiscoveryListener, InboundQueue, PeerLink,
    PeerListener, TransportConfig,
};
use delvelink_world::{MonsterBook, ObjectBoard, PartyRoster};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{DelvelinkError, SessionEvent};

/// Tunables for a peer session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    pub battle: BattleConfig,
    /// Where to send room advertisements. `None` broadcasts on the LAN;
    /// tests point this at a loopback discovery listener.
    pub advert_target: Option<SocketAddr>,
}

/// Background accept loop for the hosted room's listener.
///
/// Accepted links arrive over the channel and are picked up by the next
/// tick; the listener stays armed so the room survives guest loss.
pub(crate) struct AcceptTask {
    pub(crate) rx: mpsc::UnboundedReceiver<PeerLink>,
    handle: JoinHandle<()>,
    pub(crate) port: u16,
}

impl Drop for AcceptTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) struct Discovery {
    listener: DiscoveryListener,
    pub(crate) rx: mpsc::UnboundedReceiver<DiscoveredRoom>,
}

/// One peer's whole view of the co-op session.
pub struct PeerSession {
    pub(crate) config: SessionConfig,
    pub(crate) queue: InboundQueue,
    pub(crate) lifecycle: SessionLifecycle,
    pub(crate) directory: RoomDirectory,
    /// In-flight join: the attempt plus the address to connect to.
    pub(crate) join: Option<(JoinAttempt, SocketAddr)>,
    pub(crate) roster: PartyRoster,
    pub(crate) board: ObjectBoard,
    pub(crate) monsters: MonsterBook,
    pub(crate) battle: Option<BattleCoordinator>,
    pub(crate) link: Option<PeerLink>,
    pub(crate) advertiser: Option<Advertiser>,
    pub(crate) discovery: Option<Discovery>,
    pub(crate) accept: Option<AcceptTask>,
    /// The local player's attack stat, which lives outside the snapshot
    /// (stat tables are the game's business, not the sync core's).
    pub(crate) local_atk: i32,
}

impl PeerSession {
    pub fn new(local: PlayerSnapshot, local_atk: i32, config: SessionConfig) -> Self {
        Self {
            config,
            queue: InboundQueue::new(),
            lifecycle: SessionLifecycle::new(),
            directory: RoomDirectory::new(),
            join: None,
            roster: PartyRoster::new(local),
            board: ObjectBoard::new(),
            monsters: MonsterBook::new(),
            battle: None,
            link: None,
            advertiser: None,
            discovery: None,
            accept: None,
            local_atk,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.lifecycle.phase()
    }

    pub fn rooms(&self) -> Vec<RoomListing> {
        self.directory.rooms()
    }

    /// The room this session hosts or is joined to.
    pub fn room(&self) -> Option<&RoomProfile> {
        self.lifecycle.room()
    }

    pub fn roster(&self) -> &PartyRoster {
        &self.roster
    }

    pub fn board(&self) -> &ObjectBoard {
        &self.board
    }

    pub fn monsters(&self) -> &MonsterBook {
        &self.monsters
    }

    pub fn battle(&self) -> Option<&BattleCoordinator> {
        self.battle.as_ref()
    }

    pub fn is_peer_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_connected())
    }

    /// The port our hosted room listens on, if hosting.
    pub fn listen_port(&self) -> Option<u16> {
        self.accept.as_ref().map(|a| a.port)
    }

    /// The UDP port discovery is bound to, if browsing. Tests bind port
    /// 0 and use this to aim a loopback advertiser.
    pub fn discovery_port(&self) -> Option<u16> {
        self.discovery.as_ref().map(|d| d.listener.local_port())
    }

    // -- discovery & hosting ------------------------------------------------

    /// Starts browsing for rooms on the LAN.
    pub async fn start_discovery(&mut self) -> Result<(), DelvelinkError> {
        self.lifecycle.start_search()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let listener =
            DiscoveryListener::start(self.config.transport.discovery_port, tx)
                .await?;
        self.discovery = Some(Discovery { listener, rx });
        Ok(())
    }

    /// Stops browsing and returns to idle.
    pub fn stop_discovery(&mut self) -> Result<(), DelvelinkError> {
        if let Some(disc) = self.discovery.take() {
            disc.listener.stop();
        }
        self.directory.clear();
        if self.lifecycle.phase() == SessionPhase::Searching {
            self.lifecycle.leave()?;
        }
        Ok(())
    }

    /// Opens a room: binds the listener, arms accept, starts advertising.
    /// Returns the TCP port the room listens on.
    pub async fn host_room(
        &mut self,
        profile: RoomProfile,
        preferred_port: u16,
    ) -> Result<u16, DelvelinkError> {
        self.lifecycle.start_hosting(profile.clone())?;
        match self.open_room(&profile, preferred_port).await {
            Ok(port) => Ok(port),
            Err(e) => {
                warn!(error = %e, "failed to open room");
                let _ = self.lifecycle.stop_hosting();
                Err(e)
            }
        }
    }

    /// Socket-side half of hosting, shared with host migration (which has
    /// already made its lifecycle transition).
    pub(crate) async fn open_room(
        &mut self,
        profile: &RoomProfile,
        preferred_port: u16,
    ) -> Result<u16, DelvelinkError> {
        let listener = PeerListener::bind(preferred_port).await?;
        let port = listener.local_addr()?.port();

        let (tx, rx) = mpsc::unbounded_channel();
        let queue = self.queue.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept(queue.clone()).await {
                    Ok(link) => {
                        if tx.send(link).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed, listener closing");
                        break;
                    }
                }
            }
        });
        self.accept = Some(AcceptTask { rx, handle, port });

        let advert = RoomAdvertisement {
            title: profile.title.clone(),
            host_name: profile.host_name.clone(),
            is_private: profile.is_private,
            password: profile.password.clone(),
            players: 1,
            max_players: 2,
            addr: "0.0.0.0".to_string(),
            port,
        };
        let interval = self.config.transport.advertise_interval;
        let advertiser = match self.config.advert_target {
            Some(target) => {
                Advertiser::start_with_target(advert, interval, target, false)
                    .await?
            }
            None => {
                Advertiser::start(
                    advert,
                    interval,
                    self.config.transport.discovery_port,
                )
                .await?
            }
        };
        self.advertiser = Some(advertiser);

        info!(port, title = %profile.title, "room open");
        Ok(port)
    }

    /// Closes the hosted room (and any connected guest).
    pub async fn stop_hosting(&mut self) -> Result<(), DelvelinkError> {
        self.lifecycle.stop_hosting()?;
        if let Some(adv) = self.advertiser.take() {
            adv.stop();
        }
        self.accept = None;
        if let Some(link) = self.link.take() {
            let _ = link.send(&Message::Disconnect).await;
            link.close().await;
        }
        self.roster.clear_remote();
        Ok(())
    }

    /// Tears the whole session down: room, peer link, discovery, queue,
    /// directory. Safe to call in any phase, and more than once.
    pub async fn close(&mut self) {
        if let Some(adv) = self.advertiser.take() {
            adv.stop();
        }
        self.accept = None;
        if let Some(disc) = self.discovery.take() {
            disc.listener.stop();
        }
        if let Some(link) = self.link.take() {
            let _ = link.send(&Message::Disconnect).await;
            link.close().await;
        }
        self.join = None;
        self.battle = None;
        self.queue.clear();
        self.directory.clear();
        self.roster.clear_remote();
        match self.lifecycle.phase() {
            SessionPhase::Hosting | SessionPhase::HostingWithGuest => {
                let _ = self.lifecycle.stop_hosting();
            }
            SessionPhase::Searching | SessionPhase::Connected => {
                let _ = self.lifecycle.leave();
            }
            _ => {}
        }
    }

    // -- joining ------------------------------------------------------------

    /// Starts joining a discovered room. The advertisement already
    /// carries the room info, so the info stage resolves immediately:
    /// public rooms come back `ReadyToConnect`, private ones
    /// `PasswordPrompt`.
    pub fn begin_join(
        &mut self,
        listing: &RoomListing,
    ) -> Result<JoinStage, DelvelinkError> {
        let (mut attempt, _info_request) = JoinAttempt::start();
        let stage = attempt.on_room_info(listing.advert.clone())?.clone();
        self.join = Some((attempt, listing.connect_addr()));
        Ok(stage)
    }

    /// Feeds the entered password into the pending join attempt.
    pub fn submit_password(
        &mut self,
        entered: &str,
    ) -> Result<JoinStage, DelvelinkError> {
        let (attempt, _) =
            self.join.as_mut().ok_or(DelvelinkError::JoinNotReady)?;
        Ok(attempt.submit_password(entered)?.clone())
    }

    /// Opens the game connection for a join attempt that has cleared the
    /// password gate. On failure the session drops back to searching and
    /// the room stays selectable.
    pub async fn connect(&mut self) -> Result<(), DelvelinkError> {
        let (attempt, addr) = match &self.join {
            Some((attempt, addr))
                if *attempt.stage() == JoinStage::ReadyToConnect =>
            {
                (attempt, *addr)
            }
            _ => return Err(DelvelinkError::JoinNotReady),
        };
        let room = attempt.room().cloned().ok_or(DelvelinkError::JoinNotReady)?;

        self.lifecycle.begin_connect(RoomProfile {
            title: room.title,
            host_name: room.host_name,
            is_private: room.is_private,
            password: room.password,
        })?;

        match PeerLink::connect(
            addr,
            self.config.transport.connect_timeout,
            self.queue.clone(),
        )
        .await
        {
            Ok(link) => {
                self.lifecycle.connected()?;
                self.link = Some(link);
                self.join = None;
                self.send(&Message::PlayerInfo {
                    player: self.roster.local().clone(),
                })
                .await?;
                Ok(())
            }
            Err(e) => {
                self.lifecycle.connect_failed()?;
                Err(e.into())
            }
        }
    }

    // -- the tick -----------------------------------------------------------

    /// Advances the session one simulation tick: folds discovery results
    /// into the directory, picks up newly accepted guests, drains and
    /// dispatches the inbound queue, and fires due battle deadlines.
    pub async fn tick(
        &mut self,
        now: Instant,
    ) -> Result<Vec<SessionEvent>, DelvelinkError> {
        let mut events = Vec::new();

        if let Some(disc) = self.discovery.as_mut() {
            let mut changed = false;
            while let Ok(room) = disc.rx.try_recv() {
                self.directory.observe(room, now);
                changed = true;
            }
            self.directory.prune(now);
            if changed {
                events.push(SessionEvent::RoomsChanged);
            }
        }

        let mut newest = None;
        if let Some(accept) = self.accept.as_mut() {
            while let Ok(link) = accept.rx.try_recv() {
                // a second guest replaces the first
                newest = Some(link);
            }
        }
        if let Some(link) = newest {
            self.lifecycle.guest_joined()?;
            if let Some(old) = self.link.take() {
                old.close().await;
            }
            self.link = Some(link);
            if let Some(adv) = &self.advertiser {
                adv.set_players(2);
            }
            events.push(SessionEvent::GuestConnected);
            self.send(&Message::PlayerInfo {
                player: self.roster.local().clone(),
            })
            .await?;
        }

        // Handlers run outside the queue lock and may send freely.
        for msg in self.queue.drain() {
            self.dispatch(msg, now, &mut events).await?;
        }

        let polled: Option<BattleOutput> = match self.battle.as_mut() {
            Some(battle) => {
                let mut rng = rand::rng();
                battle.poll(&mut rng, now)
            }
            None => None,
        };
        if let Some(out) = polled {
            self.flush_battle(out, &mut events).await?;
        }

        Ok(events)
    }

    // -- map & lobby actions ------------------------------------------------

    pub async fn send_chat(&mut self, text: &str) -> Result<(), DelvelinkError> {
        let nickname = self.roster.local().nickname.clone();
        self.send(&Message::Chat { nickname, text: text.to_string() }).await
    }

    pub async fn select_class(
        &mut self,
        class: PlayerClass,
    ) -> Result<(), DelvelinkError> {
        let msg = self.roster.update_local(|p| p.class = class);
        self.send(&Message::ClassSelect { class }).await?;
        // follow with the full snapshot so derived stats stay current
        self.send(&msg).await
    }

    pub async fn start_game(&mut self) -> Result<(), DelvelinkError> {
        self.send(&Message::GameStart).await
    }

    /// Host broadcasts the stage layout; both peers generate the same map
    /// from the same seed.
    pub async fn init_map(
        &mut self,
        seed: u64,
        stage: u32,
        host_x: i32,
        host_y: i32,
        width: u32,
        height: u32,
    ) -> Result<(), DelvelinkError> {
        self.send(&Message::MapInit { seed, stage, host_x, host_y, width, height })
            .await
    }

    pub async fn move_to(&mut self, x: i32, y: i32) -> Result<(), DelvelinkError> {
        self.send(&Message::MapMove { x, y }).await
    }

    /// Pushes the local snapshot to the peer (HP change, level up).
    pub async fn sync_player(&mut self) -> Result<(), DelvelinkError> {
        let msg = Message::PlayerInfo { player: self.roster.local().clone() };
        self.send(&msg).await
    }

    /// Mutates the local snapshot and pushes it in one step.
    pub async fn update_local_player(
        &mut self,
        f: impl FnOnce(&mut PlayerSnapshot),
    ) -> Result<(), DelvelinkError> {
        let msg = self.roster.update_local(f);
        self.send(&msg).await
    }

    // -- world actions ------------------------------------------------------

    /// Registers the freshly generated stage's interactables and
    /// monsters. Both peers call this with the same layout, derived from
    /// the shared map seed.
    pub fn reset_stage(
        &mut self,
        chests: impl IntoIterator<Item = (i32, i32)>,
        traps: impl IntoIterator<Item = (i32, i32)>,
        monsters: impl IntoIterator<Item = delvelink_protocol::MonsterPos>,
    ) {
        self.board.reset_stage(chests, traps);
        self.monsters.reset_stage(monsters);
    }

    /// Host moves a map monster; broadcast separately via
    /// [`sync_monster_positions`](Self::sync_monster_positions).
    pub fn move_monster(&mut self, id: delvelink_protocol::MonsterId, x: i32, y: i32) {
        self.monsters.set_position(id, x, y);
    }

    /// First half of opening a chest: take the busy lock. `false` means
    /// the chest is already open or claimed by the peer.
    pub async fn claim_chest(
        &mut self,
        x: i32,
        y: i32,
    ) -> Result<bool, DelvelinkError> {
        match self.board.try_claim_chest(x, y) {
            Some(msg) => {
                self.send(&msg).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Second half: the open animation finished; mark open and release.
    pub async fn open_claimed_chest(
        &mut self,
        x: i32,
        y: i32,
    ) -> Result<(), DelvelinkError> {
        if let Some(msgs) = self.board.open_claimed_chest(x, y) {
            for msg in msgs {
                self.send(&msg).await?;
            }
        }
        Ok(())
    }

    /// Aborts a claim without opening (interrupted animation).
    pub async fn release_chest(
        &mut self,
        x: i32,
        y: i32,
    ) -> Result<(), DelvelinkError> {
        if let Some(msg) = self.board.release_chest(x, y) {
            self.send(&msg).await?;
        }
        Ok(())
    }

    /// Springs a trap locally and tells the peer. Returns `true` when
    /// the trap was still armed.
    pub async fn trigger_trap(
        &mut self,
        x: i32,
        y: i32,
    ) -> Result<bool, DelvelinkError> {
        match self.board.trigger_trap(x, y) {
            Some(msg) => {
                self.send(&msg).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes a map monster (killed outside or after battle) on both
    /// peers.
    pub async fn kill_monster_at(
        &mut self,
        x: i32,
        y: i32,
    ) -> Result<(), DelvelinkError> {
        if let Some(msg) = self.monsters.kill_at(x, y) {
            self.send(&msg).await?;
        }
        Ok(())
    }

    /// Host pushes the authoritative monster positions (called after the
    /// host's wander step, roughly once a second).
    pub async fn sync_monster_positions(&mut self) -> Result<(), DelvelinkError> {
        let msg = self.monsters.position_update();
        self.send(&msg).await
    }

    // -- battle actions -----------------------------------------------------

    /// Starts a battle this peer initiated (walked into a monster or
    /// sprung a trap) and announces it.
    pub async fn start_battle(
        &mut self,
        spawn: MonsterSpawn,
        now: Instant,
    ) -> Result<(), DelvelinkError> {
        self.send(&Message::BattleStart { monster: spawn.clone() }).await?;
        self.battle = Some(self.new_battle(&spawn, now));
        debug!(monster = %spawn.monster_id, "battle started locally");
        Ok(())
    }

    pub(crate) fn new_battle(
        &self,
        spawn: &MonsterSpawn,
        now: Instant,
    ) -> BattleCoordinator {
        let local =
            PlayerCombatant::from_snapshot(self.roster.local(), self.local_atk);
        // The remote's rolls are authoritative on their side, so their
        // attack stat is never used here.
        let remote = self
            .roster
            .remote()
            .map(|r| PlayerCombatant::from_snapshot(r, 0));
        BattleCoordinator::new(
            spawn,
            local,
            remote,
            self.config.battle.clone(),
            now,
        )
    }

    /// The battle intro animation finished.
    pub fn battle_intro_done(&mut self) -> Result<Vec<SessionEvent>, DelvelinkError> {
        let battle = self.battle.as_mut().ok_or(DelvelinkError::NoBattle)?;
        let out = battle.intro_done();
        Ok(out.events.into_iter().map(SessionEvent::Battle).collect())
    }

    /// The local player acts on their turn.
    pub async fn battle_action(
        &mut self,
        kind: PlayerActionKind,
        skill: Option<&str>,
        now: Instant,
    ) -> Result<Vec<SessionEvent>, DelvelinkError> {
        let out = {
            let battle =
                self.battle.as_mut().ok_or(DelvelinkError::NoBattle)?;
            let mut rng = rand::rng();
            battle.local_action(&mut rng, kind, skill, now)?
        };
        let mut events = Vec::new();
        self.flush_battle(out, &mut events).await?;
        Ok(events)
    }

    /// The renderer finished the current monster-turn step.
    pub async fn battle_step_done(
        &mut self,
        now: Instant,
    ) -> Result<Vec<SessionEvent>, DelvelinkError> {
        let out = {
            let battle =
                self.battle.as_mut().ok_or(DelvelinkError::NoBattle)?;
            let mut rng = rand::rng();
            battle.advance_chain(&mut rng, now)
        };
        let mut events = Vec::new();
        self.flush_battle(out, &mut events).await?;
        Ok(events)
    }

    pub async fn request_flee(
        &mut self,
        now: Instant,
    ) -> Result<Vec<SessionEvent>, DelvelinkError> {
        let out = {
            let battle =
                self.battle.as_mut().ok_or(DelvelinkError::NoBattle)?;
            battle.request_flee(now)
        };
        let mut events = Vec::new();
        self.flush_battle(out, &mut events).await?;
        Ok(events)
    }

    /// The local result screen closed. Once both sides have closed (or
    /// immediately in solo), the battle object is dropped.
    pub async fn battle_result_closed(&mut self) -> Result<(), DelvelinkError> {
        let out = {
            let battle =
                self.battle.as_mut().ok_or(DelvelinkError::NoBattle)?;
            battle.local_result_finished()
        };
        for msg in &out.messages {
            self.send(msg).await?;
        }
        if self.battle.as_ref().is_some_and(|b| b.result_complete()) {
            self.battle = None;
        }
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    pub(crate) async fn send(&self, msg: &Message) -> Result<(), DelvelinkError> {
        if let Some(link) = &self.link {
            link.send(msg).await?;
        }
        Ok(())
    }

    pub(crate) async fn flush_battle(
        &mut self,
        out: BattleOutput,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), DelvelinkError> {
        for msg in &out.messages {
            self.send(msg).await?;
        }
        events.extend(out.events.into_iter().map(SessionEvent::Battle));
        Ok(())
    }
}
