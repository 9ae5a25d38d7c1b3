//! Inbound message dispatch.
//!
//! One handler per message kind, run on the simulation tick after the
//! queue drain. Handlers follow two rules from the wire protocol's
//! design: numbers computed by the acting peer are applied verbatim, and
//! anything that doesn't fit the current state degrades to a logged
//! no-op instead of an error (a late packet after a desync must never
//! crash the loop).

use std::time::Instant;

use delvelink_protocol::Message;
use delvelink_session::PeerLossOutcome;
use tracing::{debug, info};

use crate::{DelvelinkError, PeerSession, SessionEvent};

impl PeerSession {
    pub(crate) async fn dispatch(
        &mut self,
        msg: Message,
        now: Instant,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), DelvelinkError> {
        match msg {
            Message::RoomInfoRequest => {
                if let Some(adv) = &self.advertiser {
                    let room = adv.advert();
                    self.send(&Message::RoomInfoResponse { room }).await?;
                }
            }
            Message::RoomInfoResponse { room } => {
                // direct-request flow; discovery normally answers first
                if let Some((attempt, _)) = self.join.as_mut() {
                    if let Err(e) = attempt.on_room_info(room) {
                        debug!(error = %e, "room info out of order");
                    }
                }
            }
            Message::PlayerInfo { player } => {
                self.roster.apply_remote_info(player.clone());
                events.push(SessionEvent::PeerInfo(player));
            }
            Message::Chat { nickname, text } => {
                events.push(SessionEvent::Chat { nickname, text });
            }
            Message::Disconnect => self.handle_peer_loss(now, events).await?,
            Message::GameStart => events.push(SessionEvent::GameStarted),
            Message::ClassSelect { class } => {
                events.push(SessionEvent::ClassSelected(class));
            }
            Message::MapMove { x, y } => {
                self.roster.apply_remote_move(x, y);
                events.push(SessionEvent::RemoteMoved { x, y });
            }
            Message::MapInit { seed, stage, host_x, host_y, width, height } => {
                events.push(SessionEvent::MapInitialized {
                    seed,
                    stage,
                    host_x,
                    host_y,
                    width,
                    height,
                });
            }
            Message::BattleStart { monster } => {
                self.battle = Some(self.new_battle(&monster, now));
                events.push(SessionEvent::BattleStarted(monster));
            }
            Message::BattleAction { kind, damage, crit, skill, .. } => {
                let out = match self.battle.as_mut() {
                    Some(b) => b.apply_remote_action(kind, damage, crit, skill, now),
                    None => {
                        debug!("battle action with no battle running");
                        return Ok(());
                    }
                };
                self.flush_battle(out, events).await?;
            }
            Message::BattleTurnEnd => {
                let out = match self.battle.as_mut() {
                    Some(b) => b.apply_remote_turn_end(now),
                    None => return Ok(()),
                };
                self.flush_battle(out, events).await?;
            }
            Message::EnemyAction { kind, damage, target_is_host, skill } => {
                let out = match self.battle.as_mut() {
                    Some(b) => b.apply_remote_enemy_action(
                        kind,
                        damage,
                        target_is_host,
                        skill,
                        now,
                    ),
                    None => {
                        debug!("enemy action with no battle running");
                        return Ok(());
                    }
                };
                self.flush_battle(out, events).await?;
            }
            Message::FleeRequest => {
                let out = match self.battle.as_mut() {
                    Some(b) => b.apply_remote_flee(),
                    None => return Ok(()),
                };
                self.flush_battle(out, events).await?;
            }
            Message::BattleEnd => {
                let out = match self.battle.as_mut() {
                    Some(b) => b.apply_remote_battle_end(),
                    None => return Ok(()),
                };
                self.flush_battle(out, events).await?;
            }
            Message::BattleResultFinished => {
                if let Some(b) = self.battle.as_mut() {
                    b.apply_remote_result_finished();
                    if b.result_complete() {
                        self.battle = None;
                    }
                }
            }
            Message::ChestUpdate { x, y, open } => {
                self.board.apply_remote_update(x, y, open);
                events.push(SessionEvent::ChestChanged { x, y, open });
            }
            Message::ChestBusy { x, y, busy } => {
                self.board.apply_remote_busy(x, y, busy);
            }
            Message::TrapUpdate { x, y, triggered } => {
                self.board.apply_remote_trap(x, y, triggered);
                if triggered {
                    events.push(SessionEvent::TrapTriggered { x, y });
                }
            }
            Message::MonsterUpdate { monsters } => {
                self.monsters.apply_update(&monsters);
                events.push(SessionEvent::MonstersMoved);
            }
            Message::MonsterDead { x, y } => {
                self.monsters.apply_remote_death(x, y);
                events.push(SessionEvent::MonsterDied { x, y });
            }
        }
        Ok(())
    }

    /// The synthetic `Disconnect` drained from the queue: the link is
    /// dead. Cleans up the peer's footprint, lets the lifecycle decide
    /// what we become, and keeps any running battle alive in solo mode.
    async fn handle_peer_loss(
        &mut self,
        now: Instant,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), DelvelinkError> {
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        self.roster.clear_remote();
        self.board.clear_remote_locks();

        let battle_out = self.battle.as_mut().map(|b| b.ally_left(now));
        if let Some(out) = battle_out {
            self.flush_battle(out, events).await?;
        }

        let local_name = self.roster.local().nickname.clone();
        match self.lifecycle.peer_lost(&local_name) {
            PeerLossOutcome::KeepHosting => {
                if let Some(adv) = &self.advertiser {
                    adv.set_players(1);
                }
                events.push(SessionEvent::PeerLeft);
            }
            PeerLossOutcome::BecomeHost(profile) => {
                let port = self.open_room(&profile, 0).await?;
                info!(port, title = %profile.title, "took over as host");
                events.push(SessionEvent::HostMigrated { port });
            }
            PeerLossOutcome::Nothing => {
                debug!("disconnect outside a session, ignored");
            }
        }
        Ok(())
    }
}
