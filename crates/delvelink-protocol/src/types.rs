//! Core protocol types for Delvelink's wire format.
//!
//! Everything in this module travels "on the wire": either inside a framed
//! message on the peer connection, or inside a discovery datagram on the
//! LAN broadcast channel.
//!
//! The message set is closed. Each kind is a [`Message`] variant with its
//! own strongly typed payload, so a payload that doesn't match its kind is
//! rejected at decode time instead of being mis-parsed downstream.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a monster within the current dungeon stage.
///
/// Newtype over `u32` so a monster id can't be confused with a coordinate
/// or a damage value in a function signature.
///
/// `#[serde(transparent)]` makes a `MonsterId(7)` serialize as plain `7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonsterId(pub u32);

impl fmt::Display for MonsterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Enumerations shared by several message kinds
// ---------------------------------------------------------------------------

/// The playable classes. Stat tables live outside the sync core; the
/// protocol only needs a stable tag to exchange during the lobby phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlayerClass {
    Warrior,
    Thief,
    Mage,
    Priest,
}

/// What a player did on their battle turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlayerActionKind {
    /// Basic attack.
    Attack,
    /// A named skill (the skill tag rides in `BattleAction::skill`).
    Skill,
    /// Guard; no damage, reduced incoming damage next monster turn.
    Guard,
    /// Item use.
    Item,
}

/// One step of the monster's turn, as announced by the driving peer.
///
/// The damaging variants correspond one-to-one to the steps of the
/// status-effect resolution chain; the receiving peer applies the carried
/// damage verbatim and plays the matching animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EnemyActionKind {
    /// The monster's ordinary attack.
    Attack,
    /// A monster skill attack (skill tag in `EnemyAction::skill`).
    SkillAttack,
    /// Strong-poison damage tick on the monster.
    StrongPoisonTick,
    /// Ordinary poison damage tick on the monster.
    PoisonTick,
    /// Bleed damage tick on the monster.
    BleedTick,
    /// The monster was stunned and loses its attack this round.
    Stunned,
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// A player's synchronized stat block, exchanged in the lobby and after
/// stat changes. Both peers hold a copy of both snapshots; battle turn
/// order is derived from these (higher DEX first, host wins ties).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Stable id assigned by the host (host = 0, guest = 1).
    pub id: u64,
    pub nickname: String,
    pub class: PlayerClass,
    pub hp: i32,
    pub max_hp: i32,
    pub def: i32,
    pub dex: i32,
    pub is_host: bool,
}

/// Everything a peer needs to spin up its copy of a battle encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub monster_id: MonsterId,
    /// `true` when the battle was sprung by a trap; such battles are
    /// inescapable (flee is refused locally, never negotiated).
    pub from_trap: bool,
    /// Map coordinates of the monster that triggered the encounter.
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub atk: i32,
    pub def: i32,
    pub exp_reward: u32,
}

/// One monster's position inside a bulk [`Message::MonsterUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterPos {
    pub id: MonsterId,
    pub x: i32,
    pub y: i32,
}

// ---------------------------------------------------------------------------
// Room advertisement (discovery channel)
// ---------------------------------------------------------------------------

/// Tag prefix on every discovery datagram. Anything on the discovery port
/// that doesn't start with this is ignored.
pub const DISCOVERY_PREFIX: &str = "ROOM_DISCOVERY:";

/// A hosted room as advertised on the LAN discovery channel.
///
/// Re-broadcast roughly once per second while hosting; the player count is
/// kept live so listeners see join/leave without a new advertisement kind.
///
/// The password travels in plaintext. That matches the LAN trust model of
/// the original design; the privacy flag only gates the join prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAdvertisement {
    pub title: String,
    pub host_name: String,
    pub is_private: bool,
    /// `None` for public rooms.
    pub password: Option<String>,
    pub players: u8,
    pub max_players: u8,
    /// Address the host accepts connections on.
    pub addr: String,
    pub port: u16,
}

impl RoomAdvertisement {
    /// The identity listeners deduplicate advertisements by.
    ///
    /// A room that re-broadcasts replaces its previous entry; two rooms
    /// that differ in host name, title, or port are distinct.
    pub fn dedup_key(&self) -> (String, String, u16) {
        (self.host_name.clone(), self.title.clone(), self.port)
    }

    /// Serializes this advertisement into a tagged discovery datagram.
    #[cfg(feature = "json")]
    pub fn to_datagram(&self) -> Result<Vec<u8>, crate::ProtocolError> {
        let body = serde_json::to_string(self)
            .map_err(crate::ProtocolError::Encode)?;
        Ok(format!("{DISCOVERY_PREFIX}{body}").into_bytes())
    }

    /// Parses a discovery datagram.
    ///
    /// Returns `Ok(None)` for datagrams without the discovery tag (other
    /// traffic on the port), `Err` for tagged-but-malformed payloads.
    #[cfg(feature = "json")]
    pub fn from_datagram(
        data: &[u8],
    ) -> Result<Option<Self>, crate::ProtocolError> {
        let text = match std::str::from_utf8(data) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
        let Some(body) = text.strip_prefix(DISCOVERY_PREFIX) else {
            return Ok(None);
        };
        serde_json::from_str(body)
            .map(Some)
            .map_err(crate::ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Message: the closed set of peer-to-peer message kinds
// ---------------------------------------------------------------------------

/// Every message that can travel on the peer connection.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "MapMove", "x": 3, "y": 7 }`. An unknown tag or a payload
/// that doesn't match its tag fails to decode; the transport logs and
/// skips that frame rather than tearing the connection down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // -- Lobby / session --
    /// Guest → Host: "describe your room" (pre-join, for the password
    /// prompt on private rooms).
    RoomInfoRequest,
    /// Host → Guest: current room metadata.
    RoomInfoResponse { room: RoomAdvertisement },
    /// Either direction: full stat snapshot of the sending player.
    PlayerInfo { player: PlayerSnapshot },
    /// In-session chat line. Also used for system notices (disconnects,
    /// migrations) with a reserved nickname.
    Chat { nickname: String, text: String },
    /// Synthetic on read-EOF / I/O error, or explicit on clean close.
    Disconnect,
    /// Host → Guest: leave the lobby, the run begins.
    GameStart,
    /// Either direction: the sending player picked a class.
    ClassSelect { class: PlayerClass },

    // -- Map / world --
    /// The sending player moved on the dungeon map.
    MapMove { x: i32, y: i32 },
    /// Host → Guest: deterministic map parameters for the current stage.
    MapInit {
        seed: u64,
        stage: u32,
        host_x: i32,
        host_y: i32,
        width: u32,
        height: u32,
    },

    // -- Battle --
    /// The sending peer walked into (or sprang) an encounter.
    BattleStart { monster: MonsterSpawn },
    /// Authoritative echo of a local action: the actor already rolled and
    /// applied these numbers; the receiver applies them verbatim.
    BattleAction {
        kind: PlayerActionKind,
        damage: i32,
        crit: bool,
        skill: Option<String>,
        target_is_host: bool,
    },
    /// The sending peer finished its turn this round.
    BattleTurnEnd,
    /// One step of the monster turn, computed by the driving peer.
    EnemyAction {
        kind: EnemyActionKind,
        damage: i32,
        target_is_host: bool,
        skill: Option<String>,
    },
    /// The sending peer wants to flee the battle.
    FleeRequest,
    /// The battle is over (flee granted or negotiated end).
    BattleEnd,
    /// The sending peer closed its battle-result screen.
    BattleResultFinished,

    // -- Object sync --
    ChestUpdate { x: i32, y: i32, open: bool },
    /// Busy-lock handshake for a chest: `busy = true` claims it,
    /// `busy = false` releases it.
    ChestBusy { x: i32, y: i32, busy: bool },
    TrapUpdate { x: i32, y: i32, triggered: bool },
    /// Host → Guest: bulk monster position refresh.
    MonsterUpdate { monsters: Vec<MonsterPos> },
    /// A map monster died outside battle bookkeeping; matched by
    /// coordinates on the receiving side.
    MonsterDead { x: i32, y: i32 },
}

impl Message {
    /// Stable kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomInfoRequest => "RoomInfoRequest",
            Self::RoomInfoResponse { .. } => "RoomInfoResponse",
            Self::PlayerInfo { .. } => "PlayerInfo",
            Self::Chat { .. } => "Chat",
            Self::Disconnect => "Disconnect",
            Self::GameStart => "GameStart",
            Self::ClassSelect { .. } => "ClassSelect",
            Self::MapMove { .. } => "MapMove",
            Self::MapInit { .. } => "MapInit",
            Self::BattleStart { .. } => "BattleStart",
            Self::BattleAction { .. } => "BattleAction",
            Self::BattleTurnEnd => "BattleTurnEnd",
            Self::EnemyAction { .. } => "EnemyAction",
            Self::FleeRequest => "FleeRequest",
            Self::BattleEnd => "BattleEnd",
            Self::BattleResultFinished => "BattleResultFinished",
            Self::ChestUpdate { .. } => "ChestUpdate",
            Self::ChestBusy { .. } => "ChestBusy",
            Self::TrapUpdate { .. } => "TrapUpdate",
            Self::MonsterUpdate { .. } => "MonsterUpdate",
            Self::MonsterDead { .. } => "MonsterDead",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
