use delvelink_battle::BattleEvent;
use delvelink_protocol::{MonsterSpawn, PlayerClass, PlayerSnapshot};

/// Things the game layer (renderer, UI, sound) needs to react to.
///
/// Produced by [`PeerSession::tick`](crate::PeerSession::tick) and by the
/// local action methods; never required for correctness; a caller that
/// drops them only loses presentation, not sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The room directory changed (new room, updated player count).
    RoomsChanged,
    /// A guest connected to our hosted room.
    GuestConnected,
    /// The peer sent (or refreshed) its player snapshot.
    PeerInfo(PlayerSnapshot),
    Chat { nickname: String, text: String },
    /// The peer is gone; we are still hosting the room.
    PeerLeft,
    /// The host is gone; we took over the room on this port.
    HostMigrated { port: u16 },
    GameStarted,
    ClassSelected(PlayerClass),
    MapInitialized {
        seed: u64,
        stage: u32,
        host_x: i32,
        host_y: i32,
        width: u32,
        height: u32,
    },
    /// The peer's avatar moved on the map.
    RemoteMoved { x: i32, y: i32 },
    /// The peer started a battle we are part of.
    BattleStarted(MonsterSpawn),
    Battle(BattleEvent),
    ChestChanged { x: i32, y: i32, open: bool },
    TrapTriggered { x: i32, y: i32 },
    /// Bulk monster positions were applied.
    MonstersMoved,
    MonsterDied { x: i32, y: i32 },
}
