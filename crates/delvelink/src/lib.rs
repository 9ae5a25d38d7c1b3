//! # Delvelink
//!
//! LAN co-op synchronization core for a two-player, turn-based dungeon
//! crawler: one host, one guest, one persistent TCP link, plus a UDP
//! broadcast channel for room discovery.
//!
//! The meta-crate ties the layers together behind one service object,
//! [`PeerSession`]: transport → protocol → session → battle/world. The
//! game loop drives it with [`PeerSession::tick`] and reacts to the
//! [`SessionEvent`]s it returns.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use delvelink::{PeerSession, SessionConfig};
//! use delvelink_protocol::{PlayerClass, PlayerSnapshot};
//! use delvelink_session::RoomProfile;
//!
//! # async fn run() -> Result<(), delvelink::DelvelinkError> {
//! let me = PlayerSnapshot {
//!     id: 0,
//!     nickname: "ash".into(),
//!     class: PlayerClass::Warrior,
//!     hp: 40,
//!     max_hp: 40,
//!     def: 5,
//!     dex: 12,
//!     is_host: true,
//! };
//! let mut session = PeerSession::new(me, 10, SessionConfig::default());
//! session
//!     .host_room(
//!         RoomProfile {
//!             title: "the crypt".into(),
//!             host_name: "ash".into(),
//!             is_private: false,
//!             password: None,
//!         },
//!         0,
//!     )
//!     .await?;
//! loop {
//!     let events = session.tick(std::time::Instant::now()).await?;
//!     for event in events {
//!         // feed the renderer
//!         let _ = event;
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//! }
//! # }
//! ```

mod error;
mod event;
mod handler;
mod service;

pub use error::DelvelinkError;
pub use event::SessionEvent;
pub use service::{PeerSession, SessionConfig};

// The sub-crates, re-exported for callers that need their types.
pub use delvelink_battle as battle;
pub use delvelink_protocol as protocol;
pub use delvelink_session as session;
pub use delvelink_transport as transport;
pub use delvelink_world as world;
