//! Room directory and session lifecycle for Delvelink.
//!
//! This crate is the decision layer between discovery/transport and the
//! game: which rooms exist, what state this peer's session is in, and
//! what should happen when a peer disappears. It holds no sockets itself;
//! the service crate (`delvelink`) executes the directives these state
//! machines hand back, which keeps every transition unit-testable with no
//! network in sight.
//!
//! # Key types
//!
//! - [`RoomDirectory`]: deduplicated, staleness-pruned advertisements.
//! - [`SessionLifecycle`]: `Idle → Hosting ⇄ HostingWithGuest` and
//!   `Idle → Searching → Connecting → Connected`, including the
//!   host-migration decision when the host side of a session vanishes.
//! - [`JoinAttempt`]: the password-gated join flow for private rooms.

mod directory;
mod error;
mod join;
mod lifecycle;

pub use directory::{RoomDirectory, RoomListing};
pub use error::SessionError;
pub use join::{JoinAttempt, JoinStage};
pub use lifecycle::{
    PeerLossOutcome, RoomProfile, SessionLifecycle, SessionPhase,
};
