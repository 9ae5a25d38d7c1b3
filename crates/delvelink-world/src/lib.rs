//! World and object synchronization for Delvelink.
//!
//! The lighter-weight side of the sync core: monster positions, trap and
//! chest state, player stat snapshots, and the busy-locks that keep both
//! peers from opening the same chest at once.
//!
//! Everything here is defensive by construction. A message referencing an
//! object this peer doesn't know about (a chest coordinate it never saw, a
//! monster that already died locally) is resolved by best-effort matching
//! and otherwise dropped with a debug log; an earlier lost packet must
//! degrade into a small visual inconsistency, never a crash.
//!
//! # Mutation model
//!
//! All state in this crate is mutated from the simulation task only, via
//! message handlers or local interaction calls. Methods that change
//! network-visible state return the [`Message`](delvelink_protocol::Message)s
//! the caller must send; this crate never touches the transport itself.

mod monsters;
mod objects;
mod players;

pub use monsters::MonsterBook;
pub use objects::{LockOwner, ObjectBoard};
pub use players::PartyRoster;
