//! Wire protocol for Delvelink.
//!
//! This crate defines the "language" that the two peers of a session speak:
//!
//! - **Types** ([`Message`], [`RoomAdvertisement`], [`PlayerSnapshot`],
//!   etc.): the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the session /
//! battle layers (game semantics). It doesn't know about sockets or turn
//! order; it only knows how to describe and serialize messages.
//!
//! ```text
//! Transport (frames) → Protocol (Message) → Session/Battle (game state)
//! ```
//!
//! Every message kind is a variant of the closed [`Message`] enum, each
//! carrying its own strongly typed payload. Decoding validates the payload
//! shape up front; there is no opaque per-kind string parsing downstream.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    EnemyActionKind, Message, MonsterId, MonsterPos, MonsterSpawn,
    PlayerActionKind, PlayerClass, PlayerSnapshot, RoomAdvertisement,
    DISCOVERY_PREFIX,
};
