//! Transport layer for Delvelink.
//!
//! Owns the sockets and nothing else; no game semantics live here.
//!
//! - [`PeerListener`] / [`PeerLink`]: the single reliable, ordered,
//!   bidirectional stream between host and guest, with explicit
//!   length-prefixed framing so message boundaries never depend on how
//!   the OS batches reads.
//! - [`Advertiser`] / [`DiscoveryListener`]: the secondary UDP broadcast
//!   channel used to advertise and find rooms on the LAN.
//! - [`InboundQueue`]: the lock-protected queue that receive tasks push
//!   typed messages onto and the simulation tick drains.
//!
//! # Failure model
//!
//! Receive-task failures never surface as panics or errors into the
//! simulation: a clean EOF or any read error becomes a synthetic
//! [`Message::Disconnect`](delvelink_protocol::Message::Disconnect) on the
//! queue and the task exits. A frame that fails to decode is logged and
//! skipped; the connection stays up. A length prefix beyond
//! [`MAX_FRAME_LEN`] means the stream itself can no longer be trusted and
//! ends the connection like any read error.

mod discovery;
mod error;
mod framing;
mod peer;
mod queue;

pub use discovery::{Advertiser, DiscoveredRoom, DiscoveryListener};
pub use error::TransportError;
pub use framing::{read_frame, write_frame, MAX_FRAME_LEN};
pub use peer::{PeerLink, PeerListener};
pub use queue::InboundQueue;

use std::time::Duration;

/// Well-known UDP port rooms are advertised on.
pub const DISCOVERY_PORT: u16 = 37201;

/// Tunables for the transport layer.
///
/// The defaults match the design's timings; tests shrink them instead of
/// sleeping.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long an outbound connect may take before it fails.
    pub connect_timeout: Duration,
    /// Interval between room advertisement broadcasts while hosting.
    pub advertise_interval: Duration,
    /// UDP port used for room discovery.
    pub discovery_port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            advertise_interval: Duration::from_secs(1),
            discovery_port: DISCOVERY_PORT,
        }
    }
}
