//! LAN room discovery over UDP broadcast.
//!
//! While hosting, an [`Advertiser`] task broadcasts the room's
//! advertisement once per interval; the payload is re-read on every send
//! so a player-count change shows up in the next broadcast without any
//! coordination (a single stale broadcast after a join is tolerated).
//!
//! A searching peer runs a [`DiscoveryListener`] that parses datagrams off
//! the discovery port and forwards them through a channel; the session
//! layer's directory does the deduplication and staleness pruning. No
//! ordering is guaranteed between this channel and the peer connection;
//! they are logically independent.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use delvelink_protocol::RoomAdvertisement;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::TransportError;

/// An advertisement received off the discovery port, with its origin.
#[derive(Debug, Clone)]
pub struct DiscoveredRoom {
    pub advert: RoomAdvertisement,
    pub from: SocketAddr,
}

// ---------------------------------------------------------------------------
// Advertiser
// ---------------------------------------------------------------------------

/// Periodic room advertisement broadcaster. One per hosting session.
///
/// Dropping (or [`stop`](Self::stop)ping) the advertiser ends the
/// broadcasts; there is no "room closed" datagram; listeners age entries
/// out instead.
pub struct Advertiser {
    advert: Arc<Mutex<RoomAdvertisement>>,
    task: JoinHandle<()>,
}

impl Advertiser {
    /// Starts broadcasting to the LAN on the given discovery port.
    pub async fn start(
        advert: RoomAdvertisement,
        interval: std::time::Duration,
        discovery_port: u16,
    ) -> Result<Self, TransportError> {
        let target = SocketAddr::from((Ipv4Addr::BROADCAST, discovery_port));
        Self::start_with_target(advert, interval, target, true).await
    }

    /// Starts broadcasting to an explicit target address.
    ///
    /// Loopback targets (used by tests and single-machine setups) skip
    /// the broadcast socket option.
    pub async fn start_with_target(
        advert: RoomAdvertisement,
        interval: std::time::Duration,
        target: SocketAddr,
        broadcast: bool,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(TransportError::BindFailed)?;
        if broadcast {
            socket
                .set_broadcast(true)
                .map_err(TransportError::BindFailed)?;
        }

        let advert = Arc::new(Mutex::new(advert));
        let shared = Arc::clone(&advert);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Skip,
            );
            loop {
                ticker.tick().await;
                let snapshot =
                    shared.lock().expect("advert lock poisoned").clone();
                let datagram = match snapshot.to_datagram() {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::error!(error = %e, "advert encode failed");
                        continue;
                    }
                };
                if let Err(e) = socket.send_to(&datagram, target).await {
                    tracing::debug!(error = %e, "advert broadcast failed");
                }
            }
        });

        tracing::info!(%target, "room advertisement started");
        Ok(Self { advert, task })
    }

    /// Updates the advertised player count in place. Takes effect on the
    /// next broadcast.
    pub fn set_players(&self, players: u8) {
        self.advert.lock().expect("advert lock poisoned").players =
            players;
    }

    /// Current advertisement contents.
    pub fn advert(&self) -> RoomAdvertisement {
        self.advert.lock().expect("advert lock poisoned").clone()
    }

    /// Stops broadcasting. Idempotent.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Advertiser {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// DiscoveryListener
// ---------------------------------------------------------------------------

/// Receive-only listener on the discovery port.
///
/// Parsed advertisements are forwarded through the channel handed to
/// [`start`](Self::start); untagged datagrams are ignored, tagged but
/// malformed ones are logged and dropped.
pub struct DiscoveryListener {
    local_port: u16,
    task: JoinHandle<()>,
}

impl DiscoveryListener {
    /// Binds the discovery port (0 = ephemeral, for tests) and starts
    /// forwarding advertisements into `sink`.
    pub async fn start(
        port: u16,
        sink: mpsc::UnboundedSender<DiscoveredRoom>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(TransportError::BindFailed)?;
        let local_port = socket
            .local_addr()
            .map_err(TransportError::BindFailed)?
            .port();

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "discovery recv failed");
                        continue;
                    }
                };
                match RoomAdvertisement::from_datagram(&buf[..len]) {
                    Ok(Some(advert)) => {
                        if sink
                            .send(DiscoveredRoom { advert, from })
                            .is_err()
                        {
                            // Directory gone; discovery is over.
                            break;
                        }
                    }
                    Ok(None) => {} // foreign traffic on the port
                    Err(e) => {
                        tracing::debug!(
                            %from,
                            error = %e,
                            "malformed advertisement dropped"
                        );
                    }
                }
            }
        });

        tracing::info!(port = local_port, "room discovery listening");
        Ok(Self { local_port, task })
    }

    /// The UDP port actually bound.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Stops listening. Idempotent.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for DiscoveryListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
