//! The room directory: what's currently advertised on the LAN.
//!
//! Advertisements arrive roughly once per second per room; the directory
//! deduplicates them by (host name, title, port) and ages entries out
//! when broadcasts stop, since there is no "room closed" datagram.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use delvelink_protocol::RoomAdvertisement;
use delvelink_transport::DiscoveredRoom;

/// How long an entry lives without a fresh broadcast before it's pruned.
/// Five missed broadcasts at the 1 Hz advertise rate.
pub const STALE_AFTER: Duration = Duration::from_secs(5);

/// A directory entry as shown to the player.
#[derive(Debug, Clone)]
pub struct RoomListing {
    pub advert: RoomAdvertisement,
    /// Where the advertisement came from. The connect target combines
    /// this address with the advertised game port.
    pub from: SocketAddr,
    pub last_seen: Instant,
}

impl RoomListing {
    /// The address to actually connect to: the datagram's source IP with
    /// the advertised game port. More reliable than the self-reported
    /// address when the host has several interfaces.
    pub fn connect_addr(&self) -> SocketAddr {
        SocketAddr::new(self.from.ip(), self.advert.port)
    }
}

/// Deduplicated set of advertised rooms.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    entries: HashMap<(String, String, u16), RoomListing>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or refreshes) an advertisement.
    pub fn observe(&mut self, discovered: DiscoveredRoom, now: Instant) {
        let key = discovered.advert.dedup_key();
        let listing = RoomListing {
            advert: discovered.advert,
            from: discovered.from,
            last_seen: now,
        };
        if self.entries.insert(key, listing).is_none() {
            tracing::debug!(count = self.entries.len(), "new room discovered");
        }
    }

    /// Drops entries that haven't re-broadcast within [`STALE_AFTER`].
    pub fn prune(&mut self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, listing| {
            now.duration_since(listing.last_seen) < STALE_AFTER
        });
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, "stale rooms pruned");
        }
    }

    /// Current listings, freshest first.
    pub fn rooms(&self) -> Vec<RoomListing> {
        let mut rooms: Vec<_> = self.entries.values().cloned().collect();
        rooms.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        rooms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets everything. Called when discovery stops.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovered(host: &str, title: &str, port: u16) -> DiscoveredRoom {
        DiscoveredRoom {
            advert: RoomAdvertisement {
                title: title.into(),
                host_name: host.into(),
                is_private: false,
                password: None,
                players: 1,
                max_players: 2,
                addr: "192.168.0.7".into(),
                port,
            },
            from: "192.168.0.7:50000".parse().unwrap(),
        }
    }

    #[test]
    fn test_rebroadcast_deduplicates() {
        let mut dir = RoomDirectory::new();
        let now = Instant::now();
        dir.observe(discovered("bran", "crypt", 40021), now);
        dir.observe(discovered("bran", "crypt", 40021), now);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_distinct_rooms_coexist() {
        let mut dir = RoomDirectory::new();
        let now = Instant::now();
        dir.observe(discovered("bran", "crypt", 40021), now);
        dir.observe(discovered("mira", "crypt", 40021), now);
        dir.observe(discovered("bran", "crypt", 40022), now);
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn test_rebroadcast_refreshes_player_count() {
        let mut dir = RoomDirectory::new();
        let now = Instant::now();
        dir.observe(discovered("bran", "crypt", 40021), now);

        let mut updated = discovered("bran", "crypt", 40021);
        updated.advert.players = 2;
        dir.observe(updated, now);

        assert_eq!(dir.rooms()[0].advert.players, 2);
    }

    #[test]
    fn test_prune_drops_silent_rooms() {
        let mut dir = RoomDirectory::new();
        let start = Instant::now();
        dir.observe(discovered("bran", "crypt", 40021), start);
        dir.observe(
            discovered("mira", "cellar", 40022),
            start + STALE_AFTER,
        );

        dir.prune(start + STALE_AFTER + Duration::from_millis(1));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.rooms()[0].advert.host_name, "mira");
    }

    #[test]
    fn test_connect_addr_uses_datagram_source_ip() {
        let mut dir = RoomDirectory::new();
        dir.observe(discovered("bran", "crypt", 40021), Instant::now());
        let listing = &dir.rooms()[0];
        assert_eq!(
            listing.connect_addr(),
            "192.168.0.7:40021".parse().unwrap()
        );
    }

    #[test]
    fn test_clear_empties_directory() {
        let mut dir = RoomDirectory::new();
        dir.observe(discovered("bran", "crypt", 40021), Instant::now());
        dir.clear();
        assert!(dir.is_empty());
    }
}
