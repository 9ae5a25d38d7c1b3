//! The session lifecycle state machine.
//!
//! Two legs share one machine, because host migration crosses between
//! them:
//!
//! ```text
//! Idle → Hosting ⇄ HostingWithGuest → Idle         (host leg)
//! Idle → Searching → Connecting → Connected → Idle  (guest leg)
//! ```
//!
//! On peer loss the machine decides, it does not act: the service layer
//! receives a [`PeerLossOutcome`] and performs the socket work. The
//! important rule is that losing a peer is a *state change*, never an
//! error; a hosting peer keeps its room open for the next guest, and a
//! connected guest migrates into being the host of the same room.

use crate::SessionError;

/// Title, privacy, and password of the room this session belongs to.
/// Kept across migration so the new host re-advertises the same room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomProfile {
    pub title: String,
    pub host_name: String,
    pub is_private: bool,
    pub password: Option<String>,
}

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session. Discovery may or may not be running.
    Idle,
    /// Advertising a room, accept armed, no guest yet.
    Hosting,
    /// Advertising a room with a connected guest.
    HostingWithGuest,
    /// Browsing the room directory.
    Searching,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected to a host as guest.
    Connected,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Hosting => "Hosting",
            Self::HostingWithGuest => "HostingWithGuest",
            Self::Searching => "Searching",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        };
        write!(f, "{name}")
    }
}

/// What the service layer must do after a peer loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerLossOutcome {
    /// We were hosting; the room persists. Drop the dead link, clear the
    /// guest's world locks, and re-arm accept.
    KeepHosting,
    /// We were the guest; migrate. Bind a listener, advertise this
    /// profile, and wait for a new guest.
    BecomeHost(RoomProfile),
    /// The loss happened outside a session (already Idle). Nothing to do.
    Nothing,
}

/// The session lifecycle state machine. One per process.
#[derive(Debug)]
pub struct SessionLifecycle {
    phase: SessionPhase,
    /// The room this session belongs to, as host or guest. Survives into
    /// migration.
    room: Option<RoomProfile>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self { phase: SessionPhase::Idle, room: None }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn room(&self) -> Option<&RoomProfile> {
        self.room.as_ref()
    }

    // -- Host leg --------------------------------------------------------

    /// `Idle → Hosting`.
    pub fn start_hosting(
        &mut self,
        profile: RoomProfile,
    ) -> Result<(), SessionError> {
        self.expect(SessionPhase::Idle, "start_hosting")?;
        tracing::info!(title = %profile.title, "hosting room");
        self.room = Some(profile);
        self.phase = SessionPhase::Hosting;
        Ok(())
    }

    /// `Hosting → HostingWithGuest`. A guest arriving while one is
    /// already connected replaces it; the machine stays in
    /// `HostingWithGuest` and the service layer swaps the links.
    pub fn guest_joined(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Hosting => {
                self.phase = SessionPhase::HostingWithGuest;
                Ok(())
            }
            SessionPhase::HostingWithGuest => {
                tracing::info!("new guest replaces the previous one");
                Ok(())
            }
            other => Err(SessionError::InvalidTransition(format!(
                "guest_joined in phase {other}"
            ))),
        }
    }

    /// Host explicitly closes the room: `Hosting* → Idle`.
    pub fn stop_hosting(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Hosting | SessionPhase::HostingWithGuest => {
                self.phase = SessionPhase::Idle;
                self.room = None;
                Ok(())
            }
            other => Err(SessionError::InvalidTransition(format!(
                "stop_hosting in phase {other}"
            ))),
        }
    }

    // -- Guest leg -------------------------------------------------------

    /// `Idle → Searching`.
    pub fn start_search(&mut self) -> Result<(), SessionError> {
        self.expect(SessionPhase::Idle, "start_search")?;
        self.phase = SessionPhase::Searching;
        Ok(())
    }

    /// `Searching → Connecting`. Remembers the target room's profile so
    /// migration can reproduce it later.
    pub fn begin_connect(
        &mut self,
        profile: RoomProfile,
    ) -> Result<(), SessionError> {
        self.expect(SessionPhase::Searching, "begin_connect")?;
        self.room = Some(profile);
        self.phase = SessionPhase::Connecting;
        Ok(())
    }

    /// `Connecting → Connected`.
    pub fn connected(&mut self) -> Result<(), SessionError> {
        self.expect(SessionPhase::Connecting, "connected")?;
        self.phase = SessionPhase::Connected;
        Ok(())
    }

    /// A connect attempt failed: back to `Searching`, no side effects;
    /// the room stays selectable and the directory untouched.
    pub fn connect_failed(&mut self) -> Result<(), SessionError> {
        self.expect(SessionPhase::Connecting, "connect_failed")?;
        self.phase = SessionPhase::Searching;
        self.room = None;
        Ok(())
    }

    /// Guest leaves on purpose: `Searching|Connected → Idle`.
    pub fn leave(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Searching | SessionPhase::Connected => {
                self.phase = SessionPhase::Idle;
                self.room = None;
                Ok(())
            }
            other => Err(SessionError::InvalidTransition(format!(
                "leave in phase {other}"
            ))),
        }
    }

    // -- Peer loss -------------------------------------------------------

    /// The connection died (synthetic `Disconnect` drained from the
    /// queue). Decides what the service layer must do next.
    pub fn peer_lost(&mut self, local_name: &str) -> PeerLossOutcome {
        match self.phase {
            SessionPhase::HostingWithGuest => {
                tracing::info!("guest lost; room stays open");
                self.phase = SessionPhase::Hosting;
                PeerLossOutcome::KeepHosting
            }
            SessionPhase::Connected => {
                // Host migration: same room, new owner.
                let mut profile = self.room.clone().unwrap_or_else(|| {
                    // Connected without a profile shouldn't happen; fall
                    // back to an unnamed room rather than refusing to
                    // migrate.
                    RoomProfile {
                        title: "migrated room".into(),
                        host_name: String::new(),
                        is_private: false,
                        password: None,
                    }
                });
                profile.host_name = local_name.to_string();
                tracing::info!(
                    title = %profile.title,
                    "host lost; migrating to host role"
                );
                self.phase = SessionPhase::Hosting;
                self.room = Some(profile.clone());
                PeerLossOutcome::BecomeHost(profile)
            }
            _ => PeerLossOutcome::Nothing,
        }
    }

    fn expect(
        &self,
        phase: SessionPhase,
        op: &str,
    ) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition(format!(
                "{op} in phase {}",
                self.phase
            )))
        }
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(title: &str, host: &str) -> RoomProfile {
        RoomProfile {
            title: title.into(),
            host_name: host.into(),
            is_private: true,
            password: Some("hunter2".into()),
        }
    }

    #[test]
    fn test_host_leg_happy_path() {
        let mut lc = SessionLifecycle::new();
        lc.start_hosting(profile("crypt", "bran")).unwrap();
        assert_eq!(lc.phase(), SessionPhase::Hosting);

        lc.guest_joined().unwrap();
        assert_eq!(lc.phase(), SessionPhase::HostingWithGuest);

        lc.stop_hosting().unwrap();
        assert_eq!(lc.phase(), SessionPhase::Idle);
        assert!(lc.room().is_none());
    }

    #[test]
    fn test_guest_leg_happy_path() {
        let mut lc = SessionLifecycle::new();
        lc.start_search().unwrap();
        lc.begin_connect(profile("crypt", "bran")).unwrap();
        assert_eq!(lc.phase(), SessionPhase::Connecting);
        lc.connected().unwrap();
        assert_eq!(lc.phase(), SessionPhase::Connected);
        lc.leave().unwrap();
        assert_eq!(lc.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_guest_loss_keeps_room_open() {
        let mut lc = SessionLifecycle::new();
        lc.start_hosting(profile("crypt", "bran")).unwrap();
        lc.guest_joined().unwrap();

        assert_eq!(lc.peer_lost("bran"), PeerLossOutcome::KeepHosting);
        assert_eq!(lc.phase(), SessionPhase::Hosting);
        assert!(lc.room().is_some(), "room must persist for a new guest");
    }

    #[test]
    fn test_host_loss_migrates_guest_to_host() {
        let mut lc = SessionLifecycle::new();
        lc.start_search().unwrap();
        lc.begin_connect(profile("crypt", "bran")).unwrap();
        lc.connected().unwrap();

        match lc.peer_lost("mira") {
            PeerLossOutcome::BecomeHost(p) => {
                // Same room identity, new owner.
                assert_eq!(p.title, "crypt");
                assert_eq!(p.password.as_deref(), Some("hunter2"));
                assert_eq!(p.host_name, "mira");
            }
            other => panic!("expected migration, got {other:?}"),
        }
        assert_eq!(lc.phase(), SessionPhase::Hosting);
    }

    #[test]
    fn test_replacement_guest_keeps_phase() {
        let mut lc = SessionLifecycle::new();
        lc.start_hosting(profile("crypt", "bran")).unwrap();
        lc.guest_joined().unwrap();
        // Second accept while occupied: still HostingWithGuest.
        lc.guest_joined().unwrap();
        assert_eq!(lc.phase(), SessionPhase::HostingWithGuest);
    }

    #[test]
    fn test_connect_failed_returns_to_searching() {
        let mut lc = SessionLifecycle::new();
        lc.start_search().unwrap();
        lc.begin_connect(profile("crypt", "bran")).unwrap();
        lc.connect_failed().unwrap();
        assert_eq!(lc.phase(), SessionPhase::Searching);
    }

    #[test]
    fn test_peer_loss_when_idle_is_nothing() {
        let mut lc = SessionLifecycle::new();
        assert_eq!(lc.peer_lost("bran"), PeerLossOutcome::Nothing);
    }

    #[test]
    fn test_invalid_transitions_error() {
        let mut lc = SessionLifecycle::new();
        assert!(lc.guest_joined().is_err());
        assert!(lc.connected().is_err());
        lc.start_hosting(profile("crypt", "bran")).unwrap();
        assert!(lc.start_search().is_err());
        assert!(lc.start_hosting(profile("other", "bran")).is_err());
    }
}
