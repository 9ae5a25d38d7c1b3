//! The password-gated join flow for a single room.
//!
//! ```text
//! InfoRequested → (RoomInfoResponse) → ReadyToConnect        (public)
//!                                    → PasswordPrompt ⟲      (private)
//! PasswordPrompt → (correct password) → ReadyToConnect
//! ```
//!
//! A wrong password loops back to the prompt; it never tears anything
//! down, and the attempt counter exists only for the UI.

use delvelink_protocol::{Message, RoomAdvertisement};

use crate::SessionError;

/// Where a join attempt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinStage {
    /// `RoomInfoRequest` sent, waiting for the response.
    InfoRequested,
    /// The room is private; waiting for the player to type a password.
    PasswordPrompt { attempts: u32 },
    /// Cleared to open the game connection.
    ReadyToConnect,
}

/// One attempt to join one room.
#[derive(Debug)]
pub struct JoinAttempt {
    stage: JoinStage,
    room: Option<RoomAdvertisement>,
}

impl JoinAttempt {
    /// Starts the flow. Returns the attempt and the `RoomInfoRequest`
    /// the caller must send to the prospective host.
    pub fn start() -> (Self, Message) {
        (
            Self { stage: JoinStage::InfoRequested, room: None },
            Message::RoomInfoRequest,
        )
    }

    pub fn stage(&self) -> &JoinStage {
        &self.stage
    }

    /// The room info received so far.
    pub fn room(&self) -> Option<&RoomAdvertisement> {
        self.room.as_ref()
    }

    /// Feeds the host's `RoomInfoResponse` in.
    pub fn on_room_info(
        &mut self,
        room: RoomAdvertisement,
    ) -> Result<&JoinStage, SessionError> {
        if self.stage != JoinStage::InfoRequested {
            return Err(SessionError::JoinOutOfOrder(
                "room info after the info stage".into(),
            ));
        }
        self.stage = if room.is_private {
            JoinStage::PasswordPrompt { attempts: 0 }
        } else {
            JoinStage::ReadyToConnect
        };
        self.room = Some(room);
        Ok(&self.stage)
    }

    /// Checks an entered password against the room's.
    ///
    /// On mismatch the flow stays at the prompt (attempt counter bumped)
    /// and `Err(WrongPassword)` tells the UI to re-prompt.
    pub fn submit_password(
        &mut self,
        entered: &str,
    ) -> Result<&JoinStage, SessionError> {
        let JoinStage::PasswordPrompt { attempts } = self.stage else {
            return Err(SessionError::JoinOutOfOrder(
                "password outside the prompt stage".into(),
            ));
        };
        let expected = self
            .room
            .as_ref()
            .and_then(|r| r.password.as_deref())
            .unwrap_or("");

        if entered == expected {
            self.stage = JoinStage::ReadyToConnect;
            Ok(&self.stage)
        } else {
            self.stage =
                JoinStage::PasswordPrompt { attempts: attempts + 1 };
            Err(SessionError::WrongPassword)
        }
    }
}
