use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reservation::ReservationDraft;
use crate::domain::room::{Room, RoomId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display label for where a dialog currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    CollectingInfo,
    SelectingRoom,
    NoRoomAvailable,
    ReadyToConfirm,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectingInfo => "collecting_info",
            Self::SelectingRoom => "selecting_room",
            Self::NoRoomAvailable => "no_room_available",
            Self::ReadyToConfirm => "ready_to_confirm",
        }
    }
}

/// One in-flight booking dialog. Unset fields are what the dialog still has to ask for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSession {
    pub id: SessionId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub organizer: Option<String>,
    /// `None` until the requester answers, even if the answer is an empty list.
    pub participants: Option<Vec<String>>,
    pub min_capacity: Option<u32>,
    pub room_id: Option<RoomId>,
    /// `None` until computed for the current start/end/capacity values.
    pub available_rooms: Option<Vec<Room>>,
    pub step: SessionStep,
    pub created_at: DateTime<Utc>,
}

impl ReservationSession {
    pub fn new(id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: None,
            description: None,
            start: None,
            end: None,
            organizer: None,
            participants: None,
            min_capacity: None,
            room_id: None,
            available_rooms: None,
            step: SessionStep::CollectingInfo,
            created_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.created_at < now - max_age
    }

    /// Drops the chosen room together with the candidate list it was picked from.
    pub fn invalidate_room_choice(&mut self) {
        self.room_id = None;
        self.available_rooms = None;
    }

    pub fn chosen_room(&self) -> Option<&Room> {
        let room_id = self.room_id?;
        self.available_rooms.as_ref()?.iter().find(|room| room.id == room_id)
    }

    pub fn to_draft(&self) -> Option<ReservationDraft> {
        Some(ReservationDraft {
            room_id: self.room_id?,
            title: self.title.clone()?,
            description: self.description.clone().unwrap_or_default(),
            start: self.start?,
            end: self.end?,
            organizer: self.organizer.clone()?,
            participants: self.participants.clone()?,
        })
    }
}
