use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::room::RoomId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationId(pub i64);

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully populated request to book a room, prior to the conflict-checked commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDraft {
    pub room_id: RoomId,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub organizer: String,
    pub participants: Vec<String>,
}

impl ReservationDraft {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub organizer: String,
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn from_draft(id: ReservationId, draft: ReservationDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            room_id: draft.room_id,
            title: draft.title,
            description: draft.description,
            start: draft.start,
            end: draft.end,
            organizer: draft.organizer,
            participants: draft.participants,
            created_at,
        }
    }

    pub fn duration_hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && self.end > at
    }

    /// Participants followed by the organizer, without duplicates.
    pub fn all_attendees(&self) -> Vec<String> {
        let mut attendees = Vec::with_capacity(self.participants.len() + 1);
        for address in self.participants.iter().chain(std::iter::once(&self.organizer)) {
            if !attendees.contains(address) {
                attendees.push(address.clone());
            }
        }
        attendees
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStatistics {
    pub total_reservations: u64,
    pub today_reservations: u64,
}
