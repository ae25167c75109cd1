use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::reservation::Reservation;
use crate::domain::room::{Room, RoomStatus};

/// Half-open `[start, end)` overlap test. Touching windows do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSearchCriteria {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_capacity: u32,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

impl RoomSearchCriteria {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, min_capacity: u32) -> Self {
        Self { start, end, min_capacity, location: None, equipment: Vec::new() }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_equipment<I, S>(mut self, equipment: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equipment = equipment.into_iter().map(Into::into).collect();
        self
    }

    /// Static room attributes only; reservations are checked separately.
    pub fn matches_room(&self, room: &Room) -> bool {
        room.status == RoomStatus::Available
            && room.capacity >= self.min_capacity
            && self.location.as_deref().map_or(true, |location| room.location.contains(location))
            && self.equipment.iter().all(|token| room.has_equipment(token))
    }

    pub fn conflicts_with(&self, reservation: &Reservation) -> bool {
        overlaps(reservation.start, reservation.end, self.start, self.end)
    }
}

/// Smallest sufficient room first, ties broken by name.
pub fn sort_candidates(rooms: &mut [Room]) {
    rooms.sort_by(|a, b| a.capacity.cmp(&b.capacity).then_with(|| a.name.cmp(&b.name)));
}

/// Applies the full availability rule to an in-memory snapshot of rooms and reservations.
pub fn filter_available<'a, I>(
    rooms: I,
    reservations: &[Reservation],
    criteria: &RoomSearchCriteria,
) -> Vec<Room>
where
    I: IntoIterator<Item = &'a Room>,
{
    let mut candidates = rooms
        .into_iter()
        .filter(|room| criteria.matches_room(room))
        .filter(|room| {
            !reservations
                .iter()
                .any(|reservation| reservation.room_id == room.id && criteria.conflicts_with(reservation))
        })
        .cloned()
        .collect::<Vec<_>>();
    sort_candidates(&mut candidates);
    candidates
}
