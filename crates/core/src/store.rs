//! Collaborator contracts consumed by the booking core, with in-memory implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::booking::availability::{filter_available, overlaps, RoomSearchCriteria};
use crate::domain::reservation::{Reservation, ReservationDraft, ReservationId};
use crate::domain::room::{Room, RoomId, RoomStatus};
use crate::domain::session::{ReservationSession, SessionId};
use crate::errors::StoreError;

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Rooms matching `criteria` with no reservation overlapping its window,
    /// ordered by capacity then name.
    async fn find_candidate_rooms(
        &self,
        criteria: &RoomSearchCriteria,
    ) -> Result<Vec<Room>, StoreError>;

    /// Rooms whose id equals `token` when it is numeric, otherwise whose name contains it.
    async fn rooms_by_identifier_or_name(&self, token: &str) -> Result<Vec<Room>, StoreError>;

    /// Re-checks overlap on the target room and inserts in one atomic step.
    async fn commit_reservation(
        &self,
        draft: &ReservationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<ReservationId, StoreError>;

    async fn cancel_reservation(&self, id: ReservationId) -> Result<bool, StoreError>;

    async fn reservations_overlapping(
        &self,
        room_id: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError>;

    /// Stored statuses; callers derive the effective status.
    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;

    async fn update_room_status(&self, id: RoomId, status: RoomStatus)
        -> Result<bool, StoreError>;

    /// Rooms with a reservation whose window contains `at`.
    async fn rooms_in_use_at(&self, at: DateTime<Utc>) -> Result<Vec<RoomId>, StoreError>;

    async fn get_reservation(&self, id: ReservationId)
        -> Result<Option<Reservation>, StoreError>;

    /// Reservations for one room ordered by start, optionally bounded to those
    /// overlapping `[from, to)`.
    async fn room_reservations(
        &self,
        room_id: RoomId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Number of reservations starting within `[from, to)`, or all of them when unbounded.
    async fn count_reservations(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<ReservationSession>, StoreError>;
    async fn put(&self, session: &ReservationSession) -> Result<(), StoreError>;
    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;
    /// Sessions created strictly before `cutoff`.
    async fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>, StoreError>;
}

#[derive(Default)]
struct BookingState {
    rooms: Vec<Room>,
    reservations: Vec<Reservation>,
    next_reservation_id: i64,
}

impl BookingState {
    fn overlapping(&self, room_id: RoomId, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Reservation> {
        let mut found = self
            .reservations
            .iter()
            .filter(|reservation| {
                reservation.room_id == room_id
                    && overlaps(reservation.start, reservation.end, start, end)
            })
            .cloned()
            .collect::<Vec<_>>();
        found.sort_by_key(|reservation| reservation.start);
        found
    }
}

/// Single-lock store. Holding the write lock across check and insert makes commits atomic.
#[derive(Default)]
pub struct InMemoryBookingStore {
    state: RwLock<BookingState>,
}

impl InMemoryBookingStore {
    pub fn with_rooms(rooms: Vec<Room>) -> Self {
        Self {
            state: RwLock::new(BookingState {
                rooms,
                reservations: Vec::new(),
                next_reservation_id: 0,
            }),
        }
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_candidate_rooms(
        &self,
        criteria: &RoomSearchCriteria,
    ) -> Result<Vec<Room>, StoreError> {
        let state = self.state.read().await;
        Ok(filter_available(&state.rooms, &state.reservations, criteria))
    }

    async fn rooms_by_identifier_or_name(&self, token: &str) -> Result<Vec<Room>, StoreError> {
        let token = token.trim();
        let state = self.state.read().await;
        let matches = match token.parse::<i64>() {
            Ok(id) => state.rooms.iter().filter(|room| room.id == RoomId(id)).cloned().collect(),
            Err(_) => state.rooms.iter().filter(|room| room.name.contains(token)).cloned().collect(),
        };
        Ok(matches)
    }

    async fn commit_reservation(
        &self,
        draft: &ReservationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<ReservationId, StoreError> {
        let mut state = self.state.write().await;
        if !state.overlapping(draft.room_id, draft.start, draft.end).is_empty() {
            return Err(StoreError::Conflict { room_id: draft.room_id });
        }

        state.next_reservation_id += 1;
        let id = ReservationId(state.next_reservation_id);
        state.reservations.push(Reservation::from_draft(id, draft.clone(), created_at));
        Ok(id)
    }

    async fn cancel_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.reservations.len();
        state.reservations.retain(|reservation| reservation.id != id);
        Ok(state.reservations.len() != before)
    }

    async fn reservations_overlapping(
        &self,
        room_id: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.state.read().await.overlapping(room_id, start, end))
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        let state = self.state.read().await;
        Ok(state.rooms.iter().find(|room| room.id == id).cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.state.read().await.rooms.clone())
    }

    async fn update_room_status(
        &self,
        id: RoomId,
        status: RoomStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.rooms.iter_mut().find(|room| room.id == id) {
            Some(room) => {
                room.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rooms_in_use_at(&self, at: DateTime<Utc>) -> Result<Vec<RoomId>, StoreError> {
        let state = self.state.read().await;
        let mut ids = state
            .reservations
            .iter()
            .filter(|reservation| reservation.is_active_at(at))
            .map(|reservation| reservation.room_id)
            .collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.reservations.iter().find(|reservation| reservation.id == id).cloned())
    }

    async fn room_reservations(
        &self,
        room_id: RoomId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let state = self.state.read().await;
        let mut found = state
            .reservations
            .iter()
            .filter(|reservation| reservation.room_id == room_id)
            .filter(|reservation| from.map_or(true, |from| reservation.end > from))
            .filter(|reservation| to.map_or(true, |to| reservation.start < to))
            .cloned()
            .collect::<Vec<_>>();
        found.sort_by_key(|reservation| reservation.start);
        Ok(found)
    }

    async fn count_reservations(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError> {
        let state = self.state.read().await;
        let count = state
            .reservations
            .iter()
            .filter(|reservation| from.map_or(true, |from| reservation.start >= from))
            .filter(|reservation| to.map_or(true, |to| reservation.start < to))
            .count();
        Ok(count as u64)
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, ReservationSession>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<ReservationSession>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, session: &ReservationSession) -> Result<(), StoreError> {
        self.sessions.write().await.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut expired = sessions
            .values()
            .filter(|session| session.created_at < cutoff)
            .map(|session| session.id.clone())
            .collect::<Vec<_>>();
        expired.sort();
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{BookingStore, InMemoryBookingStore, InMemorySessionStore, SessionStore};
    use crate::booking::availability::RoomSearchCriteria;
    use crate::domain::reservation::ReservationDraft;
    use crate::domain::room::{Room, RoomId, RoomStatus};
    use crate::domain::session::{ReservationSession, SessionId};
    use crate::errors::StoreError;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, hour, 0, 0).unwrap()
    }

    fn room(id: i64, name: &str, capacity: u32) -> Room {
        Room {
            id: RoomId(id),
            name: name.to_string(),
            capacity,
            location: "2층".to_string(),
            equipment: "TV".to_string(),
            status: RoomStatus::Available,
        }
    }

    fn draft(room_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> ReservationDraft {
        ReservationDraft {
            room_id: RoomId(room_id),
            title: "Sync".to_string(),
            description: String::new(),
            start,
            end,
            organizer: "alice@x.com".to_string(),
            participants: Vec::new(),
        }
    }

    #[tokio::test]
    async fn commit_rejects_overlap_on_the_same_room_only() {
        let store = InMemoryBookingStore::with_rooms(vec![room(1, "A", 4), room(2, "B", 4)]);

        let first = store.commit_reservation(&draft(1, at(9), at(10)), at(0)).await;
        assert!(first.is_ok());
        assert_eq!(
            store.commit_reservation(&draft(1, at(9), at(11)), at(0)).await,
            Err(StoreError::Conflict { room_id: RoomId(1) })
        );
        assert!(store.commit_reservation(&draft(2, at(9), at(11)), at(0)).await.is_ok());
        assert!(store.commit_reservation(&draft(1, at(10), at(11)), at(0)).await.is_ok());
        assert_eq!(store.reservation_count().await, 3);
    }

    #[tokio::test]
    async fn touching_reservation_leaves_room_available() {
        let store = InMemoryBookingStore::with_rooms(vec![room(1, "A", 4)]);
        store.commit_reservation(&draft(1, at(9), at(10)), at(0)).await.expect("commit");

        let candidates = store
            .find_candidate_rooms(&RoomSearchCriteria::new(at(10), at(11), 2))
            .await
            .expect("search");
        assert_eq!(candidates.len(), 1);
        assert!(store.reservations_overlapping(RoomId(1), at(10), at(11)).await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn lookup_by_identifier_or_name_fragment() {
        let store =
            InMemoryBookingStore::with_rooms(vec![room(1, "소회의실 A", 4), room(2, "대회의실", 12)]);

        let by_id = store.rooms_by_identifier_or_name("2").await.expect("lookup");
        assert_eq!(by_id.iter().map(|room| room.id).collect::<Vec<_>>(), vec![RoomId(2)]);
        let by_name = store.rooms_by_identifier_or_name("회의실").await.expect("lookup");
        assert_eq!(by_name.len(), 2);
    }

    #[tokio::test]
    async fn cancel_and_statistics_reflect_stored_reservations() {
        let store = InMemoryBookingStore::with_rooms(vec![room(1, "A", 4)]);
        let id = store.commit_reservation(&draft(1, at(9), at(10)), at(0)).await.expect("commit");
        store
            .commit_reservation(&draft(1, at(9) + Duration::days(1), at(10) + Duration::days(1)), at(0))
            .await
            .expect("commit");

        assert_eq!(store.count_reservations(None, None).await, Ok(2));
        assert_eq!(store.count_reservations(Some(at(0)), Some(at(23))).await, Ok(1));
        assert_eq!(store.rooms_in_use_at(at(9)).await, Ok(vec![RoomId(1)]));
        assert_eq!(store.rooms_in_use_at(at(10)).await, Ok(Vec::new()));

        assert_eq!(store.cancel_reservation(id).await, Ok(true));
        assert_eq!(store.cancel_reservation(id).await, Ok(false));
        assert_eq!(store.get_reservation(id).await, Ok(None));
    }

    #[tokio::test]
    async fn session_store_lists_only_sessions_older_than_cutoff() {
        let store = InMemorySessionStore::default();
        let old = ReservationSession::new(SessionId("old".to_string()), at(1));
        let fresh = ReservationSession::new(SessionId("fresh".to_string()), at(5));
        store.put(&old).await.expect("put");
        store.put(&fresh).await.expect("put");

        assert_eq!(store.list_expired(at(5)).await, Ok(vec![SessionId("old".to_string())]));
        assert_eq!(store.delete(&old.id).await, Ok(true));
        assert_eq!(store.get(&old.id).await, Ok(None));
        assert_eq!(store.get(&fresh.id).await, Ok(Some(fresh)));
    }
}
