use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{info, warn};

use crate::booking::availability::RoomSearchCriteria;
use crate::booking::policy::BookingPolicy;
use crate::domain::reservation::{Reservation, ReservationDraft, ReservationId, ReservationStatistics};
use crate::domain::room::{Room, RoomId, RoomStatistics, RoomStatus};
use crate::errors::{BookingError, NotFound, PolicyViolation, StoreError};
use crate::store::BookingStore;

/// Room catalog, availability search and the conflict-checked commit.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    policy: BookingPolicy,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, policy: BookingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Unchecked candidate query; the window must already be ordered.
    pub async fn candidates(&self, criteria: &RoomSearchCriteria) -> Result<Vec<Room>, BookingError> {
        let rooms = self.store.find_candidate_rooms(criteria).await?;
        info!(
            event_name = "booking.candidates_computed",
            min_capacity = criteria.min_capacity,
            candidate_count = rooms.len(),
            "computed room candidates"
        );
        Ok(rooms)
    }

    /// Policy-checked availability search for direct callers.
    pub async fn search_available_rooms(
        &self,
        criteria: &RoomSearchCriteria,
        now: DateTime<Utc>,
    ) -> Result<Vec<Room>, BookingError> {
        self.policy.validate_window(criteria.start, criteria.end, now)?;
        self.candidates(criteria).await
    }

    pub async fn get_room(&self, id: RoomId, now: DateTime<Utc>) -> Result<Room, BookingError> {
        let mut room = self.store.get_room(id).await?.ok_or(NotFound::Room(id))?;
        let in_use = self.store.rooms_in_use_at(now).await?;
        room.status = room.status.effective(in_use.contains(&room.id));
        Ok(room)
    }

    /// All rooms with derived status, ordered by location then capacity.
    pub async fn list_rooms(&self, now: DateTime<Utc>) -> Result<Vec<Room>, BookingError> {
        let mut rooms = self.store.list_rooms().await?;
        let in_use = self.store.rooms_in_use_at(now).await?;
        for room in &mut rooms {
            room.status = room.status.effective(in_use.contains(&room.id));
        }
        rooms.sort_by(|a, b| {
            a.location.cmp(&b.location).then_with(|| a.capacity.cmp(&b.capacity))
        });
        Ok(rooms)
    }

    pub async fn find_rooms(&self, token: &str) -> Result<Vec<Room>, BookingError> {
        Ok(self.store.rooms_by_identifier_or_name(token).await?)
    }

    pub async fn update_room_status(&self, id: RoomId, status: RoomStatus) -> Result<(), BookingError> {
        if !self.store.update_room_status(id, status).await? {
            return Err(NotFound::Room(id).into());
        }
        info!(
            event_name = "room.status_updated",
            room_id = id.0,
            status = status.as_str(),
            "room status updated"
        );
        Ok(())
    }

    pub async fn room_statistics(&self) -> Result<RoomStatistics, BookingError> {
        let rooms = self.store.list_rooms().await?;
        let total_rooms = rooms.len() as u32;
        let active_rooms =
            rooms.iter().filter(|room| room.status == RoomStatus::Available).count() as u32;
        Ok(RoomStatistics { total_rooms, active_rooms, inactive_rooms: total_rooms - active_rooms })
    }

    /// Validates the draft against policy, then commits it. The store re-checks overlap
    /// atomically, so an advisory search earlier in the flow is never trusted here.
    pub async fn create_reservation(
        &self,
        draft: ReservationDraft,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        self.policy.validate_draft(&draft, now)?;
        let room = self.store.get_room(draft.room_id).await?.ok_or(NotFound::Room(draft.room_id))?;
        if room.status == RoomStatus::Maintenance {
            return Err(PolicyViolation::RoomUnderMaintenance { room_id: room.id }.into());
        }

        match self.store.commit_reservation(&draft, now).await {
            Ok(id) => {
                info!(
                    event_name = "reservation.committed",
                    reservation_id = id.0,
                    room_id = draft.room_id.0,
                    start = %draft.start,
                    end = %draft.end,
                    "reservation committed"
                );
                Ok(Reservation::from_draft(id, draft, now))
            }
            Err(error) => {
                let conflicting: Vec<i64> = match error {
                    StoreError::Conflict { room_id } => self
                        .store
                        .reservations_overlapping(room_id, draft.start, draft.end)
                        .await
                        .map(|found| found.into_iter().map(|reservation| reservation.id.0).collect())
                        .unwrap_or_default(),
                    _ => Vec::new(),
                };
                let error = BookingError::from(error);
                warn!(
                    event_name = "reservation.commit_rejected",
                    room_id = draft.room_id.0,
                    error_class = error.error_class(),
                    conflicting_reservations = ?conflicting,
                    error = %error,
                    "reservation commit rejected"
                );
                Err(error)
            }
        }
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        Ok(self.store.get_reservation(id).await?.ok_or(NotFound::Reservation(id))?)
    }

    pub async fn room_reservations(
        &self,
        room_id: RoomId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reservation>, BookingError> {
        Ok(self.store.room_reservations(room_id, from, to).await?)
    }

    /// Deletes the reservation if its start is far enough away, returning what was removed.
    pub async fn cancel_reservation(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let reservation = self.get_reservation(id).await?;
        if let Err(violation) = self.policy.check_cancellation(reservation.start, now) {
            warn!(
                event_name = "reservation.cancel_rejected",
                reservation_id = id.0,
                error = %violation,
                "cancellation rejected by policy"
            );
            return Err(violation.into());
        }

        if !self.store.cancel_reservation(id).await? {
            return Err(NotFound::Reservation(id).into());
        }
        info!(
            event_name = "reservation.cancelled",
            reservation_id = id.0,
            room_id = reservation.room_id.0,
            "reservation cancelled"
        );
        Ok(reservation)
    }

    /// Totals plus reservations starting on the UTC calendar day of `now`.
    pub async fn reservation_statistics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReservationStatistics, BookingError> {
        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);
        Ok(ReservationStatistics {
            total_reservations: self.store.count_reservations(None, None).await?,
            today_reservations: self.store.count_reservations(Some(day_start), Some(day_end)).await?,
        })
    }
}
