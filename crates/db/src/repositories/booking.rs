use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use tracing::debug;

use roombook_core::booking::availability::{sort_candidates, RoomSearchCriteria};
use roombook_core::domain::reservation::{Reservation, ReservationDraft, ReservationId};
use roombook_core::domain::room::{Room, RoomId, RoomStatus};
use roombook_core::errors::StoreError;
use roombook_core::store::BookingStore;

use super::{encode_instant, parse_timestamp, parse_u32, RepositoryError};
use crate::DbPool;

const ROOM_COLUMNS: &str = "id, name, capacity, location, equipment, status";
const RESERVATION_COLUMNS: &str = "id, room_id, title, description, start_time, end_time, \
                                   organizer, participants_json, created_at";

pub struct SqlBookingStore {
    pool: DbPool,
}

impl SqlBookingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert_room(
        &self,
        name: &str,
        capacity: u32,
        location: &str,
        equipment: &str,
        status: RoomStatus,
    ) -> Result<RoomId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO meeting_room (name, capacity, location, equipment, status)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(i64::from(capacity))
        .bind(location)
        .bind(equipment)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(RoomId(result.last_insert_rowid()))
    }

    async fn overlapping_on(
        conn: &mut SqliteConnection,
        room_id: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservation
             WHERE room_id = ? AND start_time < ? AND end_time > ?
             ORDER BY start_time ASC"
        ))
        .bind(room_id.0)
        .bind(encode_instant(end))
        .bind(encode_instant(start))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(reservation_from_row).collect()
    }

    async fn commit_locked(
        conn: &mut SqliteConnection,
        draft: &ReservationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Option<ReservationId>, RepositoryError> {
        if !Self::overlapping_on(&mut *conn, draft.room_id, draft.start, draft.end).await?.is_empty() {
            return Ok(None);
        }

        let participants = serde_json::to_string(&draft.participants)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO reservation (
                room_id,
                title,
                description,
                start_time,
                end_time,
                organizer,
                participants_json,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.room_id.0)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(encode_instant(draft.start))
        .bind(encode_instant(draft.end))
        .bind(&draft.organizer)
        .bind(participants)
        .bind(encode_instant(created_at))
        .execute(&mut *conn)
        .await?;

        Ok(Some(ReservationId(result.last_insert_rowid())))
    }
}

#[async_trait]
impl BookingStore for SqlBookingStore {
    async fn find_candidate_rooms(
        &self,
        criteria: &RoomSearchCriteria,
    ) -> Result<Vec<Room>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM meeting_room AS room
             WHERE status = 'available'
               AND capacity >= ?
               AND NOT EXISTS (
                    SELECT 1 FROM reservation
                    WHERE reservation.room_id = room.id
                      AND reservation.start_time < ?
                      AND reservation.end_time > ?
               )"
        ))
        .bind(i64::from(criteria.min_capacity))
        .bind(encode_instant(criteria.end))
        .bind(encode_instant(criteria.start))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let mut rooms = rows
            .into_iter()
            .map(room_from_row)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|room| criteria.matches_room(room))
            .collect::<Vec<_>>();
        sort_candidates(&mut rooms);
        Ok(rooms)
    }

    async fn rooms_by_identifier_or_name(&self, token: &str) -> Result<Vec<Room>, StoreError> {
        let token = token.trim();
        let rows = match token.parse::<i64>() {
            Ok(id) => {
                sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM meeting_room WHERE id = ?"))
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await
            }
            Err(_) => {
                sqlx::query(&format!(
                    "SELECT {ROOM_COLUMNS} FROM meeting_room WHERE instr(name, ?) > 0 ORDER BY id"
                ))
                .bind(token)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(room_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// `BEGIN IMMEDIATE` takes the write lock before the overlap check, so two commits for
    /// the same room serialize and the second sees the first. Dropping the transaction
    /// midway rolls it back.
    async fn commit_reservation(
        &self,
        draft: &ReservationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<ReservationId, StoreError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(RepositoryError::from)?;
        let outcome = Self::commit_locked(&mut tx, draft, created_at).await?;
        if outcome.is_some() {
            tx.commit().await.map_err(RepositoryError::from)?;
        }

        match outcome {
            Some(id) => {
                debug!(
                    event_name = "db.reservation_inserted",
                    reservation_id = id.0,
                    room_id = draft.room_id.0,
                    "reservation row inserted"
                );
                Ok(id)
            }
            None => Err(StoreError::Conflict { room_id: draft.room_id }),
        }
    }

    async fn cancel_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reservation WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn reservations_overlapping(
        &self,
        room_id: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        Ok(Self::overlapping_on(&mut conn, room_id, start, end).await?)
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM meeting_room WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(room_from_row).transpose()?)
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM meeting_room ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(room_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_room_status(
        &self,
        id: RoomId,
        status: RoomStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE meeting_room SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn rooms_in_use_at(&self, at: DateTime<Utc>) -> Result<Vec<RoomId>, StoreError> {
        let at = encode_instant(at);
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT room_id FROM reservation
             WHERE start_time <= ? AND end_time > ?
             ORDER BY room_id",
        )
        .bind(&at)
        .bind(&at)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(ids.into_iter().map(RoomId).collect())
    }

    async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        let row =
            sqlx::query(&format!("SELECT {RESERVATION_COLUMNS} FROM reservation WHERE id = ?"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        Ok(row.map(reservation_from_row).transpose()?)
    }

    async fn room_reservations(
        &self,
        room_id: RoomId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let from = from.map(encode_instant);
        let to = to.map(encode_instant);
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservation
             WHERE room_id = ?
               AND (? IS NULL OR end_time > ?)
               AND (? IS NULL OR start_time < ?)
             ORDER BY start_time ASC"
        ))
        .bind(room_id.0)
        .bind(from.as_deref())
        .bind(from.as_deref())
        .bind(to.as_deref())
        .bind(to.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(reservation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_reservations(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, StoreError> {
        let from = from.map(encode_instant);
        let to = to.map(encode_instant);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM reservation
             WHERE (? IS NULL OR start_time >= ?)
               AND (? IS NULL OR start_time < ?)",
        )
        .bind(from.as_deref())
        .bind(from.as_deref())
        .bind(to.as_deref())
        .bind(to.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn room_from_row(row: SqliteRow) -> Result<Room, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = RoomStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown room status `{status_raw}`")))?;

    Ok(Room {
        id: RoomId(row.try_get("id")?),
        name: row.try_get("name")?,
        capacity: parse_u32("capacity", row.try_get("capacity")?)?,
        location: row.try_get("location")?,
        equipment: row.try_get("equipment")?,
        status,
    })
}

fn reservation_from_row(row: SqliteRow) -> Result<Reservation, RepositoryError> {
    let participants_raw = row.try_get::<String, _>("participants_json")?;
    let participants = serde_json::from_str::<Vec<String>>(&participants_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid participants_json `{participants_raw}` ({error})"))
    })?;

    Ok(Reservation {
        id: ReservationId(row.try_get("id")?),
        room_id: RoomId(row.try_get("room_id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        start: parse_timestamp("start_time", row.try_get("start_time")?)?,
        end: parse_timestamp("end_time", row.try_get("end_time")?)?,
        organizer: row.try_get("organizer")?,
        participants,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use roombook_core::booking::availability::RoomSearchCriteria;
    use roombook_core::domain::reservation::{ReservationDraft, ReservationId};
    use roombook_core::domain::room::{RoomId, RoomStatus};
    use roombook_core::errors::StoreError;
    use roombook_core::store::BookingStore;

    use super::SqlBookingStore;
    use crate::migrations;
    use crate::{connect_with_settings, DbPool};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, hour, 0, 0).unwrap()
    }

    fn draft(room_id: RoomId, start: DateTime<Utc>, end: DateTime<Utc>) -> ReservationDraft {
        ReservationDraft {
            room_id,
            title: "Weekly sync".to_string(),
            description: "planning".to_string(),
            start,
            end,
            organizer: "alice@x.com".to_string(),
            participants: vec!["bob@x.com".to_string(), "carol@x.com".to_string()],
        }
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn seeded_store() -> (SqlBookingStore, RoomId, RoomId, RoomId) {
        let store = SqlBookingStore::new(setup_pool().await);
        let small = store
            .insert_room("소회의실 1", 4, "4층", "화이트보드", RoomStatus::Available)
            .await
            .expect("insert small");
        let large = store
            .insert_room("대회의실", 20, "1층", "TV, 프로젝터, 음향시설", RoomStatus::Available)
            .await
            .expect("insert large");
        let medium = store
            .insert_room("회의실 A", 8, "2층", "TV, 화이트보드, 프로젝터", RoomStatus::Available)
            .await
            .expect("insert medium");
        (store, small, large, medium)
    }

    #[tokio::test]
    async fn commit_round_trips_and_rejects_overlap() {
        let (store, _, _, medium) = seeded_store().await;
        let created_at = Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 15).unwrap();

        let id = store.commit_reservation(&draft(medium, at(14), at(16)), created_at).await.expect("commit");
        assert_eq!(id, ReservationId(1));

        let stored = store.get_reservation(id).await.expect("load").expect("present");
        assert_eq!(stored.start, at(14));
        assert_eq!(stored.end, at(16));
        assert_eq!(stored.participants, vec!["bob@x.com", "carol@x.com"]);
        assert_eq!(stored.created_at, created_at);

        let overlap = store.commit_reservation(&draft(medium, at(15), at(17)), created_at).await;
        assert_eq!(overlap, Err(StoreError::Conflict { room_id: medium }));

        store
            .commit_reservation(&draft(medium, at(16), at(17)), created_at)
            .await
            .expect("touching window is free");
        assert_eq!(store.count_reservations(None, None).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn candidates_skip_busy_small_and_maintenance_rooms() {
        let (store, small, large, medium) = seeded_store().await;
        store
            .commit_reservation(&draft(medium, at(13), at(15)), at(8))
            .await
            .expect("busy medium");

        let criteria = RoomSearchCriteria::new(at(14), at(16), 4);
        let ids = store
            .find_candidate_rooms(&criteria)
            .await
            .expect("candidates")
            .into_iter()
            .map(|room| room.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![small, large]);

        assert!(store.update_room_status(small, RoomStatus::Maintenance).await.expect("update"));
        let with_equipment = RoomSearchCriteria::new(at(16), at(17), 4).with_equipment(["프로젝터"]);
        let ids = store
            .find_candidate_rooms(&with_equipment)
            .await
            .expect("candidates")
            .into_iter()
            .map(|room| room.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![medium, large]);
    }

    #[tokio::test]
    async fn queries_by_room_window_and_identifier() {
        let (store, small, _, medium) = seeded_store().await;
        store.commit_reservation(&draft(medium, at(16), at(17)), at(8)).await.expect("late");
        store.commit_reservation(&draft(medium, at(9), at(10)), at(8)).await.expect("early");
        store.commit_reservation(&draft(small, at(9), at(10)), at(8)).await.expect("other room");

        let all = store.room_reservations(medium, None, None).await.expect("all");
        assert_eq!(all.iter().map(|r| r.start).collect::<Vec<_>>(), vec![at(9), at(16)]);

        let afternoon = store.room_reservations(medium, Some(at(12)), None).await.expect("bounded");
        assert_eq!(afternoon.len(), 1);

        assert_eq!(store.rooms_in_use_at(at(9)).await.expect("in use"), vec![small, medium]);
        assert!(store.rooms_in_use_at(at(10)).await.expect("in use").is_empty());

        assert_eq!(store.count_reservations(Some(at(9)), Some(at(12))).await.expect("count"), 2);

        let by_name = store.rooms_by_identifier_or_name("회의실").await.expect("by name");
        assert_eq!(by_name.len(), 3);
        let by_id = store.rooms_by_identifier_or_name(&medium.0.to_string()).await.expect("by id");
        assert_eq!(by_id.iter().map(|room| room.id).collect::<Vec<_>>(), vec![medium]);

        assert!(store.cancel_reservation(ReservationId(1)).await.expect("cancel"));
        assert!(!store.cancel_reservation(ReservationId(1)).await.expect("cancel again"));
    }

    #[tokio::test]
    async fn cancelled_commit_leaves_the_connection_usable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("cancel.db").display());
        let pool = connect_with_settings(&url, 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        let store = SqlBookingStore::new(pool);
        let room = store
            .insert_room("회의실 A", 8, "2층", "TV", RoomStatus::Available)
            .await
            .expect("insert room");
        let base = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let slot = |index: i64| {
            let start = base + Duration::hours(index);
            draft(room, start, start + Duration::minutes(30))
        };

        for delay in 0..120_i64 {
            let interrupted = slot(delay * 2);
            let _ = tokio::time::timeout(
                std::time::Duration::from_micros(delay as u64 * 5),
                store.commit_reservation(&interrupted, base),
            )
            .await;

            store
                .commit_reservation(&slot(delay * 2 + 1), base)
                .await
                .unwrap_or_else(|error| panic!("commit after cancel at step {delay}: {error}"));
        }

        let overlapping = store
            .reservations_overlapping(room, base + Duration::hours(1), base + Duration::hours(2))
            .await
            .expect("overlapping");
        assert_eq!(overlapping.len(), 1);
        assert_eq!(overlapping[0].start, base + Duration::hours(1));
    }
}
