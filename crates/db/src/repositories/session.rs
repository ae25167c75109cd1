use async_trait::async_trait;
use chrono::{DateTime, Utc};

use roombook_core::domain::session::{ReservationSession, SessionId};
use roombook_core::errors::StoreError;
use roombook_core::store::SessionStore;

use super::{encode_instant, RepositoryError};
use crate::DbPool;

/// One JSON document per dialog session, keyed by session id.
pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<ReservationSession>, StoreError> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload_json FROM reservation_session WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        let session = payload
            .map(|payload| {
                serde_json::from_str::<ReservationSession>(&payload).map_err(|error| {
                    RepositoryError::Decode(format!("invalid session payload for `{id}` ({error})"))
                })
            })
            .transpose()?;
        Ok(session)
    }

    async fn put(&self, session: &ReservationSession) -> Result<(), StoreError> {
        let payload = serde_json::to_string(session)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        sqlx::query(
            "INSERT INTO reservation_session (id, payload_json, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET payload_json = excluded.payload_json",
        )
        .bind(&session.id.0)
        .bind(payload)
        .bind(encode_instant(session.created_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reservation_session WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM reservation_session WHERE created_at < ? ORDER BY id",
        )
        .bind(encode_instant(cutoff))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(ids.into_iter().map(SessionId).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use roombook_core::domain::room::{Room, RoomId, RoomStatus};
    use roombook_core::domain::session::{ReservationSession, SessionId, SessionStep};
    use roombook_core::errors::StoreError;
    use roombook_core::store::SessionStore;

    use super::SqlSessionStore;
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlSessionStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        SqlSessionStore::new(pool)
    }

    #[tokio::test]
    async fn sessions_survive_a_put_get_cycle_with_cached_candidates() {
        let store = store().await;
        let created_at = Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap();
        let mut session = ReservationSession::new(SessionId("s-1".to_string()), created_at);
        session.title = Some("Team Sync".to_string());
        session.start = Some(created_at + Duration::hours(6));
        session.end = Some(created_at + Duration::hours(7));
        session.min_capacity = Some(6);
        session.participants = Some(Vec::new());
        session.available_rooms = Some(vec![Room {
            id: RoomId(3),
            name: "회의실 C".to_string(),
            capacity: 6,
            location: "2층".to_string(),
            equipment: "화이트보드".to_string(),
            status: RoomStatus::Available,
        }]);
        session.step = SessionStep::SelectingRoom;

        store.put(&session).await.expect("put");
        assert_eq!(store.get(&session.id).await.expect("get"), Some(session.clone()));

        session.room_id = Some(RoomId(3));
        session.step = SessionStep::ReadyToConfirm;
        store.put(&session).await.expect("overwrite");
        assert_eq!(store.get(&session.id).await.expect("get"), Some(session.clone()));

        assert!(store.delete(&session.id).await.expect("delete"));
        assert!(!store.delete(&session.id).await.expect("delete again"));
        assert_eq!(store.get(&session.id).await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_listing_uses_creation_time() {
        let store = store().await;
        let base = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        for (id, hours) in [("old", 0), ("edge", 24), ("new", 30)] {
            let session =
                ReservationSession::new(SessionId(id.to_string()), base + Duration::hours(hours));
            store.put(&session).await.expect("put");
        }

        let expired = store.list_expired(base + Duration::hours(24)).await.expect("expired");
        assert_eq!(expired, vec![SessionId("old".to_string())]);
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_persistence_error() {
        let store = store().await;
        sqlx::query(
            "INSERT INTO reservation_session (id, payload_json, created_at)
             VALUES ('bad', '{not json', '2026-03-10T00:00:00.000000000Z')",
        )
        .execute(&store.pool)
        .await
        .expect("insert corrupt row");

        let error = store.get(&SessionId("bad".to_string())).await.expect_err("decode fails");
        assert!(matches!(error, StoreError::Persistence(message) if message.contains("bad")));
    }
}
