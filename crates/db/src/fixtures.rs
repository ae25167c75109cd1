//! Sample meeting rooms for local setups and demos.

use roombook_core::domain::room::RoomStatus;
use tracing::info;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRoom {
    pub name: &'static str,
    pub capacity: u32,
    pub location: &'static str,
    pub equipment: &'static str,
}

pub const SAMPLE_ROOMS: &[SampleRoom] = &[
    SampleRoom { name: "회의실 A", capacity: 8, location: "2층", equipment: "TV, 화이트보드, 프로젝터" },
    SampleRoom { name: "회의실 B", capacity: 12, location: "3층", equipment: "TV, 화이트보드" },
    SampleRoom { name: "회의실 C", capacity: 6, location: "2층", equipment: "화이트보드" },
    SampleRoom { name: "대회의실", capacity: 20, location: "1층", equipment: "TV, 프로젝터, 음향시설" },
    SampleRoom { name: "소회의실 1", capacity: 4, location: "4층", equipment: "화이트보드" },
    SampleRoom { name: "소회의실 2", capacity: 4, location: "4층", equipment: "화이트보드" },
    SampleRoom {
        name: "임원회의실",
        capacity: 10,
        location: "5층",
        equipment: "TV, 프로젝터, 화이트보드, 화상회의",
    },
    SampleRoom { name: "창의공간", capacity: 15, location: "1층", equipment: "프로젝터, 화이트보드, 빔백" },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub inserted: usize,
    /// True when rooms already existed and nothing was written.
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct SampleRooms;

impl SampleRooms {
    /// Inserts the sample catalog into an empty room table.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM meeting_room").fetch_one(&mut *tx).await?;
        if existing > 0 {
            tx.rollback().await?;
            info!(event_name = "db.seed_skipped", existing, "rooms already present; seed skipped");
            return Ok(SeedResult { inserted: 0, skipped: true });
        }

        for room in SAMPLE_ROOMS {
            sqlx::query(
                "INSERT INTO meeting_room (name, capacity, location, equipment, status)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(room.name)
            .bind(i64::from(room.capacity))
            .bind(room.location)
            .bind(room.equipment)
            .bind(RoomStatus::Available.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(event_name = "db.seed_loaded", inserted = SAMPLE_ROOMS.len(), "sample rooms inserted");
        Ok(SeedResult { inserted: SAMPLE_ROOMS.len(), skipped: false })
    }

    /// Checks that every sample room exists with its catalog capacity and location.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SAMPLE_ROOMS.len());
        for room in SAMPLE_ROOMS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM meeting_room WHERE name = ?1 AND capacity = ?2 AND location = ?3)",
            )
            .bind(room.name)
            .bind(i64::from(room.capacity))
            .bind(room.location)
            .fetch_one(pool)
            .await?;
            checks.push((room.name, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}
