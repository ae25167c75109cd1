use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use roombook_core::{
    BookingError, BookingPolicy, BookingService, BookingStore, ReservationDraft, RoomId,
    SessionField, SessionMachine, SessionSettings, SessionStore,
};
use roombook_db::{connect_with_settings, migrations, DbPool, SampleRooms, SqlBookingStore, SqlSessionStore};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap()
}

async fn file_pool(dir: &tempfile::TempDir, connections: u32) -> DbPool {
    let url = format!("sqlite://{}", dir.path().join("roombook.db").display());
    let pool = connect_with_settings(&url, connections, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    SampleRooms::load(&pool).await.expect("seed rooms");
    pool
}

#[tokio::test]
async fn dialog_commits_through_sql_stores() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = file_pool(&dir, 2).await;
    let bookings: Arc<dyn BookingStore> = Arc::new(SqlBookingStore::new(pool.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(SqlSessionStore::new(pool.clone()));
    let machine = SessionMachine::new(
        BookingService::new(bookings, BookingPolicy::default()),
        sessions,
        SessionSettings::default(),
    );

    let opened = machine
        .create("내일 2시 팀 회의, 6명, alice@x.com, bob@x.com", now())
        .await
        .expect("create");
    let id = opened.session.id.clone();
    machine.revise(&id, SessionField::Title, "Team Sync", now()).await.expect("title");
    machine.answer(&id, "14:00", now()).await.expect("start");
    let ended = machine.answer(&id, "15:00", now()).await.expect("end");

    let candidates = ended.session.available_rooms.clone().expect("candidates");
    let names = candidates.iter().map(|room| room.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["회의실 C", "회의실 A", "임원회의실", "회의실 B", "창의공간", "대회의실"]);

    let reloaded = machine.status(&id).await.expect("status");
    assert_eq!(reloaded.session.available_rooms, Some(candidates.clone()));

    machine.answer(&id, &candidates[0].id.0.to_string(), now()).await.expect("room");
    let reservation = machine.finalize(&id, now()).await.expect("finalize");
    assert_eq!(reservation.room_id, candidates[0].id);

    let stored = machine.bookings().get_reservation(reservation.id).await.expect("stored");
    assert_eq!(stored, reservation);
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_commits_admit_exactly_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = file_pool(&dir, 4).await;
    let store: Arc<dyn BookingStore> = Arc::new(SqlBookingStore::new(pool.clone()));
    let service = BookingService::new(store, BookingPolicy::default());

    let mut handles = Vec::new();
    for (index, (start, end)) in [(14, 16), (15, 17), (13, 15), (14, 15)].into_iter().enumerate() {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let draft = ReservationDraft {
                room_id: RoomId(1),
                title: format!("contender {index}"),
                description: String::new(),
                start: Utc.with_ymd_and_hms(2026, 3, 11, start, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2026, 3, 11, end, 0, 0).unwrap(),
                organizer: format!("user{index}@x.com"),
                participants: Vec::new(),
            };
            service.create_reservation(draft, now()).await
        }));
    }

    let mut committed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => committed += 1,
            Err(BookingError::Conflict { room_id }) => {
                assert_eq!(room_id, RoomId(1));
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(conflicts, 3);
    let stored = service.room_reservations(RoomId(1), None, None).await.expect("list");
    assert_eq!(stored.len(), 1);
    pool.close().await;
}
