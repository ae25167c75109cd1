use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use roombook_core::flows::TurnOutcome;
use roombook_core::{
    BookingPolicy, BookingService, InMemoryBookingStore, InMemorySessionStore, Room, RoomId,
    RoomStatus, SessionField, SessionMachine, SessionSettings,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap()
}

fn machine() -> Arc<SessionMachine> {
    let store = InMemoryBookingStore::with_rooms(vec![Room {
        id: RoomId(1),
        name: "회의실 A".to_string(),
        capacity: 8,
        location: "2층".to_string(),
        equipment: "TV".to_string(),
        status: RoomStatus::Available,
    }]);
    let bookings = BookingService::new(Arc::new(store), BookingPolicy::default());
    Arc::new(SessionMachine::new(
        bookings,
        Arc::new(InMemorySessionStore::default()),
        SessionSettings::default(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_answers_on_one_session_each_fill_a_distinct_field() {
    let machine = machine();

    for _ in 0..25 {
        let id = machine.create("", now()).await.expect("create").session.id;

        let turns = ["14:00", "15:00"].map(|answer| {
            let machine = Arc::clone(&machine);
            let id = id.clone();
            tokio::spawn(async move { machine.answer(&id, answer, now()).await })
        });
        let mut accepted = HashSet::new();
        for turn in turns {
            let view = turn.await.expect("join").expect("answer");
            match view.outcome {
                Some(TurnOutcome::Accepted { field }) => assert!(accepted.insert(field)),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(accepted, HashSet::from([SessionField::Title, SessionField::Start]));

        let status = machine.status(&id).await.expect("status");
        let title = status.session.title.expect("title set");
        let start_hour = status.session.start.expect("start set").hour();
        let expected_start = if title == "14:00" { 15 } else { 14 };
        assert_eq!(start_hour, expected_start);
        assert_eq!(status.prompt.field, Some(SessionField::End));
        assert_eq!(status.prompt.answered, 2);
    }

    assert!(machine.locks().is_empty());
}
