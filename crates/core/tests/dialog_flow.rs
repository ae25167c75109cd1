use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use roombook_core::flows::TurnOutcome;
use roombook_core::{
    BookingPolicy, BookingService, InMemoryBookingStore, InMemorySessionStore, Room, RoomId,
    RoomStatus, SessionField, SessionMachine, SessionSettings, SessionStep,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap()
}

fn room(id: i64, name: &str, capacity: u32) -> Room {
    Room {
        id: RoomId(id),
        name: name.to_string(),
        capacity,
        location: "3층".to_string(),
        equipment: "프로젝터, 화이트보드".to_string(),
        status: RoomStatus::Available,
    }
}

fn machine() -> SessionMachine {
    let store = InMemoryBookingStore::with_rooms(vec![
        room(1, "소회의실", 4),
        room(2, "회의실 B", 8),
        room(3, "대회의실", 20),
    ]);
    let bookings = BookingService::new(Arc::new(store), BookingPolicy::default());
    SessionMachine::new(bookings, Arc::new(InMemorySessionStore::default()), SessionSettings::default())
}

#[tokio::test]
async fn opening_message_to_committed_reservation() {
    let machine = machine();

    let opened = machine
        .create("내일 2시 팀 회의, 6명, alice@x.com, bob@x.com", now())
        .await
        .expect("create session");
    let session = &opened.session;
    assert_eq!(session.organizer.as_deref(), Some("alice@x.com"));
    assert_eq!(session.participants, Some(vec!["bob@x.com".to_string()]));
    assert_eq!(session.min_capacity, Some(6));
    assert_eq!(opened.prompt.field, Some(SessionField::Start));
    let id = session.id.clone();

    let revised = machine.revise(&id, SessionField::Title, "Team Sync", now()).await.expect("title");
    assert_eq!(revised.session.title.as_deref(), Some("Team Sync"));

    let started = machine.answer(&id, "14:00", now()).await.expect("start");
    assert_eq!(started.outcome, Some(TurnOutcome::Accepted { field: SessionField::Start }));
    assert_eq!(started.prompt.field, Some(SessionField::End));

    let ended = machine.answer(&id, "15:00", now()).await.expect("end");
    assert_eq!(ended.prompt.field, Some(SessionField::Room));
    assert_eq!(ended.session.step, SessionStep::SelectingRoom);
    let candidates = ended.session.available_rooms.clone().expect("candidates cached");
    assert_eq!(
        candidates.iter().map(|room| room.id).collect::<Vec<_>>(),
        vec![RoomId(2), RoomId(3)]
    );
    assert!(ended.prompt.text.contains("2. 회의실 B"));

    let chosen = machine
        .answer(&id, &candidates[0].id.0.to_string(), now())
        .await
        .expect("room choice");
    assert!(chosen.is_complete());

    let reservation = machine.finalize(&id, now()).await.expect("finalize");
    assert_eq!(reservation.room_id, RoomId(2));
    assert_eq!(reservation.title, "Team Sync");
    assert_eq!(reservation.start, Utc.with_ymd_and_hms(2026, 3, 11, 14, 0, 0).unwrap());
    assert_eq!(reservation.end, Utc.with_ymd_and_hms(2026, 3, 11, 15, 0, 0).unwrap());
    assert_eq!(reservation.organizer, "alice@x.com");
    assert_eq!(reservation.participants, vec!["bob@x.com"]);

    assert!(machine.status(&id).await.is_err(), "finalized session is discarded");
}

#[tokio::test]
async fn malformed_answers_repeat_the_same_prompt() {
    let machine = machine();
    let opened = machine.create("주간 회의 4명 carol@x.com", now()).await.expect("create");
    let id = opened.session.id.clone();
    assert_eq!(opened.prompt.field, Some(SessionField::Start));

    let rejected = machine.answer(&id, "sometime soon", now()).await.expect("turn");
    assert!(matches!(
        rejected.outcome,
        Some(TurnOutcome::Rejected { field: SessionField::Start, .. })
    ));
    assert_eq!(rejected.prompt.field, Some(SessionField::Start));
    assert_eq!(rejected.prompt.text, opened.prompt.text);
    assert_eq!(rejected.session.start, None);
}
