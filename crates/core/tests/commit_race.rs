use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use roombook_core::{
    BookingError, BookingPolicy, BookingService, BookingStore, InMemoryBookingStore,
    ReservationDraft, Room, RoomId, RoomStatus,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap()
}

fn draft(organizer: &str, start_hour: u32, end_hour: u32) -> ReservationDraft {
    ReservationDraft {
        room_id: RoomId(1),
        title: format!("{organizer} sync"),
        description: String::new(),
        start: Utc.with_ymd_and_hms(2026, 3, 11, start_hour, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 3, 11, end_hour, 0, 0).unwrap(),
        organizer: organizer.to_string(),
        participants: Vec::new(),
    }
}

fn service() -> (BookingService, Arc<InMemoryBookingStore>) {
    let store = Arc::new(InMemoryBookingStore::with_rooms(vec![Room {
        id: RoomId(1),
        name: "소회의실".to_string(),
        capacity: 4,
        location: "2층".to_string(),
        equipment: "TV".to_string(),
        status: RoomStatus::Available,
    }]));
    let shared: Arc<dyn BookingStore> = store.clone();
    (BookingService::new(shared, BookingPolicy::default()), store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_commits_admit_exactly_one() {
    let (service, store) = service();

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.create_reservation(draft("alice@x.com", 14, 16), now()).await }
    });
    let second = tokio::spawn({
        let service = service.clone();
        async move { service.create_reservation(draft("bob@x.com", 15, 17), now()).await }
    });

    let results = [first.await.expect("join first"), second.await.expect("join second")];
    let committed = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(BookingError::Conflict { room_id: RoomId(1) })))
        .count();

    assert_eq!(committed, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(store.reservation_count().await, 1);
}

#[tokio::test]
async fn back_to_back_windows_both_commit() {
    let (service, store) = service();

    service.create_reservation(draft("alice@x.com", 14, 15), now()).await.expect("first");
    service.create_reservation(draft("bob@x.com", 15, 16), now()).await.expect("second");

    assert_eq!(store.reservation_count().await, 2);
}
