pub mod booking;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod notify;
pub mod store;

pub use booking::{BookingPolicy, BookingService, FieldExtractor, RoomSearchCriteria};
pub use domain::reservation::{Reservation, ReservationDraft, ReservationId, ReservationStatistics};
pub use domain::room::{Room, RoomId, RoomStatistics, RoomStatus};
pub use domain::session::{ReservationSession, SessionId, SessionStep};
pub use errors::{BookingError, InterfaceError, NotFound, PolicyViolation, StoreError, ValidationError};
pub use flows::{SessionField, SessionMachine, SessionSettings, SessionView};
pub use notify::{Notification, NotificationKind, Notifier};
pub use store::{BookingStore, InMemoryBookingStore, InMemorySessionStore, SessionStore};
