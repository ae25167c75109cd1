//! Transport-independent tool logic. Every call yields a JSON envelope with
//! `status: "ok"` or `status: "error"` plus a correlation id on failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use roombook_core::booking::temporal::parse_instant;
use roombook_core::errors::{BookingError, NotFound, ValidationError};
use roombook_core::notify::{DeliveryReceipt, NotifyError};
use roombook_core::{
    Notification, NotificationKind, Notifier, Reservation, ReservationDraft, ReservationId,
    RoomId, RoomSearchCriteria, SessionField, SessionId, SessionMachine,
};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRoomsInput {
    /// Meeting start, e.g. `2026-03-15 14:00`, `14:00` or `오후 2시`
    pub start_time: String,
    /// Meeting end; bare times are taken on the start date
    pub end_time: String,
    /// Minimum number of seats
    #[serde(default = "default_capacity")]
    pub min_capacity: u32,
    /// Substring of the room location, e.g. `2층`
    #[serde(default)]
    pub location: Option<String>,
    /// Equipment every candidate must list
    #[serde(default)]
    pub equipment: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RoomLookupInput {
    /// Numeric room id or part of the room name
    pub room: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateReservationInput {
    pub room_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    /// Organizer email address
    pub organizer: String,
    /// Participant email addresses
    #[serde(default)]
    pub participants: Vec<String>,
    /// Send a confirmation to the organizer after committing
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReservationLookupInput {
    pub reservation_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CancelReservationInput {
    pub reservation_id: i64,
    #[serde(default)]
    pub reason: Option<String>,
    /// Notify every attendee about the cancellation
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SendNotificationInput {
    pub reservation_id: i64,
    /// `confirmation` or `reminder`
    pub kind: String,
    /// Minutes before start for reminders; the configured default when omitted
    #[serde(default)]
    pub minutes_before: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StartSessionInput {
    /// Free-form booking request, e.g. `내일 2시 팀 회의, 6명, alice@x.com`
    pub message: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AnswerSessionInput {
    pub session_id: String,
    /// Answer to the most recent prompt
    pub answer: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReviseSessionInput {
    pub session_id: String,
    /// One of title, start, end, organizer, participants, min_capacity, room, description
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SessionLookupInput {
    pub session_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ConfirmSessionInput {
    pub session_id: String,
    #[serde(default)]
    pub notify: bool,
}

fn default_capacity() -> u32 {
    1
}

/// Result of one tool call before it is wrapped for the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolReply {
    pub is_error: bool,
    pub body: Value,
}

impl ToolReply {
    pub fn text(&self) -> String {
        self.body.to_string()
    }
}

enum ToolError {
    Booking(BookingError),
    Notify(NotifyError),
    Encode(serde_json::Error),
}

impl From<BookingError> for ToolError {
    fn from(error: BookingError) -> Self {
        Self::Booking(error)
    }
}

impl From<ValidationError> for ToolError {
    fn from(error: ValidationError) -> Self {
        Self::Booking(error.into())
    }
}

impl From<NotifyError> for ToolError {
    fn from(error: NotifyError) -> Self {
        Self::Notify(error)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(error: serde_json::Error) -> Self {
        Self::Encode(error)
    }
}

#[derive(Default)]
struct Envelope(Map<String, Value>);

impl Envelope {
    fn field<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self, ToolError> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }
}

#[derive(Clone)]
pub struct BookingTools {
    machine: Arc<SessionMachine>,
    notifier: Arc<dyn Notifier>,
    reminder_minutes_before: u32,
    clock: Clock,
}

impl BookingTools {
    pub fn new(
        machine: Arc<SessionMachine>,
        notifier: Arc<dyn Notifier>,
        reminder_minutes_before: u32,
    ) -> Self {
        Self { machine, notifier, reminder_minutes_before, clock: Arc::new(Utc::now) }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn search_available_rooms(&self, input: SearchRoomsInput) -> ToolReply {
        let result = async {
            let now = self.now();
            let (start, end) = parse_window(&input.start_time, &input.end_time, now)?;
            let mut criteria = RoomSearchCriteria::new(start, end, input.min_capacity.max(1))
                .with_equipment(input.equipment);
            if let Some(location) = input.location.filter(|location| !location.trim().is_empty()) {
                criteria = criteria.with_location(location.trim());
            }

            let rooms = self.machine.bookings().search_available_rooms(&criteria, now).await?;
            Envelope::default()
                .field("start_time", &start)?
                .field("end_time", &end)?
                .field("count", &rooms.len())?
                .field("rooms", &rooms)
        }
        .await;
        self.respond("search_available_rooms", result)
    }

    pub async fn get_room_info(&self, input: RoomLookupInput) -> ToolReply {
        let result = async {
            let now = self.now();
            let bookings = self.machine.bookings();
            let token = input.room.trim();
            let room_id = match token.parse::<i64>() {
                Ok(id) => RoomId(id),
                Err(_) => bookings
                    .find_rooms(token)
                    .await?
                    .first()
                    .map(|room| room.id)
                    .ok_or_else(|| BookingError::from(NotFound::RoomNamed(token.to_string())))?,
            };

            let room = bookings.get_room(room_id, now).await?;
            let upcoming = bookings.room_reservations(room_id, Some(now), None).await?;
            Envelope::default().field("room", &room)?.field("upcoming_reservations", &upcoming)
        }
        .await;
        self.respond("get_room_info", result)
    }

    pub async fn list_rooms(&self) -> ToolReply {
        let result = async {
            let now = self.now();
            let bookings = self.machine.bookings();
            let rooms = bookings.list_rooms(now).await?;
            let room_statistics = bookings.room_statistics().await?;
            let reservation_statistics = bookings.reservation_statistics(now).await?;
            Envelope::default()
                .field("rooms", &rooms)?
                .field("room_statistics", &room_statistics)?
                .field("reservation_statistics", &reservation_statistics)
        }
        .await;
        self.respond("list_rooms", result)
    }

    pub async fn create_reservation(&self, input: CreateReservationInput) -> ToolReply {
        let result = async {
            let now = self.now();
            let (start, end) = parse_window(&input.start_time, &input.end_time, now)?;
            let draft = ReservationDraft {
                room_id: RoomId(input.room_id),
                title: input.title.trim().to_string(),
                description: input.description.trim().to_string(),
                start,
                end,
                organizer: input.organizer.trim().to_string(),
                participants: input.participants.iter().map(|p| p.trim().to_string()).collect(),
            };

            let reservation = self.machine.bookings().create_reservation(draft, now).await?;
            let envelope = Envelope::default().field("reservation", &reservation)?;
            self.attach_notification(envelope, input.notify, &reservation, NotificationKind::Confirmation)
                .await
        }
        .await;
        self.respond("create_reservation", result)
    }

    pub async fn get_reservation_details(&self, input: ReservationLookupInput) -> ToolReply {
        let result = async {
            let bookings = self.machine.bookings();
            let reservation = bookings.get_reservation(ReservationId(input.reservation_id)).await?;
            let room = bookings.get_room(reservation.room_id, self.now()).await?;
            Envelope::default()
                .field("reservation", &reservation)?
                .field("duration_hours", &reservation.duration_hours())?
                .field("room", &room)
        }
        .await;
        self.respond("get_reservation_details", result)
    }

    pub async fn cancel_reservation(&self, input: CancelReservationInput) -> ToolReply {
        let result = async {
            let now = self.now();
            let cancelled = self
                .machine
                .bookings()
                .cancel_reservation(ReservationId(input.reservation_id), now)
                .await?;
            let envelope = Envelope::default().field("cancelled", &cancelled)?;
            let kind = NotificationKind::Cancellation { reason: input.reason };
            self.attach_notification(envelope, input.notify, &cancelled, kind).await
        }
        .await;
        self.respond("cancel_reservation", result)
    }

    pub async fn send_notification(&self, input: SendNotificationInput) -> ToolReply {
        let result = async {
            let kind = match input.kind.trim().to_ascii_lowercase().as_str() {
                "confirmation" => NotificationKind::Confirmation,
                "reminder" => NotificationKind::Reminder {
                    minutes_before: input.minutes_before.unwrap_or(self.reminder_minutes_before),
                },
                _ => {
                    return Err(ValidationError::Unsupported {
                        what: "notification kind",
                        value: input.kind.clone(),
                    }
                    .into())
                }
            };

            let reservation =
                self.machine.bookings().get_reservation(ReservationId(input.reservation_id)).await?;
            let (notification, receipt) = self.deliver(kind, &reservation).await?;
            Envelope::default()
                .field("kind", notification.kind.as_str())?
                .field("recipients", &notification.recipients)?
                .field("subject", &notification.subject)?
                .field("delivered", &receipt.delivered)
        }
        .await;
        self.respond("send_notification", result)
    }

    pub async fn start_reservation_session(&self, input: StartSessionInput) -> ToolReply {
        let result = async {
            let view = self.machine.create(&input.message, self.now()).await?;
            Envelope::default().field("session", &view)
        }
        .await;
        self.respond("start_reservation_session", result)
    }

    pub async fn answer_session(&self, input: AnswerSessionInput) -> ToolReply {
        let result = async {
            let id = SessionId(input.session_id);
            let view = self.machine.answer(&id, &input.answer, self.now()).await?;
            Envelope::default().field("session", &view)
        }
        .await;
        self.respond("answer_session", result)
    }

    pub async fn revise_session(&self, input: ReviseSessionInput) -> ToolReply {
        let result = async {
            let id = SessionId(input.session_id);
            let view = if input.field.trim().eq_ignore_ascii_case("description") {
                self.machine.set_description(&id, &input.value).await?
            } else {
                let field = SessionField::parse(&input.field).ok_or_else(|| {
                    ValidationError::Unsupported { what: "session field", value: input.field.clone() }
                })?;
                self.machine.revise(&id, field, &input.value, self.now()).await?
            };
            Envelope::default().field("session", &view)
        }
        .await;
        self.respond("revise_session", result)
    }

    pub async fn get_session_status(&self, input: SessionLookupInput) -> ToolReply {
        let result = async {
            let view = self.machine.status(&SessionId(input.session_id)).await?;
            Envelope::default().field("session", &view)
        }
        .await;
        self.respond("get_session_status", result)
    }

    pub async fn confirm_session(&self, input: ConfirmSessionInput) -> ToolReply {
        let result = async {
            let reservation =
                self.machine.finalize(&SessionId(input.session_id), self.now()).await?;
            let envelope = Envelope::default().field("reservation", &reservation)?;
            self.attach_notification(envelope, input.notify, &reservation, NotificationKind::Confirmation)
                .await
        }
        .await;
        self.respond("confirm_session", result)
    }

    pub async fn abandon_session(&self, input: SessionLookupInput) -> ToolReply {
        let result = async {
            let id = SessionId(input.session_id);
            self.machine.abandon(&id).await?;
            Envelope::default().field("session_id", &id)?.field("abandoned", &true)
        }
        .await;
        self.respond("abandon_session", result)
    }

    async fn deliver(
        &self,
        kind: NotificationKind,
        reservation: &Reservation,
    ) -> Result<(Notification, DeliveryReceipt), ToolError> {
        let room = self.machine.bookings().get_room(reservation.room_id, self.now()).await?;
        let notification = Notification::render(kind, reservation, &room);
        let receipt = self.notifier.deliver(&notification).await?;
        info!(
            event_name = "notification.dispatched",
            reservation_id = reservation.id.0,
            kind = notification.kind.as_str(),
            delivered = receipt.delivered,
            recipient_count = receipt.recipient_count,
            "notification dispatched"
        );
        Ok((notification, receipt))
    }

    /// A delivery failure after a committed change is reported alongside the result.
    async fn attach_notification(
        &self,
        envelope: Envelope,
        requested: bool,
        reservation: &Reservation,
        kind: NotificationKind,
    ) -> Result<Envelope, ToolError> {
        if !requested {
            return Ok(envelope);
        }
        match self.deliver(kind, reservation).await {
            Ok((_, receipt)) => envelope.field("notification", &receipt),
            Err(ToolError::Encode(error)) => Err(ToolError::Encode(error)),
            Err(ToolError::Booking(error)) => {
                envelope.field("notification_error", &error.to_string())
            }
            Err(ToolError::Notify(error)) => {
                warn!(
                    event_name = "notification.failed",
                    reservation_id = reservation.id.0,
                    error = %error,
                    "notification delivery failed"
                );
                envelope.field("notification_error", &error.to_string())
            }
        }
    }

    fn respond(&self, tool: &'static str, result: Result<Envelope, ToolError>) -> ToolReply {
        let correlation_id = Uuid::new_v4().to_string();
        match result {
            Ok(Envelope(mut body)) => {
                body.insert("status".to_string(), Value::from("ok"));
                debug!(event_name = "mcp.tool_succeeded", tool, correlation_id = %correlation_id, "tool call succeeded");
                ToolReply { is_error: false, body: Value::Object(body) }
            }
            Err(ToolError::Booking(error)) => {
                let error_class = error.error_class();
                let interface = error.into_interface(correlation_id.as_str());
                failure(tool, error_class, interface.message(), interface.user_message(), &correlation_id)
            }
            Err(ToolError::Notify(error)) => failure(
                tool,
                "notification",
                &error.to_string(),
                "The notification could not be delivered.",
                &correlation_id,
            ),
            Err(ToolError::Encode(error)) => failure(
                tool,
                "internal",
                &error.to_string(),
                "An unexpected internal error occurred.",
                &correlation_id,
            ),
        }
    }
}

fn failure(
    tool: &'static str,
    error_class: &str,
    message: &str,
    user_message: &str,
    correlation_id: &str,
) -> ToolReply {
    warn!(
        event_name = "mcp.tool_failed",
        tool,
        error_class,
        correlation_id,
        error = message,
        "tool call failed"
    );
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from("error"));
    body.insert("error_class".to_string(), Value::from(error_class));
    body.insert("message".to_string(), Value::from(message));
    body.insert("user_message".to_string(), Value::from(user_message));
    body.insert("correlation_id".to_string(), Value::from(correlation_id));
    ToolReply { is_error: true, body: Value::Object(body) }
}

fn parse_window(
    start_raw: &str,
    end_raw: &str,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
    let start = parse_instant(start_raw, None, now)?;
    let end = parse_instant(end_raw, Some(start.date_naive()), now)?;
    Ok((start, end))
}
