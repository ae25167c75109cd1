//! Rendering and delivery of reservation messages.
//!
//! The booking core never sends anything itself. Callers render a [`Notification`] from a
//! finalized reservation and hand it to a [`Notifier`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::reservation::Reservation;
use crate::domain::room::Room;

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const TIME_FORMAT: &str = "%H:%M";
const FOOTER: &str = "This message was sent automatically by the meeting room system.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Cancellation { reason: Option<String> },
    Reminder { minutes_before: u32 },
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Cancellation { .. } => "cancellation",
            Self::Reminder { .. } => "reminder",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn render(kind: NotificationKind, reservation: &Reservation, room: &Room) -> Self {
        match kind {
            NotificationKind::Confirmation => Self::confirmation(reservation, room),
            NotificationKind::Cancellation { reason } => {
                Self::cancellation(reservation, room, reason.as_deref())
            }
            NotificationKind::Reminder { minutes_before } => {
                Self::reminder(reservation, room, minutes_before)
            }
        }
    }

    /// Sent to the organizer only.
    pub fn confirmation(reservation: &Reservation, room: &Room) -> Self {
        let participants = if reservation.participants.is_empty() {
            "(none)".to_string()
        } else {
            reservation.participants.join(", ")
        };
        let body = [
            "Your meeting room reservation is confirmed.".to_string(),
            String::new(),
            "Reservation".to_string(),
            format!("- ID: {}", reservation.id),
            format!("- Title: {}", reservation.title),
            format!("- Description: {}", reservation.description),
            format!("- When: {}", window(reservation)),
            format!("- Duration: {:.1} hours", reservation.duration_hours()),
            format!("- Organizer: {}", reservation.organizer),
            format!("- Participants: {participants}"),
            String::new(),
            "Room".to_string(),
            format!("- Name: {}", room.name),
            format!("- Location: {}", room.location),
            format!("- Capacity: {}", room.capacity),
            format!("- Equipment: {}", room.equipment),
            String::new(),
            "Please arrive 10 minutes early and tidy the room when you leave.".to_string(),
            String::new(),
            FOOTER.to_string(),
        ]
        .join("\n");

        Self {
            kind: NotificationKind::Confirmation,
            recipients: vec![reservation.organizer.clone()],
            subject: format!("[Reservation confirmed] {} - {}", reservation.title, room.name),
            body,
        }
    }

    pub fn cancellation(reservation: &Reservation, room: &Room, reason: Option<&str>) -> Self {
        let mut lines = vec![
            "Your meeting room reservation has been cancelled.".to_string(),
            String::new(),
            format!("- ID: {}", reservation.id),
            format!("- Title: {}", reservation.title),
            format!("- When: {}", window(reservation)),
            format!("- Room: {} ({})", room.name, room.location),
            format!("- Organizer: {}", reservation.organizer),
        ];
        if let Some(reason) = reason.map(str::trim).filter(|reason| !reason.is_empty()) {
            lines.push(String::new());
            lines.push(format!("Reason: {reason}"));
        }
        lines.push(String::new());
        lines.push("Please book again once the new schedule is settled.".to_string());
        lines.push(String::new());
        lines.push(FOOTER.to_string());

        Self {
            kind: NotificationKind::Cancellation { reason: reason.map(str::to_string) },
            recipients: reservation.all_attendees(),
            subject: format!("[Reservation cancelled] {} - {}", reservation.title, room.name),
            body: lines.join("\n"),
        }
    }

    pub fn reminder(reservation: &Reservation, room: &Room, minutes_before: u32) -> Self {
        let body = [
            format!("Your meeting starts in {minutes_before} minutes."),
            String::new(),
            format!("- Title: {}", reservation.title),
            format!("- Starts: {}", reservation.start.format(DATE_TIME_FORMAT)),
            format!("- Room: {} ({})", room.name, room.location),
            format!("- Duration: {:.1} hours", reservation.duration_hours()),
            String::new(),
            FOOTER.to_string(),
        ]
        .join("\n");

        Self {
            kind: NotificationKind::Reminder { minutes_before },
            recipients: reservation.all_attendees(),
            subject: format!("[Meeting reminder] {} - in {minutes_before} minutes", reservation.title),
            body,
        }
    }
}

fn window(reservation: &Reservation) -> String {
    format!(
        "{} ~ {} UTC",
        reservation.start.format(DATE_TIME_FORMAT),
        reservation.end.format(TIME_FORMAT)
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub delivered: bool,
    pub recipient_count: usize,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification has no recipients")]
    NoRecipients,
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt, NotifyError>;
}

/// Writes each message to the log instead of sending it.
#[derive(Clone, Debug)]
pub struct LoggingNotifier {
    from_address: String,
}

impl LoggingNotifier {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self { from_address: from_address.into() }
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt, NotifyError> {
        if notification.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        info!(
            event_name = "notification.delivered",
            kind = notification.kind.as_str(),
            from = %self.from_address,
            to = %notification.recipients.join(", "),
            subject = %notification.subject,
            body = %notification.body,
            "notification logged"
        );
        Ok(DeliveryReceipt { delivered: true, recipient_count: notification.recipients.len() })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<DeliveryReceipt, NotifyError> {
        info!(
            event_name = "notification.suppressed",
            kind = notification.kind.as_str(),
            "notifications are disabled"
        );
        Ok(DeliveryReceipt { delivered: false, recipient_count: 0 })
    }
}
