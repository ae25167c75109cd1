use thiserror::Error;

use crate::booking::temporal::TimeParseError;
use crate::domain::reservation::ReservationId;
use crate::domain::room::RoomId;
use crate::domain::session::SessionId;
use crate::flows::fields::SessionField;

/// Malformed or out-of-range input for a single field. Inside a dialog turn this is
/// swallowed and the same prompt is issued again.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: SessionField },
    #[error("`{value}` is not a valid email address")]
    InvalidAddress { value: String },
    #[error("`{value}` is not a positive integer capacity")]
    InvalidCapacity { value: String },
    #[error(transparent)]
    UnrecognizedTime(#[from] TimeParseError),
    #[error("end time must be after start time")]
    EndNotAfterStart,
    #[error("`{answer}` does not match any offered room")]
    UnknownRoom { answer: String },
    #[error("{field} cannot be answered before room candidates are known")]
    NotYetAskable { field: SessionField },
    #[error("`{value}` is not a supported {what}")]
    Unsupported { what: &'static str, value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error(
        "reservations can only be cancelled at least {notice_minutes} minutes before start \
         ({minutes_until_start} minutes remaining)"
    )]
    CancellationTooLate { notice_minutes: i64, minutes_until_start: i64 },
    #[error("reservation window of {requested_minutes} minutes exceeds the {max_minutes} minute maximum")]
    DurationExceeded { max_minutes: i64, requested_minutes: i64 },
    #[error("room {room_id} is under maintenance")]
    RoomUnderMaintenance { room_id: RoomId },
    #[error("reservation window must not start in the past")]
    StartsInPast,
    #[error("{requested} participants exceed the maximum of {max}")]
    TooManyParticipants { max: usize, requested: usize },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotFound {
    #[error("session `{0}` was not found (expired or never existed)")]
    Session(SessionId),
    #[error("reservation {0} was not found")]
    Reservation(ReservationId),
    #[error("room {0} was not found")]
    Room(RoomId),
    #[error("no room matches `{0}`")]
    RoomNamed(String),
}

/// Failures reported by a store collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("room {room_id} already has a reservation overlapping the requested window")]
    Conflict { room_id: RoomId },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error("room {room_id} already has a reservation overlapping the requested window")]
    Conflict { room_id: RoomId },
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("session is missing required fields: {missing:?}")]
    SessionIncomplete { missing: Vec<SessionField> },
    #[error("no room is available for the requested window and capacity")]
    NoRoomAvailable,
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<StoreError> for BookingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { room_id } => Self::Conflict { room_id },
            StoreError::Persistence(message) => Self::Persistence(message),
        }
    }
}

impl BookingError {
    /// Stable machine-readable class used by outer transports.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Policy(_) => "policy_violation",
            Self::SessionIncomplete { .. } => "session_incomplete",
            Self::NoRoomAvailable => "no_room_available",
            Self::Persistence(_) => "persistence",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::PolicyViolation { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("policy violation: {message}")]
    PolicyViolation { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => {
                "The requested item does not exist. It may have expired or been removed."
            }
            Self::Conflict { .. } => {
                "The room was booked by someone else for that time. Choose another room or time."
            }
            Self::PolicyViolation { .. } => "The request is not allowed by the booking policy.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::PolicyViolation { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::PolicyViolation { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<BookingError> for InterfaceError {
    fn from(value: BookingError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            BookingError::Validation(_)
            | BookingError::SessionIncomplete { .. }
            | BookingError::NoRoomAvailable => Self::BadRequest { message, correlation_id },
            BookingError::NotFound(_) => Self::NotFound { message, correlation_id },
            BookingError::Conflict { .. } => Self::Conflict { message, correlation_id },
            BookingError::Policy(_) => Self::PolicyViolation { message, correlation_id },
            BookingError::Persistence(_) => Self::ServiceUnavailable { message, correlation_id },
        }
    }
}
