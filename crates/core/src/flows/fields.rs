use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::extractor::is_valid_email;
use crate::booking::temporal::parse_instant;
use crate::domain::room::RoomId;
use crate::domain::session::ReservationSession;
use crate::errors::ValidationError;

/// Answers that explicitly mean "nobody else is attending".
const NO_PARTICIPANT_MARKERS: &[&str] = &["-", "none", "없음"];

/// Required dialog fields in the order they are asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionField {
    Title,
    Start,
    End,
    Organizer,
    Participants,
    MinCapacity,
    Room,
}

/// A field answer that passed parsing and validation and is ready to assign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Title(String),
    Start(DateTime<Utc>),
    End(DateTime<Utc>),
    Organizer(String),
    Participants(Vec<String>),
    MinCapacity(u32),
    Room(RoomId),
}

impl SessionField {
    pub const ORDER: [SessionField; 7] = [
        Self::Title,
        Self::Start,
        Self::End,
        Self::Organizer,
        Self::Participants,
        Self::MinCapacity,
        Self::Room,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Start => "start",
            Self::End => "end",
            Self::Organizer => "organizer",
            Self::Participants => "participants",
            Self::MinCapacity => "min_capacity",
            Self::Room => "room",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ORDER.into_iter().find(|field| field.as_str() == normalized)
    }

    /// Fixed prompt text. The room prompt is extended with the candidate list by the caller.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Title => "Enter the meeting title:",
            Self::Start => "Enter the meeting start time (e.g. 2026-03-15 14:00, 14:00, 오후 2시):",
            Self::End => "Enter the meeting end time (e.g. 16:00, 오후 4시):",
            Self::Organizer => "Enter the organizer email address:",
            Self::Participants => {
                "Enter participant email addresses separated by commas (or `none`):"
            }
            Self::MinCapacity => "Enter the minimum number of seats required:",
            Self::Room => "Choose one of the available rooms by number or name:",
        }
    }

    pub fn is_set(&self, session: &ReservationSession) -> bool {
        match self {
            Self::Title => session.title.is_some(),
            Self::Start => session.start.is_some(),
            Self::End => session.end.is_some(),
            Self::Organizer => session.organizer.is_some(),
            Self::Participants => session.participants.is_some(),
            Self::MinCapacity => session.min_capacity.is_some(),
            Self::Room => session.room_id.is_some(),
        }
    }

    /// Whether a new value for this field makes the cached room candidates stale.
    pub fn affects_candidates(&self) -> bool {
        matches!(self, Self::Start | Self::End | Self::MinCapacity)
    }

    /// Parses and validates `raw` as an answer to this field in the context of `session`.
    pub fn parse_answer(
        &self,
        raw: &str,
        session: &ReservationSession,
        now: DateTime<Utc>,
    ) -> Result<FieldValue, ValidationError> {
        let answer = raw.trim();
        if answer.is_empty() {
            return Err(ValidationError::Empty { field: *self });
        }

        match self {
            Self::Title => Ok(FieldValue::Title(answer.to_string())),
            Self::Start => Ok(FieldValue::Start(parse_instant(answer, None, now)?)),
            Self::End => {
                let base_date = session.start.map(|start| start.date_naive());
                let end = parse_instant(answer, base_date, now)?;
                if session.start.is_some_and(|start| end <= start) {
                    return Err(ValidationError::EndNotAfterStart);
                }
                Ok(FieldValue::End(end))
            }
            Self::Organizer => {
                if !is_valid_email(answer) {
                    return Err(ValidationError::InvalidAddress { value: answer.to_string() });
                }
                Ok(FieldValue::Organizer(answer.to_string()))
            }
            Self::Participants => parse_participants(answer).map(FieldValue::Participants),
            Self::MinCapacity => match answer.parse::<u32>() {
                Ok(count) if count > 0 => Ok(FieldValue::MinCapacity(count)),
                _ => Err(ValidationError::InvalidCapacity { value: answer.to_string() }),
            },
            Self::Room => resolve_room(answer, session).map(FieldValue::Room),
        }
    }
}

impl std::fmt::Display for SessionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldValue {
    pub fn assign(self, session: &mut ReservationSession) {
        match self {
            Self::Title(title) => session.title = Some(title),
            Self::Start(start) => session.start = Some(start),
            Self::End(end) => session.end = Some(end),
            Self::Organizer(organizer) => session.organizer = Some(organizer),
            Self::Participants(participants) => session.participants = Some(participants),
            Self::MinCapacity(count) => session.min_capacity = Some(count),
            Self::Room(room_id) => session.room_id = Some(room_id),
        }
    }
}

fn parse_participants(answer: &str) -> Result<Vec<String>, ValidationError> {
    if NO_PARTICIPANT_MARKERS.iter().any(|marker| answer.eq_ignore_ascii_case(marker)) {
        return Ok(Vec::new());
    }

    let mut participants = Vec::new();
    for token in answer.split(|ch: char| ch == ',' || ch == ';' || ch.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        if !is_valid_email(token) {
            return Err(ValidationError::InvalidAddress { value: token.to_string() });
        }
        if !participants.iter().any(|existing| existing == token) {
            participants.push(token.to_string());
        }
    }
    Ok(participants)
}

/// Numeric answers match a candidate id; anything else matches a candidate name exactly,
/// then by substring. Matching is case-sensitive.
fn resolve_room(answer: &str, session: &ReservationSession) -> Result<RoomId, ValidationError> {
    let Some(candidates) = session.available_rooms.as_deref() else {
        return Err(ValidationError::NotYetAskable { field: SessionField::Room });
    };
    let unknown = || ValidationError::UnknownRoom { answer: answer.to_string() };

    if answer.chars().all(|ch| ch.is_ascii_digit()) {
        let wanted = answer.parse::<i64>().map_err(|_| unknown())?;
        return candidates
            .iter()
            .find(|room| room.id == RoomId(wanted))
            .map(|room| room.id)
            .ok_or_else(unknown);
    }

    candidates
        .iter()
        .find(|room| room.name == answer)
        .or_else(|| candidates.iter().find(|room| room.name.contains(answer)))
        .map(|room| room.id)
        .ok_or_else(unknown)
}
