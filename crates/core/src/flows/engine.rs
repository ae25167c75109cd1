use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::booking::availability::RoomSearchCriteria;
use crate::booking::extractor::{FieldExtractor, DEFAULT_TITLE_MAX_CHARS};
use crate::booking::service::BookingService;
use crate::domain::reservation::Reservation;
use crate::domain::session::{ReservationSession, SessionId, SessionStep};
use crate::errors::{BookingError, NotFound};
use crate::flows::fields::SessionField;
use crate::store::SessionStore;

pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub expiry: Duration,
    pub title_max_chars: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            expiry: Duration::hours(DEFAULT_SESSION_EXPIRY_HOURS),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

/// Required fields still unset, in asking order. `no_room_available` is set when time and
/// capacity are known but the candidate list came back empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MissingFields {
    pub fields: Vec<SessionField>,
    pub no_room_available: bool,
}

impl MissingFields {
    pub fn first(&self) -> Option<SessionField> {
        self.fields.first().copied()
    }

    pub fn is_complete(&self) -> bool {
        self.fields.is_empty() && !self.no_room_available
    }

    fn step(&self) -> SessionStep {
        match self.first() {
            Some(SessionField::Room) => SessionStep::SelectingRoom,
            Some(_) => SessionStep::CollectingInfo,
            None if self.no_room_available => SessionStep::NoRoomAvailable,
            None => SessionStep::ReadyToConfirm,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub field: Option<SessionField>,
    pub text: String,
    pub answered: usize,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TurnOutcome {
    Accepted { field: SessionField },
    /// The answer did not parse or validate; the field stays unset.
    Rejected { field: SessionField, reason: String },
    NothingToAsk,
}

/// Snapshot returned by every dialog operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub session: ReservationSession,
    pub missing: MissingFields,
    pub prompt: Prompt,
    pub outcome: Option<TurnOutcome>,
}

impl SessionView {
    pub fn is_complete(&self) -> bool {
        self.missing.is_complete()
    }
}

type LockMap = HashMap<SessionId, Arc<Mutex<()>>>;

/// One exclusive lock per session id so concurrent turns on a session are serialized.
/// An entry lives only while some caller holds or awaits it.
#[derive(Default)]
pub struct SessionLocks {
    locks: StdMutex<LockMap>,
}

/// Exclusive hold on one session id. Dropping it releases the lock and prunes the entry.
pub struct SessionLease<'a> {
    locks: &'a SessionLocks,
    id: SessionId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.prune(&self.id);
    }
}

impl SessionLocks {
    pub async fn acquire(&self, id: &SessionId) -> SessionLease<'_> {
        let lock = Arc::clone(self.map().entry(id.clone()).or_default());
        let guard = lock.lock_owned().await;
        SessionLease { locks: self, id: id.clone(), guard: Some(guard) }
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn prune(&self, id: &SessionId) {
        let mut locks = self.map();
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SessionMachine {
    bookings: BookingService,
    sessions: Arc<dyn SessionStore>,
    extractor: FieldExtractor,
    settings: SessionSettings,
    locks: SessionLocks,
}

impl SessionMachine {
    pub fn new(
        bookings: BookingService,
        sessions: Arc<dyn SessionStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            bookings,
            sessions,
            extractor: FieldExtractor::new(settings.title_max_chars),
            settings,
            locks: SessionLocks::default(),
        }
    }

    pub fn bookings(&self) -> &BookingService {
        &self.bookings
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    pub async fn create(
        &self,
        opening_text: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionView, BookingError> {
        let extracted = self.extractor.extract(opening_text);
        let mut session = ReservationSession::new(SessionId::generate(), now);
        session.title = extracted.title;
        session.min_capacity = extracted.min_capacity;
        session.organizer = extracted.organizer;
        session.participants = extracted.participants;

        let view = self.settle(session, None).await?;
        info!(
            event_name = "session.created",
            session_id = %view.session.id,
            missing = view.missing.fields.len(),
            "reservation session created"
        );
        Ok(view)
    }

    /// Unset required fields in asking order. Once start, end and minimum capacity are known
    /// and no room is chosen, the candidate list is computed if it has not been yet.
    pub async fn missing_fields(
        &self,
        session: &mut ReservationSession,
    ) -> Result<MissingFields, BookingError> {
        let mut fields = SessionField::ORDER
            .into_iter()
            .filter(|field| *field != SessionField::Room && !field.is_set(session))
            .collect::<Vec<_>>();
        let mut no_room_available = false;

        if let (Some(start), Some(end), Some(min_capacity), None) =
            (session.start, session.end, session.min_capacity, session.room_id)
        {
            if session.available_rooms.is_none() {
                let criteria = RoomSearchCriteria::new(start, end, min_capacity);
                let candidates = self.bookings.candidates(&criteria).await?;
                info!(
                    event_name = "session.candidates_computed",
                    session_id = %session.id,
                    candidate_count = candidates.len(),
                    "room candidates cached on session"
                );
                session.available_rooms = Some(candidates);
            }

            if session.available_rooms.as_ref().is_some_and(|rooms| !rooms.is_empty()) {
                fields.push(SessionField::Room);
            } else {
                no_room_available = true;
            }
        }

        Ok(MissingFields { fields, no_room_available })
    }

    pub fn next_prompt(&self, session: &ReservationSession, missing: &MissingFields) -> Prompt {
        let field = missing.first();
        let text = match field {
            Some(SessionField::Room) => room_prompt(session),
            Some(field) => field.prompt().to_string(),
            None if missing.no_room_available => {
                "No room is available for the requested time and capacity. \
                 Revise the time window or the minimum capacity."
                    .to_string()
            }
            None => match session.chosen_room() {
                Some(room) => format!(
                    "All required information is collected. Confirm to book {} ({}).",
                    room.name, room.location
                ),
                None => "All required information is collected. Confirm to book the room.".to_string(),
            },
        };

        Prompt {
            field,
            text,
            answered: SessionField::ORDER.iter().filter(|field| field.is_set(session)).count(),
            total: SessionField::ORDER.len(),
        }
    }

    /// Applies one answer to the first missing field. A malformed answer leaves the session
    /// unchanged and the same prompt is issued again.
    pub async fn answer(
        &self,
        id: &SessionId,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionView, BookingError> {
        let _lease = self.locks.acquire(id).await;
        let mut session = self.load(id).await?;
        let missing = self.missing_fields(&mut session).await?;

        let outcome = match missing.first() {
            None => TurnOutcome::NothingToAsk,
            Some(field) => self.apply(&mut session, field, raw, now),
        };
        self.settle(session, Some(outcome)).await
    }

    /// Re-answers a field that may already be set. New start, end or capacity values drop
    /// the chosen room and its candidate list.
    pub async fn revise(
        &self,
        id: &SessionId,
        field: SessionField,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionView, BookingError> {
        let _lease = self.locks.acquire(id).await;
        let mut session = self.load(id).await?;
        let outcome = self.apply(&mut session, field, raw, now);
        self.settle(session, Some(outcome)).await
    }

    pub async fn set_description(
        &self,
        id: &SessionId,
        description: &str,
    ) -> Result<SessionView, BookingError> {
        let _lease = self.locks.acquire(id).await;
        let mut session = self.load(id).await?;
        let description = description.trim();
        session.description = (!description.is_empty()).then(|| description.to_string());
        self.settle(session, None).await
    }

    pub async fn status(&self, id: &SessionId) -> Result<SessionView, BookingError> {
        let _lease = self.locks.acquire(id).await;
        let session = self.load(id).await?;
        self.settle(session, None).await
    }

    pub async fn is_complete(&self, id: &SessionId) -> Result<bool, BookingError> {
        Ok(self.status(id).await?.is_complete())
    }

    /// Commits the reservation when nothing is missing. The session is discarded on success;
    /// on a commit-time conflict the room choice is cleared so a fresh list is offered.
    pub async fn finalize(
        &self,
        id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let _lease = self.locks.acquire(id).await;
        let mut session = self.load(id).await?;
        let missing = self.missing_fields(&mut session).await?;

        if !missing.fields.is_empty() {
            self.sessions.put(&session).await?;
            return Err(BookingError::SessionIncomplete { missing: missing.fields });
        }
        if missing.no_room_available {
            session.step = SessionStep::NoRoomAvailable;
            self.sessions.put(&session).await?;
            return Err(BookingError::NoRoomAvailable);
        }
        let Some(draft) = session.to_draft() else {
            return Err(BookingError::SessionIncomplete { missing: vec![SessionField::Room] });
        };

        match self.bookings.create_reservation(draft, now).await {
            Ok(reservation) => {
                self.sessions.delete(id).await?;
                info!(
                    event_name = "session.finalized",
                    session_id = %id,
                    reservation_id = reservation.id.0,
                    room_id = reservation.room_id.0,
                    "reservation session finalized"
                );
                Ok(reservation)
            }
            Err(BookingError::Conflict { room_id }) => {
                session.invalidate_room_choice();
                let view = self.settle(session, None).await?;
                warn!(
                    event_name = "session.finalize_conflict",
                    session_id = %id,
                    room_id = room_id.0,
                    candidate_count = view.session.available_rooms.as_ref().map_or(0, Vec::len),
                    "room was taken before commit; candidates refreshed"
                );
                Err(BookingError::Conflict { room_id })
            }
            Err(error) => Err(error),
        }
    }

    /// Discards the session. Nothing has been written to the booking store yet.
    pub async fn abandon(&self, id: &SessionId) -> Result<(), BookingError> {
        let lease = self.locks.acquire(id).await;
        if !self.sessions.delete(id).await? {
            return Err(NotFound::Session(id.clone()).into());
        }
        drop(lease);
        info!(event_name = "session.abandoned", session_id = %id, "reservation session abandoned");
        Ok(())
    }

    /// Removes every session created before `now - expiry`. Returns how many were removed.
    pub async fn expire(&self, now: DateTime<Utc>) -> Result<usize, BookingError> {
        let cutoff = now - self.settings.expiry;
        let expired = self.sessions.list_expired(cutoff).await?;
        let mut removed = 0;

        for id in expired {
            let _lease = self.locks.acquire(&id).await;
            let Some(session) = self.sessions.get(&id).await? else {
                continue;
            };
            if session.is_expired(now, self.settings.expiry) && self.sessions.delete(&id).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(
                event_name = "session.expired",
                removed,
                cutoff = %cutoff,
                "expired reservation sessions swept"
            );
        }
        Ok(removed)
    }

    async fn load(&self, id: &SessionId) -> Result<ReservationSession, BookingError> {
        self.sessions.get(id).await?.ok_or_else(|| NotFound::Session(id.clone()).into())
    }

    fn apply(
        &self,
        session: &mut ReservationSession,
        field: SessionField,
        raw: &str,
        now: DateTime<Utc>,
    ) -> TurnOutcome {
        match field.parse_answer(raw, session, now) {
            Ok(value) => {
                value.assign(session);
                if field.affects_candidates() {
                    session.invalidate_room_choice();
                }
                if field == SessionField::Start {
                    let end_stale = matches!((session.start, session.end), (Some(start), Some(end)) if end <= start);
                    if end_stale {
                        session.end = None;
                    }
                }
                info!(
                    event_name = "session.answer_accepted",
                    session_id = %session.id,
                    field = field.as_str(),
                    "session answer accepted"
                );
                TurnOutcome::Accepted { field }
            }
            Err(error) => {
                warn!(
                    event_name = "session.answer_rejected",
                    session_id = %session.id,
                    field = field.as_str(),
                    error = %error,
                    "session answer rejected; prompt will be repeated"
                );
                TurnOutcome::Rejected { field, reason: error.to_string() }
            }
        }
    }

    /// Recomputes missing fields, updates the step label and persists.
    async fn settle(
        &self,
        mut session: ReservationSession,
        outcome: Option<TurnOutcome>,
    ) -> Result<SessionView, BookingError> {
        let missing = self.missing_fields(&mut session).await?;
        session.step = missing.step();
        self.sessions.put(&session).await?;
        let prompt = self.next_prompt(&session, &missing);
        Ok(SessionView { session, missing, prompt, outcome })
    }
}

fn room_prompt(session: &ReservationSession) -> String {
    let mut text = String::from("Available rooms:\n");
    for room in session.available_rooms.iter().flatten() {
        text.push_str(&format!(
            "\n{}. {}\n   location: {}\n   capacity: {}\n   equipment: {}\n",
            room.id, room.name, room.location, room.capacity, room.equipment
        ));
    }
    text.push('\n');
    text.push_str(SessionField::Room.prompt());
    text
}
