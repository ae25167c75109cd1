use chrono::{DateTime, Duration, Utc};

use crate::booking::extractor::is_valid_email;
use crate::domain::reservation::ReservationDraft;
use crate::errors::{BookingError, PolicyViolation, ValidationError};
use crate::flows::fields::SessionField;

pub const DEFAULT_MAX_DURATION_MINUTES: i64 = 8 * 60;
pub const DEFAULT_MAX_PARTICIPANTS: usize = 50;
pub const DEFAULT_CANCELLATION_NOTICE_MINUTES: i64 = 60;

/// Limits applied before any reservation reaches the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingPolicy {
    pub max_duration: Duration,
    pub max_participants: usize,
    pub cancellation_notice: Duration,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            max_duration: Duration::minutes(DEFAULT_MAX_DURATION_MINUTES),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            cancellation_notice: Duration::minutes(DEFAULT_CANCELLATION_NOTICE_MINUTES),
        }
    }
}

impl BookingPolicy {
    pub fn validate_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if end <= start {
            return Err(ValidationError::EndNotAfterStart.into());
        }
        if start < now {
            return Err(PolicyViolation::StartsInPast.into());
        }
        let requested = end - start;
        if requested > self.max_duration {
            return Err(PolicyViolation::DurationExceeded {
                max_minutes: self.max_duration.num_minutes(),
                requested_minutes: requested.num_minutes(),
            }
            .into());
        }
        Ok(())
    }

    pub fn validate_participants(&self, participants: &[String]) -> Result<(), BookingError> {
        if participants.len() > self.max_participants {
            return Err(PolicyViolation::TooManyParticipants {
                max: self.max_participants,
                requested: participants.len(),
            }
            .into());
        }
        if let Some(bad) = participants.iter().find(|address| !is_valid_email(address)) {
            return Err(ValidationError::InvalidAddress { value: bad.clone() }.into());
        }
        Ok(())
    }

    pub fn validate_draft(
        &self,
        draft: &ReservationDraft,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if draft.title.trim().is_empty() {
            return Err(ValidationError::Empty { field: SessionField::Title }.into());
        }
        if !is_valid_email(&draft.organizer) {
            return Err(ValidationError::InvalidAddress { value: draft.organizer.clone() }.into());
        }
        self.validate_window(draft.start, draft.end, now)?;
        self.validate_participants(&draft.participants)
    }

    /// Cancellation is allowed while the start is at least the notice period away.
    pub fn check_cancellation(
        &self,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation> {
        let remaining = start - now;
        if remaining < self.cancellation_notice {
            return Err(PolicyViolation::CancellationTooLate {
                notice_minutes: self.cancellation_notice.num_minutes(),
                minutes_until_start: remaining.num_minutes(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::BookingPolicy;
    use crate::domain::reservation::ReservationDraft;
    use crate::domain::room::RoomId;
    use crate::errors::{BookingError, PolicyViolation, ValidationError};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn draft(start: DateTime<Utc>, end: DateTime<Utc>) -> ReservationDraft {
        ReservationDraft {
            room_id: RoomId(1),
            title: "Planning".to_string(),
            description: String::new(),
            start,
            end,
            organizer: "alice@x.com".to_string(),
            participants: vec!["bob@x.com".to_string()],
        }
    }

    #[test]
    fn eight_hours_is_the_inclusive_duration_cap() {
        let policy = BookingPolicy::default();
        let start = now() + Duration::hours(1);

        assert!(policy.validate_window(start, start + Duration::hours(8), now()).is_ok());
        assert_eq!(
            policy.validate_window(start, start + Duration::minutes(481), now()),
            Err(BookingError::Policy(PolicyViolation::DurationExceeded {
                max_minutes: 480,
                requested_minutes: 481,
            }))
        );
    }

    #[test]
    fn window_must_be_ordered_and_in_the_future() {
        let policy = BookingPolicy::default();
        let start = now() + Duration::hours(1);

        assert_eq!(
            policy.validate_window(start, start, now()),
            Err(BookingError::Validation(ValidationError::EndNotAfterStart))
        );
        assert_eq!(
            policy.validate_window(now() - Duration::minutes(1), start, now()),
            Err(BookingError::Policy(PolicyViolation::StartsInPast))
        );
    }

    #[test]
    fn cancellation_needs_an_hour_of_notice() {
        let policy = BookingPolicy::default();

        assert!(policy.check_cancellation(now() + Duration::minutes(61), now()).is_ok());
        assert!(policy.check_cancellation(now() + Duration::minutes(60), now()).is_ok());
        assert_eq!(
            policy.check_cancellation(now() + Duration::minutes(59), now()),
            Err(PolicyViolation::CancellationTooLate { notice_minutes: 60, minutes_until_start: 59 })
        );
    }

    #[test]
    fn participant_cap_and_addresses_are_enforced() {
        let policy = BookingPolicy { max_participants: 2, ..BookingPolicy::default() };
        let start = now() + Duration::hours(2);

        let mut crowded = draft(start, start + Duration::hours(1));
        crowded.participants =
            vec!["a@x.com".to_string(), "b@x.com".to_string(), "c@x.com".to_string()];
        assert!(matches!(
            policy.validate_draft(&crowded, now()),
            Err(BookingError::Policy(PolicyViolation::TooManyParticipants { max: 2, requested: 3 }))
        ));

        let mut bad_organizer = draft(start, start + Duration::hours(1));
        bad_organizer.organizer = "alice".to_string();
        assert!(matches!(
            policy.validate_draft(&bad_organizer, now()),
            Err(BookingError::Validation(ValidationError::InvalidAddress { .. }))
        ));

        assert!(policy.validate_draft(&draft(start, start + Duration::hours(1)), now()).is_ok());
    }
}
