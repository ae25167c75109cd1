//! Converts human time expressions into absolute instants.
//!
//! Shapes are tried in declaration order and the first one that matches wins:
//!
//! 1. `YYYY-MM-DD HH:MM`
//! 2. `HH:MM` on the base date, optionally prefixed with `오전`/`오후`
//! 3. `<h>시 <m>분` on the base date, optionally prefixed with `오전`/`오후`
//! 4. `<h>시` on the base date, optionally prefixed with `오전`/`오후`
//! 5. `오전 <h>` on the base date
//! 6. `오후 <h>` on the base date (12 hours added)
//! 7. RFC 3339 or `YYYY-MM-DDTHH:MM[:SS]` as a fallback
//!
//! Wall-clock expressions are read as UTC.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognized time expression `{0}`")]
pub struct TimeParseError(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shape {
    FullDateTime,
    ClockTime,
    HourMinute,
    Hour,
    Morning,
    Afternoon,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Meridiem {
    Morning,
    Afternoon,
}

const SHAPES: &[(Shape, &str)] = &[
    (Shape::FullDateTime, r"(\d{4})-(\d{2})-(\d{2})\s+(\d{1,2}):(\d{2})"),
    (Shape::ClockTime, r"(?:^|[^\dT:+\-])(?:(오전|오후)\s*)?(\d{1,2}):(\d{2})(?:$|[^\d:])"),
    (Shape::HourMinute, r"(?:(오전|오후)\s*)?(\d{1,2})시\s*(\d{1,2})분?"),
    (Shape::Hour, r"(?:(오전|오후)\s*)?(\d{1,2})시"),
    (Shape::Morning, r"오전\s*(\d{1,2})"),
    (Shape::Afternoon, r"오후\s*(\d{1,2})"),
];

fn shapes() -> &'static [(Shape, Regex)] {
    static COMPILED: OnceLock<Vec<(Shape, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        SHAPES
            .iter()
            .filter_map(|(shape, pattern)| Regex::new(pattern).ok().map(|regex| (*shape, regex)))
            .collect()
    })
}

/// Parses `raw` into an instant. Date-less shapes land on `base_date`, or on the
/// calendar date of `now` when no base date is given.
pub fn parse_instant(
    raw: &str,
    base_date: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let text = raw.trim();
    let base_date = base_date.unwrap_or_else(|| now.date_naive());
    let unrecognized = || TimeParseError(text.to_string());

    for (shape, regex) in shapes() {
        if let Some(captures) = regex.captures(text) {
            let instant = resolve(*shape, &captures, base_date).ok_or_else(unrecognized)?;
            return Ok(instant);
        }
    }

    parse_machine_timestamp(text).ok_or_else(unrecognized)
}

fn resolve(shape: Shape, captures: &Captures<'_>, base_date: NaiveDate) -> Option<DateTime<Utc>> {
    match shape {
        Shape::FullDateTime => {
            let date = NaiveDate::from_ymd_opt(
                number(captures, 1)?,
                number(captures, 2)?,
                number(captures, 3)?,
            )?;
            at(date, number(captures, 4)?, number(captures, 5)?)
        }
        Shape::ClockTime => {
            let hour = adjust_hour(number(captures, 2)?, meridiem(captures, 1));
            at(base_date, hour, number(captures, 3)?)
        }
        Shape::HourMinute => {
            let hour = adjust_hour(number(captures, 2)?, meridiem(captures, 1));
            at(base_date, hour, number(captures, 3)?)
        }
        Shape::Hour => {
            let hour = adjust_hour(number(captures, 2)?, meridiem(captures, 1));
            at(base_date, hour, 0)
        }
        Shape::Morning => {
            at(base_date, adjust_hour(number(captures, 1)?, Some(Meridiem::Morning)), 0)
        }
        Shape::Afternoon => {
            at(base_date, adjust_hour(number(captures, 1)?, Some(Meridiem::Afternoon)), 0)
        }
    }
}

fn number<T: std::str::FromStr>(captures: &Captures<'_>, index: usize) -> Option<T> {
    captures.get(index)?.as_str().parse().ok()
}

fn meridiem(captures: &Captures<'_>, index: usize) -> Option<Meridiem> {
    match captures.get(index)?.as_str() {
        "오전" => Some(Meridiem::Morning),
        "오후" => Some(Meridiem::Afternoon),
        _ => None,
    }
}

fn adjust_hour(hour: u32, meridiem: Option<Meridiem>) -> u32 {
    match meridiem {
        Some(Meridiem::Afternoon) if hour < 12 => hour + 12,
        Some(Meridiem::Morning) if hour == 12 => 0,
        _ => hour,
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(NaiveDateTime::new(date, time).and_utc())
}

fn parse_machine_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}
