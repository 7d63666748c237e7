// src/data/datetime.rs

//! Functions and types for hour arithmetic over the archive's UTC hourly
//! objects.
//!
//! An hourly object is addressed by a key derived from the hour, see
//! [`hour_key`]. A [`HourRange`] is the half-open span of hours
//! `[floor(start), end)` a scanner must open.

use std::fmt;

#[doc(hidden)]
pub use ::chrono::{
    DateTime,
    Datelike,
    Duration,
    NaiveDate,
    NaiveTime,
    TimeZone,
    Timelike,
    Utc,
};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DateTime typing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A UTC datetime. The archive publishes every hour in UTC.
pub type DateTimeU = DateTime<Utc>;

/// Suffix of every hourly object key.
pub const HOUR_KEY_SUFFIX: &str = ".json.gz";

/// `strftime` format of the date part of an hourly object key.
const HOUR_KEY_DATE_FORMAT: &str = "%Y-%m-%d";

/// `strftime` format of a date-only command-line datetime, taken as UTC
/// midnight.
pub const DATE_ARG_FORMAT: &str = "%Y-%m-%d";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// hour arithmetic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Truncate `dt` to the start of its hour.
pub fn hour_floor(dt: &DateTimeU) -> DateTimeU {
    let naive = dt
        .date_naive()
        .and_time(NaiveTime::default())
        + Duration::hours(dt.hour() as i64);

    Utc.from_utc_datetime(&naive)
}

/// The hour after the hour of `dt`.
pub fn hour_next(dt: &DateTimeU) -> DateTimeU {
    hour_floor(dt) + Duration::hours(1)
}

/// Object key for the hour of `dt`, e.g. `2020-01-02-8.json.gz`.
///
/// The hour component has no leading zero; the archive publishes its keys
/// that way.
pub fn hour_key(dt: &DateTimeU) -> String {
    format!(
        "{}-{}{}",
        dt.format(HOUR_KEY_DATE_FORMAT),
        dt.hour(),
        HOUR_KEY_SUFFIX,
    )
}

/// Parse a datetime passed by a user: RFC 3339, or a bare `YYYY-MM-DD` taken
/// as midnight UTC.
pub fn datetime_parse_arg(value: &str) -> Option<DateTimeU> {
    defn!("({:?})", value);
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        defx!("rfc3339 {:?}", dt);
        return Some(dt.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(value, DATE_ARG_FORMAT) {
        Ok(date) => {
            let dt = Utc.from_utc_datetime(&date.and_time(NaiveTime::default()));
            defx!("date {:?}", dt);

            Some(dt)
        }
        Err(_err) => {
            defx!("invalid {}", _err);

            None
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HourRange
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The half-open range of hours `[floor(start), end)`.
///
/// An hour `h` is in the range iff `floor(start) <= h < end`, so an `end`
/// in the middle of an hour includes that hour and an `end` exactly on an
/// hour boundary excludes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HourRange {
    start: DateTimeU,
    end: DateTimeU,
}

impl HourRange {
    pub fn new(start: DateTimeU, end: DateTimeU) -> HourRange {
        HourRange {
            start: hour_floor(&start),
            end,
        }
    }

    /// The first hour, floored.
    pub const fn start(&self) -> DateTimeU {
        self.start
    }

    pub const fn end(&self) -> DateTimeU {
        self.end
    }

    /// Is `hour` (already floored) inside the range?
    pub fn contains(&self, hour: &DateTimeU) -> bool {
        &self.start <= hour && hour < &self.end
    }

    /// Count of hours in the range.
    pub fn len(&self) -> usize {
        if self.end <= self.start {
            return 0;
        }
        let secs: i64 = (self.end - self.start).num_seconds();

        ((secs + 3599) / 3600) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the floored hours of the range in chronological order.
    pub fn iter(&self) -> HourRangeIter {
        HourRangeIter {
            next: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for HourRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

impl IntoIterator for &HourRange {
    type Item = DateTimeU;
    type IntoIter = HourRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the hours of a [`HourRange`].
pub struct HourRangeIter {
    next: DateTimeU,
    end: DateTimeU,
}

impl Iterator for HourRangeIter {
    type Item = DateTimeU;

    fn next(&mut self) -> Option<DateTimeU> {
        if self.next >= self.end {
            return None;
        }
        let hour = self.next;
        self.next = hour + Duration::hours(1);

        Some(hour)
    }
}
