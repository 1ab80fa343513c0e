//! Time slot and instant models.
//!
//! A slot is a bookable (date, time range) cell, optionally tied to a
//! fixed room. Several slots may share the same instant, which is how a
//! dataset expresses parallel capacity.
//!
//! # Time Model
//! Time ranges are half-open `[start, end)` within a single calendar day.
//! Two ranges on the same date conflict iff they overlap; two instants
//! are consecutive iff one ends exactly when the other starts.

use std::fmt;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A time-of-day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Interval start (inclusive).
    pub start: NaiveTime,
    /// Interval end (exclusive).
    pub end: NaiveTime,
}

impl TimeRange {
    /// Creates a new time range.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Creates a range from whole hours and minutes.
    ///
    /// Returns `None` for out-of-range components.
    pub fn from_hm(start_h: u32, start_m: u32, end_h: u32, end_m: u32) -> Option<Self> {
        Some(Self {
            start: NaiveTime::from_hms_opt(start_h, start_m, 0)?,
            end: NaiveTime::from_hms_opt(end_h, end_m, 0)?,
        })
    }

    /// Parses `"HH:MM-HH:MM"` or the hour-only shorthand `"10-11"`.
    ///
    /// Whitespace around either side is ignored. Does not check that the
    /// end follows the start; see [`TimeRange::is_well_formed`].
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = text.split_once('-')?;
        Some(Self {
            start: parse_time(start.trim())?,
            end: parse_time(end.trim())?,
        })
    }

    /// Whether the range has positive length.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.end > self.start
    }

    /// Length in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Whether a time of day falls within this range.
    #[inline]
    pub fn contains(&self, t: NaiveTime) -> bool {
        t >= self.start && t < self.end
    }

    /// Whether two ranges overlap.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start.hour(),
            self.start.minute(),
            self.end.hour(),
            self.end.minute()
        )
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    if text.contains(':') {
        NaiveTime::parse_from_str(text, "%H:%M").ok()
    } else {
        let hour: u32 = text.parse().ok()?;
        NaiveTime::from_hms_opt(hour, 0, 0)
    }
}

/// A (date, time range) pair.
///
/// Orders chronologically: by date, then start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotInstant {
    /// Calendar date.
    pub date: NaiveDate,
    /// Time of day.
    pub range: TimeRange,
}

impl SlotInstant {
    /// Creates a new instant.
    pub fn new(date: NaiveDate, range: TimeRange) -> Self {
        Self { date, range }
    }

    /// Whether two instants share any moment.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.date == other.date && self.range.overlaps(&other.range)
    }

    /// Whether `next` starts exactly when `self` ends on the same day.
    pub fn is_followed_by(&self, next: &Self) -> bool {
        self.date == next.date && self.range.end == next.range.start
    }
}

impl fmt::Display for SlotInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.range)
    }
}

/// A bookable defense slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Unique slot identifier.
    pub id: String,
    /// Calendar date.
    pub date: NaiveDate,
    /// Time of day.
    pub range: TimeRange,
    /// Fixed room, if the slot is tied to one. Normally computed later.
    pub room: Option<String>,
}

impl TimeSlot {
    /// Creates a slot without a fixed room.
    pub fn new(id: impl Into<String>, date: NaiveDate, range: TimeRange) -> Self {
        Self {
            id: id.into(),
            date,
            range,
            room: None,
        }
    }

    /// Ties the slot to a fixed room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// The slot's instant.
    #[inline]
    pub fn instant(&self) -> SlotInstant {
        SlotInstant::new(self.date, self.range)
    }

    /// Length in minutes.
    pub fn duration_minutes(&self) -> i64 {
        self.range.duration_minutes()
    }

    /// Whether both slots denote the same instant.
    pub fn same_instant(&self, other: &Self) -> bool {
        self.date == other.date && self.range == other.range
    }

    /// Whether `other` starts exactly when this slot ends on the same day.
    pub fn is_followed_by(&self, other: &Self) -> bool {
        self.instant().is_followed_by(&other.instant())
    }
}
