//! Weekly as-of date sequencing.
//!
//! The Fed publishes one SOMA summary per week, as of a fixed weekday
//! (Wednesday by default). Everything here is pure date arithmetic.

use crate::types::AsOfDate;
use chrono::{Datelike, Days, Weekday};
use serde::Serialize;

/// Days to move forward from `from` to land on `anchor` (0 if already there).
fn days_until(from: Weekday, anchor: Weekday) -> u64 {
    let from = from.num_days_from_monday();
    let to = anchor.num_days_from_monday();
    u64::from((to + 7 - from) % 7)
}

/// First anchor date on or after `date`.
pub fn anchor_on_or_after(date: AsOfDate, anchor: Weekday) -> Option<AsOfDate> {
    date.checked_add_days(Days::new(days_until(date.weekday(), anchor)))
}

/// First anchor date strictly after `date`.
pub fn next_anchor_after(date: AsOfDate, anchor: Weekday) -> Option<AsOfDate> {
    date.succ_opt().and_then(|d| anchor_on_or_after(d, anchor))
}

/// Ordered weekly dates in an inclusive range.
///
/// A clone continues from the same position; build a new one (or call
/// [`FetchWindow::dates`] again) to restart from the beginning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyDates {
    next: Option<AsOfDate>,
    end:  AsOfDate,
}

impl Iterator for WeeklyDates {
    type Item = AsOfDate;

    fn next(&mut self) -> Option<AsOfDate> {
        let current = self.next.filter(|d| *d <= self.end)?;
        self.next = current.checked_add_days(Days::new(7));
        Some(current)
    }
}

/// Every `anchor` weekday in `[start, end]`, ascending. Empty if none.
pub fn weekly_dates(start: AsOfDate, end: AsOfDate, anchor: Weekday) -> WeeklyDates {
    WeeklyDates { next: anchor_on_or_after(start, anchor), end }
}

/// The candidate as-of dates of one run. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchWindow {
    pub start:  AsOfDate,
    pub end:    AsOfDate,
    #[serde(serialize_with = "serialize_weekday")]
    pub anchor: Weekday,
}

impl FetchWindow {
    /// Historical range, both ends inclusive.
    pub fn backfill(start: AsOfDate, end: AsOfDate, anchor: Weekday) -> Self {
        Self { start, end, anchor }
    }

    /// Dates newer than `last_stored`, through `today`.
    ///
    /// Starts at the day after `last_stored`; the sequencer rounds that
    /// forward to the anchor weekday.
    pub fn incremental(last_stored: AsOfDate, today: AsOfDate, anchor: Weekday) -> Self {
        match last_stored.succ_opt() {
            Some(start) => Self { start, end: today, anchor },
            // Nothing is newer than the last representable date.
            None => Self { start: last_stored, end: AsOfDate::MIN, anchor },
        }
    }

    pub fn dates(&self) -> WeeklyDates {
        weekly_dates(self.start, self.end, self.anchor)
    }

    pub fn is_empty(&self) -> bool {
        self.dates().next().is_none()
    }
}

fn serialize_weekday<S: serde::Serializer>(w: &Weekday, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&w.to_string())
}
