//! Mission-day boundary rule.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

/// Local hour at which one mission day rolls over into the next.
pub const MISSION_DAY_CUTOFF_HOUR: u32 = 3;

/// The mission day a wall-clock instant belongs to.
///
/// Before 03:00 local, dispatches still account against the previous
/// calendar date, so a mission day is stable across the half-open span
/// [03:00, next-day 03:00).
pub fn mission_day(now: NaiveDateTime) -> NaiveDate {
    if now.hour() < MISSION_DAY_CUTOFF_HOUR {
        (now - Duration::days(1)).date()
    } else {
        now.date()
    }
}
