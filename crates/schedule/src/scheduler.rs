//! [`TimeWindowScheduler`] — pure slot evaluation over the window tables.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use mission_core::{DispatchError, RestDayInfo};
use serde::{Deserialize, Serialize};

use crate::mission_day::mission_day;
use crate::windows::{DispatchGrid, PeakWindow, WindowTable};

/// What kind of dispatch a slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Ordinary grid slot.
    Regular,
    /// The configured day-start report (default 09:00), fires on any grid.
    DayStart,
    /// The 00:00 day-closing report, fires on any grid.
    DayClose,
}

/// Result of evaluating one instant against the schedule.
///
/// The rest-day classification is resolved once by the caller and threaded
/// through, so a cache refresh between two reads cannot split one dispatch
/// attempt across peak and off-peak rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEvaluation {
    pub mission_day: NaiveDate,
    pub window: PeakWindow,
    pub is_peak: bool,
    /// `Some` when `now` (truncated to the minute) is an expected slot.
    pub slot: Option<SlotKind>,
    /// Expected dispatch minutes for the current hour, special slots included.
    pub expected_minutes: Vec<u32>,
    pub rest_day: RestDayInfo,
}

/// Holiday-aware dispatch scheduler.
pub struct TimeWindowScheduler {
    workday: WindowTable,
    rest_day: WindowTable,
    grid: DispatchGrid,
}

impl TimeWindowScheduler {
    /// Build a scheduler, rejecting malformed tables or grids.
    pub fn new(
        workday: WindowTable,
        rest_day: WindowTable,
        grid: DispatchGrid,
    ) -> Result<Self, DispatchError> {
        grid.validate()?;
        Ok(Self {
            workday,
            rest_day,
            grid,
        })
    }

    /// Scheduler with the builtin boundary tables and default grid.
    pub fn with_defaults() -> Self {
        Self {
            workday: WindowTable::workday(),
            rest_day: WindowTable::rest_day(),
            grid: DispatchGrid::default(),
        }
    }

    fn table_for(&self, rest: &RestDayInfo) -> &WindowTable {
        if rest.is_rest_day {
            &self.rest_day
        } else {
            &self.workday
        }
    }

    /// Evaluate one instant. `rest` must be the classification of
    /// `now.date()`, resolved before calling — this function never queries.
    pub fn evaluate(&self, now: NaiveDateTime, rest: &RestDayInfo) -> SlotEvaluation {
        let window = self.table_for(rest).window_at(now.time()).clone();
        let is_peak = window.is_peak();

        let mut expected_minutes: Vec<u32> = self.grid.minutes_for(is_peak).to_vec();
        let hour = now.hour();
        if (hour == self.grid.day_start_hour || hour == 0) && !expected_minutes.contains(&0) {
            expected_minutes.insert(0, 0);
        }

        SlotEvaluation {
            mission_day: mission_day(now),
            slot: self.slot_kind_at(now, rest),
            window,
            is_peak,
            expected_minutes,
            rest_day: rest.clone(),
        }
    }

    /// Slot classification for one minute; `None` when nothing is due.
    ///
    /// The two special slots override grid membership: the day-start hour's
    /// :00 always fires, and 00:00 always fires the day-closing variant.
    pub fn slot_kind_at(&self, now: NaiveDateTime, rest: &RestDayInfo) -> Option<SlotKind> {
        let (hour, minute) = (now.hour(), now.minute());
        if hour == 0 && minute == 0 {
            return Some(SlotKind::DayClose);
        }
        if hour == self.grid.day_start_hour && minute == 0 {
            return Some(SlotKind::DayStart);
        }
        let is_peak = self.table_for(rest).window_at(now.time()).is_peak();
        if self.grid.minutes_for(is_peak).contains(&minute) {
            Some(SlotKind::Regular)
        } else {
            None
        }
    }

    /// First expected slot strictly after `after`.
    ///
    /// `resolve` maps a calendar date to its rest-day classification (the
    /// caller resolves from its cache; this stays a pure scan). The grid
    /// always fires at least twice per hour, so the scan is short.
    pub fn next_expected_slot<F>(&self, after: NaiveDateTime, resolve: F) -> NaiveDateTime
    where
        F: Fn(NaiveDate) -> RestDayInfo,
    {
        let mut t = truncate_to_minute(after) + Duration::minutes(1);
        loop {
            let rest = resolve(t.date());
            if self.slot_kind_at(t, &rest).is_some() {
                return t;
            }
            t += Duration::minutes(1);
        }
    }

    /// Every expected slot in the half-open range `[from, to)`, ascending.
    /// Feeds the recovery sweep.
    pub fn expected_slots_between<F>(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
        resolve: F,
    ) -> Vec<NaiveDateTime>
    where
        F: Fn(NaiveDate) -> RestDayInfo,
    {
        let mut slots = Vec::new();
        let mut t = truncate_to_minute(from);
        while t < to {
            let rest = resolve(t.date());
            if self.slot_kind_at(t, &rest).is_some() {
                slots.push(t);
            }
            t += Duration::minutes(1);
        }
        slots
    }

    pub fn grid(&self) -> &DispatchGrid {
        &self.grid
    }
}

/// Drop seconds (and anything finer) from an instant.
pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.date()
        .and_hms_opt(t.hour(), t.minute(), 0)
        .expect("hour/minute taken from a valid datetime")
}
