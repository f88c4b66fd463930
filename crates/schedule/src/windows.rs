//! Peak-window boundary tables and the dispatch-minute grid.

use chrono::NaiveTime;
use mission_core::{DispatchError, PeakName};
use serde::{Deserialize, Serialize};

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("static time literal")
}

/// One of the four daily time bands, with local-time boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub name: PeakName,
    pub start: NaiveTime,
    /// Exclusive end. `end < start` means the window wraps past midnight.
    pub end: NaiveTime,
}

impl PeakWindow {
    pub fn new(name: PeakName, start: NaiveTime, end: NaiveTime) -> Self {
        Self { name, start, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Half-open membership test with midnight wraparound.
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.wraps_midnight() {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }

    /// Peak windows carry the dense 15-minute dispatch grid.
    pub fn is_peak(&self) -> bool {
        matches!(self.name, PeakName::MorningLunch | PeakName::Evening)
    }
}

/// The four windows for one day class (workday or rest day).
///
/// Construction validates the partition invariant: windows appear in
/// [`PeakName::ALL`] order, each window ends where the next begins, the last
/// wraps back to the first, and only the late-night window crosses midnight.
/// Together that covers the 24h clock with no gaps and no overlaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTable {
    windows: [PeakWindow; 4],
}

impl WindowTable {
    pub fn new(windows: [PeakWindow; 4]) -> Result<Self, DispatchError> {
        for (window, expected) in windows.iter().zip(PeakName::ALL) {
            if window.name != expected {
                return Err(DispatchError::Configuration(format!(
                    "window table out of order: expected {expected}, got {}",
                    window.name
                )));
            }
        }
        for i in 0..4 {
            let next = &windows[(i + 1) % 4];
            if windows[i].end != next.start {
                return Err(DispatchError::Configuration(format!(
                    "window '{}' ends at {} but '{}' starts at {}",
                    windows[i].name, windows[i].end, next.name, next.start
                )));
            }
        }
        for window in &windows[..3] {
            if window.wraps_midnight() {
                return Err(DispatchError::Configuration(format!(
                    "window '{}' must not cross midnight",
                    window.name
                )));
            }
        }
        if !windows[3].wraps_midnight() {
            return Err(DispatchError::Configuration(
                "late-night window must cross midnight".to_string(),
            ));
        }
        Ok(Self { windows })
    }

    /// Workday boundaries: 06–13 / 13–17 / 17–21 / 21–06.
    pub fn workday() -> Self {
        Self::new([
            PeakWindow::new(PeakName::MorningLunch, hm(6, 0), hm(13, 0)),
            PeakWindow::new(PeakName::AfternoonOffPeak, hm(13, 0), hm(17, 0)),
            PeakWindow::new(PeakName::Evening, hm(17, 0), hm(21, 0)),
            PeakWindow::new(PeakName::LateNightOffPeak, hm(21, 0), hm(6, 0)),
        ])
        .expect("builtin workday table is a valid partition")
    }

    /// Rest-day boundaries: the morning window extends to 14:00 and the
    /// late-night boundary moves to 22:00.
    pub fn rest_day() -> Self {
        Self::new([
            PeakWindow::new(PeakName::MorningLunch, hm(6, 0), hm(14, 0)),
            PeakWindow::new(PeakName::AfternoonOffPeak, hm(14, 0), hm(17, 0)),
            PeakWindow::new(PeakName::Evening, hm(17, 0), hm(22, 0)),
            PeakWindow::new(PeakName::LateNightOffPeak, hm(22, 0), hm(6, 0)),
        ])
        .expect("builtin rest-day table is a valid partition")
    }

    /// The single window containing `t`. The partition invariant makes this
    /// total over the 24h clock.
    pub fn window_at(&self, t: NaiveTime) -> &PeakWindow {
        self.windows
            .iter()
            .find(|w| w.contains(t))
            .expect("validated window table partitions the clock")
    }

    pub fn windows(&self) -> &[PeakWindow; 4] {
        &self.windows
    }
}

/// Dispatch-minute grid plus the two fixed special slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchGrid {
    /// Minutes past the hour that fire during peak windows.
    pub peak_minutes: Vec<u32>,
    /// Minutes past the hour that fire during off-peak windows.
    pub off_peak_minutes: Vec<u32>,
    /// Hour whose :00 slot always fires a day-start report.
    pub day_start_hour: u32,
}

impl Default for DispatchGrid {
    fn default() -> Self {
        Self {
            peak_minutes: vec![0, 15, 30, 45],
            off_peak_minutes: vec![0, 30],
            day_start_hour: 9,
        }
    }
}

impl DispatchGrid {
    /// Reject malformed grids at startup instead of silently defaulting.
    pub fn validate(&self) -> Result<(), DispatchError> {
        for (label, minutes) in [("peak", &self.peak_minutes), ("off-peak", &self.off_peak_minutes)]
        {
            if minutes.is_empty() {
                return Err(DispatchError::Configuration(format!(
                    "{label} grid must list at least one minute"
                )));
            }
            if minutes.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(DispatchError::Configuration(format!(
                    "{label} grid minutes must be strictly ascending"
                )));
            }
            if let Some(&bad) = minutes.iter().find(|&&m| m > 59) {
                return Err(DispatchError::Configuration(format!(
                    "{label} grid minute {bad} out of range"
                )));
            }
        }
        if self.day_start_hour > 23 {
            return Err(DispatchError::Configuration(format!(
                "day start hour {} out of range",
                self.day_start_hour
            )));
        }
        Ok(())
    }

    pub fn minutes_for(&self, is_peak: bool) -> &[u32] {
        if is_peak {
            &self.peak_minutes
        } else {
            &self.off_peak_minutes
        }
    }
}
