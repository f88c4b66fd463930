//! [`DataValidator`] — composes the three stages and tracks its own
//! rolling success rate.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};
use mission_core::MissionSnapshot;
use mission_schedule::mission_day;
use tracing::{debug, warn};

use crate::limits::{CrossCheckLimits, FieldLimits};
use crate::repair::repair_snapshot;
use crate::report::ValidationReport;

/// How many validation outcomes feed the `success_rate` statistic.
const OUTCOME_HISTORY_CAP: usize = 100;

/// What came out of validate-then-repair for one cycle.
#[derive(Debug, Clone)]
pub enum RepairOutcome {
    /// Snapshot passed as-is.
    Clean(ValidationReport),
    /// Snapshot failed, the repaired copy passed; dispatch the copy.
    Repaired {
        snapshot: MissionSnapshot,
        original: ValidationReport,
        repaired: ValidationReport,
    },
    /// Still invalid after one repair pass; skip this cycle.
    Rejected(ValidationReport),
}

/// Three-stage snapshot validator.
pub struct DataValidator {
    /// Snapshots older than this are stale.
    freshness_max: Duration,
    field_limits: FieldLimits,
    cross_limits: CrossCheckLimits,
    /// Rolling pass/fail outcomes, newest at the back.
    outcomes: Mutex<VecDeque<bool>>,
}

impl DataValidator {
    pub fn new(
        freshness_max_minutes: i64,
        field_limits: FieldLimits,
        cross_limits: CrossCheckLimits,
    ) -> Self {
        Self {
            freshness_max: Duration::minutes(freshness_max_minutes),
            field_limits,
            cross_limits,
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Validator with the standard limits and a 30-minute freshness bound.
    pub fn with_defaults() -> Self {
        Self::new(30, FieldLimits::default(), CrossCheckLimits::default())
    }

    // ── Stage 1: freshness ──────────────────────────────────────────

    /// A stale or mis-dated snapshot must never be dispatched, so both
    /// findings are hard errors.
    pub fn check_freshness(
        &self,
        snapshot: &MissionSnapshot,
        now: NaiveDateTime,
        report: &mut ValidationReport,
    ) {
        let age = now - snapshot.timestamp;
        if age > self.freshness_max {
            report.error(
                "timestamp",
                format!(
                    "snapshot is {} minutes old (limit {})",
                    age.num_minutes(),
                    self.freshness_max.num_minutes()
                ),
            );
        }
        let today = mission_day(now);
        if snapshot.mission_date != today {
            report.error(
                "mission_date",
                format!(
                    "snapshot is for {} but the current mission day is {today}",
                    snapshot.mission_date
                ),
            );
        }
    }

    // ── Stage 2: field consistency ──────────────────────────────────

    pub fn check_consistency(&self, snapshot: &MissionSnapshot, report: &mut ValidationReport) {
        let limits = &self.field_limits;

        for (path, value) in [
            ("total_score", snapshot.total_score),
            ("quantity_score", snapshot.quantity_score),
            ("acceptance_score", snapshot.acceptance_score),
            ("acceptance_rate_pct", snapshot.acceptance_rate_pct),
        ] {
            if !(0.0..=limits.pct_max).contains(&value) {
                report.error(path, format!("{value} outside [0, {}]", limits.pct_max));
            }
        }

        for (name, progress) in &snapshot.peaks {
            if progress.current > limits.peak_current_max {
                report.error(
                    format!("peaks.{name}.current"),
                    format!("{} exceeds {}", progress.current, limits.peak_current_max),
                );
            }
            if progress.target > limits.peak_target_max {
                report.error(
                    format!("peaks.{name}.target"),
                    format!("{} exceeds {}", progress.target, limits.peak_target_max),
                );
            }
            // A current far past its target is a parsing fault signature,
            // not legitimate over-achievement.
            if progress.target > 0
                && f64::from(progress.current)
                    > limits.over_target_factor * f64::from(progress.target)
            {
                report.error(
                    format!("peaks.{name}.current"),
                    format!(
                        "{} is more than {}x the target {}",
                        progress.current, limits.over_target_factor, progress.target
                    ),
                );
            }
        }

        for (i, rider) in snapshot.riders.iter().enumerate() {
            if !(0.0..=limits.pct_max).contains(&rider.acceptance_rate_pct) {
                report.error(
                    format!("riders[{i}].acceptance_rate_pct"),
                    format!("{} outside [0, {}]", rider.acceptance_rate_pct, limits.pct_max),
                );
            }
            if !(0.0..=limits.pct_max).contains(&rider.contribution_pct) {
                report.error(
                    format!("riders[{i}].contribution_pct"),
                    format!("{} outside [0, {}]", rider.contribution_pct, limits.pct_max),
                );
            }
        }
    }

    // ── Stage 3: cross-field consistency ────────────────────────────

    pub fn cross_validate(&self, snapshot: &MissionSnapshot, report: &mut ValidationReport) {
        let limits = &self.cross_limits;

        let peak_sum = snapshot.peaks_completed_sum();
        let rider_sum = snapshot.riders_completed_sum();
        let diff = peak_sum.abs_diff(rider_sum);
        if diff > limits.completed_sum_tolerance {
            report.error(
                "peaks/riders",
                format!(
                    "peak completions ({peak_sum}) and rider completions ({rider_sum}) \
                     differ by {diff} (tolerance {})",
                    limits.completed_sum_tolerance
                ),
            );
        }

        let contribution_sum: f64 = snapshot.riders.iter().map(|r| r.contribution_pct).sum();
        // Rounding inflates the total slightly; only flag past the ceiling.
        if contribution_sum > limits.contribution_sum_ceiling_pct {
            report.warn(
                "riders.contribution_pct",
                format!(
                    "contributions sum to {contribution_sum:.1}% (ceiling {:.0}%)",
                    limits.contribution_sum_ceiling_pct
                ),
            );
        }

        for (i, rider) in snapshot.riders.iter().enumerate() {
            if !(0.0..=100.0).contains(&rider.contribution_pct) {
                report.error(
                    format!("riders[{i}].contribution_pct"),
                    format!("{} outside [0, 100]", rider.contribution_pct),
                );
            }
        }
    }

    // ── Composition ─────────────────────────────────────────────────

    /// Run all three stages and record the outcome in the rolling history.
    pub fn validate(
        &self,
        snapshot: &MissionSnapshot,
        source: &str,
        now: NaiveDateTime,
    ) -> ValidationReport {
        let mut report = ValidationReport::new(source, now);
        self.check_freshness(snapshot, now, &mut report);
        self.check_consistency(snapshot, &mut report);
        self.cross_validate(snapshot, &mut report);
        report.dedup();

        self.record_outcome(report.is_valid);
        if !report.is_valid {
            warn!(source, summary = %report.summary(), "snapshot failed validation");
        }
        report
    }

    /// Validate, and on failure attempt one repair pass followed by exactly
    /// one re-validation. Never recursive; freshness failures are not
    /// repairable.
    pub fn validate_with_repair(
        &self,
        snapshot: &MissionSnapshot,
        source: &str,
        now: NaiveDateTime,
    ) -> RepairOutcome {
        let original = self.validate(snapshot, source, now);
        if original.is_valid {
            return RepairOutcome::Clean(original);
        }

        let repaired_snapshot = match repair_snapshot(snapshot, &original, &self.field_limits) {
            Some(candidate) => candidate,
            None => return RepairOutcome::Rejected(original),
        };

        let repaired = self.validate(&repaired_snapshot, source, now);
        if repaired.is_valid {
            debug!(source, "snapshot repaired and revalidated");
            RepairOutcome::Repaired {
                snapshot: repaired_snapshot,
                original,
                repaired,
            }
        } else {
            // Never dispatch unrepaired bad data; the original is discarded.
            RepairOutcome::Rejected(original)
        }
    }

    /// The freshness bound, exposed for the recovery sweep's staleness gate.
    pub fn freshness_max(&self) -> Duration {
        self.freshness_max
    }

    // ── Rolling outcome history ─────────────────────────────────────

    fn record_outcome(&self, passed: bool) {
        let mut outcomes = self.outcomes.lock().expect("outcome history lock poisoned");
        outcomes.push_back(passed);
        while outcomes.len() > OUTCOME_HISTORY_CAP {
            outcomes.pop_front();
        }
    }

    /// Fraction of recent validations that passed; `None` before any run.
    pub fn success_rate(&self) -> Option<f64> {
        let outcomes = self.outcomes.lock().expect("outcome history lock poisoned");
        if outcomes.is_empty() {
            return None;
        }
        let passed = outcomes.iter().filter(|&&ok| ok).count();
        Some(passed as f64 / outcomes.len() as f64)
    }
}
