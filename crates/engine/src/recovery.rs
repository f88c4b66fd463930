//! Missed-slot recovery sweep.
//!
//! Runs on its own cadence, independent of the per-minute tick: enumerate
//! the expected slots over a short lookback, ask the history store which
//! lack a sent record, and replay the normal dispatch path oldest-first.
//! Slots too old to serve with current data are marked and skipped; the
//! sweep never fabricates historical snapshots.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use mission_core::RestDayInfo;
use mission_schedule::scheduler::truncate_to_minute;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{DispatchDecisionEngine, SkipReason, TickOutcome};

/// Summary of one recovery sweep.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    /// Missing slots the sweep looked at.
    pub examined: usize,
    /// Slots a dispatch actually went out for.
    pub recovered: usize,
    pub outcomes: Vec<(NaiveDateTime, TickOutcome)>,
}

impl DispatchDecisionEngine {
    /// Sweep the lookback window for missed slots and replay them.
    pub async fn run_recovery(&self, now: NaiveDateTime, lookback: Duration) -> RecoveryReport {
        let horizon = now - lookback;
        // The current minute belongs to the live tick, not the sweep.
        let upper = truncate_to_minute(now);

        // Resolve every date in the window up front so the sweep holds one
        // consistent classification per day.
        let mut rest_days: HashMap<NaiveDate, RestDayInfo> = HashMap::new();
        let mut date = horizon.date();
        while date <= upper.date() {
            rest_days.insert(date, self.provider.rest_day_info(date).await);
            date += Duration::days(1);
        }
        let resolve = |d: NaiveDate| {
            rest_days
                .get(&d)
                .cloned()
                .unwrap_or_else(|| RestDayInfo::weekday_only(d))
        };

        let expected = self.scheduler.expected_slots_between(horizon, upper, &resolve);
        let missing = self.history.find_missing_slots(&expected, now, lookback);
        if missing.is_empty() {
            return RecoveryReport {
                examined: 0,
                recovered: 0,
                outcomes: Vec::new(),
            };
        }
        info!(missing = missing.len(), "recovery sweep found unsent slots");

        let freshness = self.validator.freshness_max();
        let mut outcomes = Vec::new();
        let mut recovered = 0;

        for slot in missing {
            // Current data can only stand in for a slot within the
            // freshness window; older slots can never be served honestly
            // and are marked, not dispatched.
            if now - slot > freshness {
                outcomes.push((
                    slot,
                    TickOutcome::Skipped {
                        target_minute: Some(slot),
                        reason: SkipReason::StaleForRecovery,
                    },
                ));
                continue;
            }

            let rest = resolve(slot.date());
            let Some(kind) = self.scheduler.slot_kind_at(slot, &rest) else {
                continue;
            };

            match self.dispatch_slot(slot, kind, now).await {
                Ok(outcome) => {
                    if outcome.is_dispatched() {
                        recovered += 1;
                        info!(slot = %slot, "recovered missed slot");
                    }
                    let stop = matches!(
                        &outcome,
                        TickOutcome::Skipped {
                            reason: SkipReason::InvalidData(_) | SkipReason::NoSnapshot,
                            ..
                        }
                    );
                    outcomes.push((slot, outcome));
                    if stop {
                        // Every later slot would fail against the same
                        // snapshot; wait for fresh data instead.
                        break;
                    }
                }
                Err(e) => {
                    warn!(slot = %slot, error = %e, "recovery dispatch failed");
                    outcomes.push((
                        slot,
                        TickOutcome::Skipped {
                            target_minute: Some(slot),
                            reason: SkipReason::Failure(e.to_string()),
                        },
                    ));
                }
            }
        }

        RecoveryReport {
            examined: outcomes.len(),
            recovered,
            outcomes,
        }
    }
}
