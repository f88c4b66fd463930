//! [`DispatchDecisionEngine`] — one decision per tick.

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use mission_analytics::AnomalyAnalytics;
use mission_calendar::HolidayProvider;
use mission_core::{DispatchError, MissionSnapshot, RestDayInfo};
use mission_history::{HistoryError, SendHistoryStore, SendOutcome};
use mission_schedule::{scheduler::truncate_to_minute, SlotKind, TimeWindowScheduler};
use mission_validator::{DataValidator, RepairOutcome};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::traits::{DispatchRequest, DispatchSink, SnapshotSource};

/// Why a tick did not dispatch. Routine reasons are expected outcomes, not
/// errors; operators see these strings instead of stack traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not an expected slot right now.
    OutsideSchedule,
    /// The slot already has a sent record (possibly from a racing sweep).
    Duplicate,
    /// Snapshot failed validation and could not be repaired.
    InvalidData(String),
    /// The collector has no snapshot this cycle.
    NoSnapshot,
    /// Recovery reached a slot too old to serve with current data.
    StaleForRecovery,
    /// Unexpected failure, logged with context and converted to a skip.
    Failure(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::OutsideSchedule => write!(f, "outside operating schedule"),
            SkipReason::Duplicate => write!(f, "slot already sent"),
            SkipReason::InvalidData(detail) => write!(f, "invalid data: {detail}"),
            SkipReason::NoSnapshot => write!(f, "no snapshot available"),
            SkipReason::StaleForRecovery => write!(f, "slot too old to recover"),
            SkipReason::Failure(detail) => write!(f, "failure: {detail}"),
        }
    }
}

/// Terminal outcome of one engine invocation. Level-triggered: repeated
/// ticks in the same minute converge on `Skipped(Duplicate)` because the
/// history store enforces the one-winner rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TickOutcome {
    Dispatched {
        target_minute: NaiveDateTime,
        slot_kind: SlotKind,
        message_id: String,
    },
    Skipped {
        target_minute: Option<NaiveDateTime>,
        reason: SkipReason,
    },
}

impl TickOutcome {
    fn skipped(target_minute: Option<NaiveDateTime>, reason: SkipReason) -> Self {
        TickOutcome::Skipped { target_minute, reason }
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self, TickOutcome::Dispatched { .. })
    }
}

/// Orchestrates calendar, scheduler, history, validator, and analytics.
pub struct DispatchDecisionEngine {
    pub(crate) scheduler: TimeWindowScheduler,
    pub(crate) provider: Arc<HolidayProvider>,
    pub(crate) history: Arc<SendHistoryStore>,
    pub(crate) validator: DataValidator,
    pub(crate) analytics: Mutex<AnomalyAnalytics>,
    sink: Arc<dyn DispatchSink>,
    source: Arc<dyn SnapshotSource>,
}

impl DispatchDecisionEngine {
    pub fn new(
        scheduler: TimeWindowScheduler,
        provider: Arc<HolidayProvider>,
        history: Arc<SendHistoryStore>,
        validator: DataValidator,
        sink: Arc<dyn DispatchSink>,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        Self {
            scheduler,
            provider,
            history,
            validator,
            analytics: Mutex::new(AnomalyAnalytics::new()),
            sink,
            source,
        }
    }

    /// Evaluate one tick. Never returns an error: everything unexpected is
    /// converted to `Skipped(Failure)` at this boundary so the worker loop
    /// cannot crash on a routine scheduling miss.
    pub async fn tick(&self, now: NaiveDateTime) -> TickOutcome {
        // Rest-day classification is resolved exactly once per attempt; a
        // cache refresh mid-decision cannot split the classification.
        let rest = self.provider.rest_day_info(now.date()).await;

        match self.try_tick(now, &rest).await {
            Ok(outcome) => {
                match &outcome {
                    TickOutcome::Dispatched { target_minute, message_id, .. } => {
                        info!(slot = %target_minute, message_id, "dispatched");
                    }
                    TickOutcome::Skipped { reason, .. } => {
                        debug!(reason = %reason, "tick skipped");
                    }
                }
                outcome
            }
            Err(e) => {
                error!(error = %e, at = %now, "tick failed unexpectedly");
                TickOutcome::skipped(
                    Some(truncate_to_minute(now)),
                    SkipReason::Failure(e.to_string()),
                )
            }
        }
    }

    async fn try_tick(
        &self,
        now: NaiveDateTime,
        rest: &RestDayInfo,
    ) -> Result<TickOutcome, DispatchError> {
        let eval = self.scheduler.evaluate(now, rest);
        let Some(kind) = eval.slot else {
            return Ok(TickOutcome::skipped(None, SkipReason::OutsideSchedule));
        };
        self.dispatch_slot(truncate_to_minute(now), kind, now).await
    }

    /// The shared dispatch path for live ticks and recovery replays.
    pub(crate) async fn dispatch_slot(
        &self,
        slot: NaiveDateTime,
        kind: SlotKind,
        now: NaiveDateTime,
    ) -> Result<TickOutcome, DispatchError> {
        if self.history.has_sent_for_slot(slot) {
            return Ok(TickOutcome::skipped(Some(slot), SkipReason::Duplicate));
        }

        let snapshot = match self
            .source
            .latest()
            .await
            .map_err(|e| DispatchError::TransientIo(e.to_string()))?
        {
            Some(snapshot) => snapshot,
            None => return Ok(TickOutcome::skipped(Some(slot), SkipReason::NoSnapshot)),
        };

        let chosen: MissionSnapshot =
            match self.validator.validate_with_repair(&snapshot, "collector", now) {
                RepairOutcome::Clean(_) => snapshot,
                RepairOutcome::Repaired { snapshot: repaired, original, .. } => {
                    warn!(
                        slot = %slot,
                        errors = original.errors.len(),
                        "snapshot repaired before dispatch"
                    );
                    repaired
                }
                RepairOutcome::Rejected(report) => {
                    let summary = report.summary();
                    self.record_attempt(slot, SendOutcome::Skipped, "", now);
                    return Ok(TickOutcome::skipped(
                        Some(slot),
                        SkipReason::InvalidData(summary),
                    ));
                }
            };

        let request = DispatchRequest {
            target_minute: slot,
            slot_kind: kind,
            message_id: Uuid::new_v4().to_string(),
            data_hash: chosen.data_hash(),
            snapshot: chosen,
        };

        if let Err(e) = self.sink.deliver(&request).await {
            warn!(slot = %slot, channel = self.sink.channel_name(), error = %e, "delivery failed");
            self.record_attempt(slot, SendOutcome::Failed, &request.message_id, now);
            return Ok(TickOutcome::skipped(
                Some(slot),
                SkipReason::Failure(e.to_string()),
            ));
        }

        match self
            .history
            .record_sent_at(slot, &request.message_id, &request.data_hash, now)
        {
            Ok(()) => {
                // Sample only the winning send, so a delivery failure plus
                // retry in the same minute cannot feed the rolling window
                // the same snapshot twice.
                self.analytics
                    .lock()
                    .expect("analytics lock poisoned")
                    .add_sample(&request.snapshot);
                Ok(TickOutcome::Dispatched {
                    target_minute: slot,
                    slot_kind: kind,
                    message_id: request.message_id,
                })
            }
            Err(HistoryError::DuplicateSlot(_)) => {
                // Expected when a live tick and a recovery sweep race; the
                // loser simply skips.
                debug!(slot = %slot, "lost the record race, skipping");
                Ok(TickOutcome::skipped(Some(slot), SkipReason::Duplicate))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record_attempt(&self, slot: NaiveDateTime, outcome: SendOutcome, id: &str, now: NaiveDateTime) {
        if let Err(e) = self.history.record_attempt(slot, outcome, id, "", now) {
            warn!(slot = %slot, error = %e, "failed to record attempt");
        }
    }

    /// Validator success rate for the status report.
    pub fn validator_success_rate(&self) -> Option<f64> {
        self.validator.success_rate()
    }
}
