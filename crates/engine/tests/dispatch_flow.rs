//! End-to-end engine behavior against in-memory fakes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};

use mission_calendar::{HolidayProvider, RegistryError, SpecialDay, SpecialDayRegistry};
use mission_core::{MissionSnapshot, PeakName, PeakProgress, RiderStat};
use mission_engine::{
    DispatchDecisionEngine, DispatchRequest, DispatchSink, SinkError, SkipReason, SnapshotSource,
    SourceError, TickOutcome,
};
use mission_history::SendHistoryStore;
use mission_schedule::TimeWindowScheduler;
use mission_validator::{CrossCheckLimits, DataValidator, FieldLimits};

// ── Fakes ───────────────────────────────────────────────────────────

struct EmptyRegistry;

#[async_trait]
impl SpecialDayRegistry for EmptyRegistry {
    async fn fetch_month(&self, _year: i32, _month: u32) -> Result<Vec<SpecialDay>, RegistryError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeSink {
    fail: AtomicBool,
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl DispatchSink for FakeSink {
    async fn deliver(&self, request: &DispatchRequest) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Delivery("channel down".into()));
        }
        self.delivered
            .lock()
            .unwrap()
            .push(request.message_id.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "fake"
    }
}

struct StaticSource {
    snapshot: Mutex<Option<MissionSnapshot>>,
}

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn latest(&self) -> Result<Option<MissionSnapshot>, SourceError> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

/// A consistent snapshot stamped at `timestamp` (peaks sum == riders sum ==
/// total, contributions sum to 100).
fn snapshot_at(timestamp: NaiveDateTime) -> MissionSnapshot {
    let mut peaks = BTreeMap::new();
    peaks.insert(PeakName::MorningLunch, PeakProgress { current: 10, target: 20 });
    peaks.insert(PeakName::Evening, PeakProgress { current: 5, target: 30 });
    MissionSnapshot {
        total_score: 85.0,
        quantity_score: 80.0,
        acceptance_score: 90.0,
        total_completed: 15,
        total_rejected: 1,
        acceptance_rate_pct: 93.8,
        peaks,
        riders: vec![
            RiderStat {
                name: "rider-a".into(),
                completed: 9,
                per_peak_counts: [6, 0, 3, 0],
                acceptance_rate_pct: 95.0,
                rejected: 1,
                cancelled: 0,
                contribution_pct: 60.0,
            },
            RiderStat {
                name: "rider-b".into(),
                completed: 6,
                per_peak_counts: [4, 0, 2, 0],
                acceptance_rate_pct: 92.0,
                rejected: 0,
                cancelled: 1,
                contribution_pct: 40.0,
            },
        ],
        timestamp,
        mission_date: timestamp.date(),
    }
}

struct Harness {
    engine: DispatchDecisionEngine,
    sink: Arc<FakeSink>,
    source: Arc<StaticSource>,
    history: Arc<SendHistoryStore>,
}

fn harness(snapshot: Option<MissionSnapshot>) -> Harness {
    let sink = Arc::new(FakeSink::default());
    let source = Arc::new(StaticSource {
        snapshot: Mutex::new(snapshot),
    });
    let history = Arc::new(SendHistoryStore::in_memory());
    let engine = DispatchDecisionEngine::new(
        TimeWindowScheduler::with_defaults(),
        Arc::new(HolidayProvider::new(Arc::new(EmptyRegistry))),
        history.clone(),
        DataValidator::new(30, FieldLimits::default(), CrossCheckLimits::default()),
        sink.clone(),
        source.clone(),
    );
    Harness { engine, sink, source, history }
}

// Monday 2025-06-02, 11:45 — a peak-grid slot inside the morning window.
fn slot_time() -> NaiveDateTime {
    at(2025, 6, 2, 11, 45, 20)
}

// ── Tick behavior ───────────────────────────────────────────────────

#[tokio::test]
async fn dispatches_at_an_expected_slot() {
    let now = slot_time();
    let h = harness(Some(snapshot_at(now - Duration::minutes(1))));

    let outcome = h.engine.tick(now).await;
    match outcome {
        TickOutcome::Dispatched { target_minute, .. } => {
            assert_eq!(target_minute, at(2025, 6, 2, 11, 45, 0));
        }
        other => panic!("expected dispatch, got {other:?}"),
    }
    assert_eq!(h.sink.delivered.lock().unwrap().len(), 1);
    assert!(h.history.has_sent_for_slot(at(2025, 6, 2, 11, 45, 0)));
}

#[tokio::test]
async fn second_tick_in_the_same_minute_is_a_duplicate() {
    let now = slot_time();
    let h = harness(Some(snapshot_at(now - Duration::minutes(1))));

    assert!(h.engine.tick(now).await.is_dispatched());
    let second = h.engine.tick(now + Duration::seconds(10)).await;
    assert_eq!(
        second,
        TickOutcome::Skipped {
            target_minute: Some(at(2025, 6, 2, 11, 45, 0)),
            reason: SkipReason::Duplicate,
        }
    );
    assert_eq!(h.sink.delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn off_grid_minute_is_outside_schedule() {
    let now = at(2025, 6, 2, 11, 47, 0);
    let h = harness(Some(snapshot_at(now)));

    let outcome = h.engine.tick(now).await;
    assert_eq!(
        outcome,
        TickOutcome::Skipped { target_minute: None, reason: SkipReason::OutsideSchedule }
    );
    assert!(h.sink.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_snapshot_skips_without_error() {
    let h = harness(None);
    let outcome = h.engine.tick(slot_time()).await;
    assert_eq!(
        outcome,
        TickOutcome::Skipped {
            target_minute: Some(at(2025, 6, 2, 11, 45, 0)),
            reason: SkipReason::NoSnapshot,
        }
    );
}

#[tokio::test]
async fn stale_snapshot_is_rejected_and_the_attempt_recorded() {
    let now = slot_time();
    // Two hours old: past the freshness limit and not repairable.
    let h = harness(Some(snapshot_at(now - Duration::hours(2))));

    let outcome = h.engine.tick(now).await;
    match outcome {
        TickOutcome::Skipped { reason: SkipReason::InvalidData(_), target_minute } => {
            assert_eq!(target_minute, Some(at(2025, 6, 2, 11, 45, 0)));
        }
        other => panic!("expected invalid-data skip, got {other:?}"),
    }
    // No sent record: the slot stays open for a later attempt.
    assert!(!h.history.has_sent_for_slot(at(2025, 6, 2, 11, 45, 0)));
    assert!(h.sink.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn out_of_range_field_is_repaired_and_dispatch_proceeds() {
    let now = slot_time();
    let mut snap = snapshot_at(now - Duration::minutes(1));
    snap.acceptance_rate_pct = 150.0;
    let h = harness(Some(snap));

    assert!(h.engine.tick(now).await.is_dispatched());
}

#[tokio::test]
async fn sink_failure_leaves_the_slot_open_for_retry() {
    let now = slot_time();
    let h = harness(Some(snapshot_at(now - Duration::minutes(1))));
    h.sink.fail.store(true, Ordering::SeqCst);

    let first = h.engine.tick(now).await;
    assert!(matches!(
        first,
        TickOutcome::Skipped { reason: SkipReason::Failure(_), .. }
    ));
    assert!(!h.history.has_sent_for_slot(at(2025, 6, 2, 11, 45, 0)));

    // Channel comes back within the same minute.
    h.sink.fail.store(false, Ordering::SeqCst);
    assert!(h.engine.tick(now + Duration::seconds(15)).await.is_dispatched());
    assert_eq!(h.sink.delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_delivery_does_not_feed_analytics() {
    let now = slot_time();
    let h = harness(Some(snapshot_at(now - Duration::minutes(1))));
    h.sink.fail.store(true, Ordering::SeqCst);

    h.engine.tick(now).await;
    h.sink.fail.store(false, Ordering::SeqCst);
    assert!(h.engine.tick(now + Duration::seconds(15)).await.is_dispatched());

    // One snapshot dispatched once: exactly one sample, despite two attempts.
    let status = h.engine.status(now + Duration::seconds(30)).await;
    assert_eq!(status.samples, 1);
}

#[tokio::test]
async fn concurrent_ticks_produce_exactly_one_dispatch() {
    let now = slot_time();
    let h = harness(Some(snapshot_at(now - Duration::minutes(1))));
    let engine = Arc::new(h.engine);

    let a = tokio::spawn({
        let engine = engine.clone();
        async move { engine.tick(now).await }
    });
    let b = tokio::spawn({
        let engine = engine.clone();
        async move { engine.tick(now).await }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let dispatched = [&a, &b].iter().filter(|o| o.is_dispatched()).count();
    assert_eq!(dispatched, 1, "outcomes: {a:?} / {b:?}");
    assert_eq!(h.sink.delivered.lock().unwrap().len(), 1);
}

// ── Recovery ────────────────────────────────────────────────────────

#[tokio::test]
async fn recovery_backfills_a_recently_missed_slot() {
    let now = at(2025, 6, 2, 11, 46, 30);
    let h = harness(Some(snapshot_at(at(2025, 6, 2, 11, 45, 0))));

    let report = h.engine.run_recovery(now, Duration::minutes(10)).await;
    assert_eq!(report.examined, 1);
    assert_eq!(report.recovered, 1);
    assert!(h.history.has_sent_for_slot(at(2025, 6, 2, 11, 45, 0)));

    // The live tick arriving later sees the slot as already sent.
    let outcome = h.engine.tick(at(2025, 6, 2, 11, 45, 40)).await;
    assert!(matches!(
        outcome,
        TickOutcome::Skipped { reason: SkipReason::Duplicate, .. }
    ));
}

#[tokio::test]
async fn recovery_marks_slots_past_the_freshness_window() {
    let now = at(2025, 6, 2, 11, 46, 0);
    let h = harness(Some(snapshot_at(at(2025, 6, 2, 11, 45, 0))));

    // Two hours of missed peak slots; only those within the 30-minute
    // freshness window may be served with current data.
    let report = h.engine.run_recovery(now, Duration::minutes(120)).await;
    assert_eq!(report.examined, 8); // 10:00 .. 11:45 on the 15-minute grid
    assert_eq!(report.recovered, 2); // 11:30 and 11:45

    let stale = report
        .outcomes
        .iter()
        .filter(|(_, o)| {
            matches!(
                o,
                TickOutcome::Skipped { reason: SkipReason::StaleForRecovery, .. }
            )
        })
        .count();
    assert_eq!(stale, 6);
    assert!(!h.history.has_sent_for_slot(at(2025, 6, 2, 10, 0, 0)));
    assert!(h.history.has_sent_for_slot(at(2025, 6, 2, 11, 30, 0)));
}

#[tokio::test]
async fn recovery_stops_when_no_snapshot_is_available() {
    let now = at(2025, 6, 2, 11, 46, 30);
    let h = harness(None);

    let report = h.engine.run_recovery(now, Duration::minutes(10)).await;
    assert_eq!(report.recovered, 0);
    assert!(report.outcomes.iter().any(|(_, o)| {
        matches!(
            o,
            TickOutcome::Skipped { reason: SkipReason::NoSnapshot, .. }
        )
    }));
}

#[tokio::test]
async fn recovery_is_idempotent() {
    let now = at(2025, 6, 2, 11, 46, 30);
    let h = harness(Some(snapshot_at(at(2025, 6, 2, 11, 45, 0))));

    let first = h.engine.run_recovery(now, Duration::minutes(10)).await;
    assert_eq!(first.recovered, 1);
    let second = h.engine.run_recovery(now, Duration::minutes(10)).await;
    assert_eq!(second.recovered, 0);
    assert_eq!(h.sink.delivered.lock().unwrap().len(), 1);
}

// ── Status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_window_and_next_slot() {
    let now = at(2025, 6, 2, 11, 47, 12);
    let h = harness(Some(snapshot_at(now)));

    let status = h.engine.status(now).await;
    assert_eq!(status.mission_day, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    assert_eq!(status.current_window, PeakName::MorningLunch);
    assert!(status.is_peak);
    assert!(!status.rest_day);
    assert_eq!(status.next_expected_slot, at(2025, 6, 2, 12, 0, 0));
    // No validations have run yet.
    assert_eq!(status.validation_success_rate, None);
    assert_eq!(status.samples, 0);

    // A dispatch feeds both the validator outcomes and the analytics.
    h.engine.tick(slot_time()).await;
    let after = h.engine.status(now).await;
    assert_eq!(after.validation_success_rate, Some(1.0));
    assert_eq!(after.samples, 1);
}
