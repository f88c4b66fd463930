//! Operator-facing status snapshot of the engine.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use mission_analytics::PredictionResult;
use mission_core::{PeakName, RestDayInfo};
use serde::Serialize;

use crate::engine::DispatchDecisionEngine;

/// Point-in-time view of what the engine is doing and why. Built on demand
/// for logs and the status endpoint of whatever hosts the worker.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: NaiveDateTime,
    pub mission_day: NaiveDate,
    pub current_window: PeakName,
    pub is_peak: bool,
    pub rest_day: bool,
    pub rest_day_label: String,
    pub next_expected_slot: NaiveDateTime,
    /// Fraction of recent validations that passed, `None` before any ran.
    pub validation_success_rate: Option<f64>,
    pub prediction: PredictionResult,
    pub samples: usize,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "mission day {} | window {} ({})",
            self.mission_day,
            self.current_window,
            if self.is_peak { "peak" } else { "off-peak" }
        )?;
        writeln!(f, "day type: {}", self.rest_day_label)?;
        writeln!(f, "next slot: {}", self.next_expected_slot)?;
        match self.validation_success_rate {
            Some(rate) => writeln!(f, "validation success: {:.1}%", rate * 100.0)?,
            None => writeln!(f, "validation success: n/a")?,
        }
        write!(
            f,
            "trend {:?}, predicted {:.0} completions (confidence {:.2}, {} samples)",
            self.prediction.trend,
            self.prediction.predicted_completion,
            self.prediction.confidence,
            self.samples
        )
    }
}

impl DispatchDecisionEngine {
    /// Assemble a [`StatusReport`] for `now`. Read-only: no dispatch, no
    /// history writes, no analytics samples.
    pub async fn status(&self, now: NaiveDateTime) -> StatusReport {
        // Resolve today and tomorrow up front; the next slot is always
        // within that range because every hour carries at least one
        // expected minute.
        let mut resolved: HashMap<NaiveDate, RestDayInfo> = HashMap::new();
        for offset in 0..2 {
            let date = now.date() + Duration::days(offset);
            resolved.insert(date, self.provider.rest_day_info(date).await);
        }
        let resolve = |date: NaiveDate| {
            resolved
                .get(&date)
                .cloned()
                .unwrap_or_else(|| RestDayInfo::weekday_only(date))
        };

        let rest = resolve(now.date());
        let eval = self.scheduler.evaluate(now, &rest);
        let next_expected_slot = self.scheduler.next_expected_slot(now, &resolve);

        let (prediction, samples) = {
            let analytics = self.analytics.lock().expect("analytics lock poisoned");
            (analytics.predict(now + Duration::hours(1)), analytics.len())
        };

        StatusReport {
            generated_at: now,
            mission_day: eval.mission_day,
            current_window: eval.window.name,
            is_peak: eval.is_peak,
            rest_day: rest.is_rest_day,
            rest_day_label: rest.label,
            next_expected_slot,
            validation_success_rate: self.validator.success_rate(),
            prediction,
            samples,
        }
    }
}
