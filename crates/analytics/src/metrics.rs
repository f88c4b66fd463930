//! Per-sample performance metrics derived from a snapshot.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use mission_core::{MissionSnapshot, PeakName};
use serde::{Deserialize, Serialize};

/// A peak achieving less than this ratio of its target counts as
/// underperforming in risk reporting.
pub const UNDERPERFORMANCE_RATIO: f64 = 0.5;

/// One point in the rolling performance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub timestamp: NaiveDateTime,
    pub total_completed: u32,
    pub completion_rate_pct: f64,
    pub avg_rider_acceptance_pct: f64,
    /// Achievement ratio (current/target) per peak band.
    pub per_peak_ratio: BTreeMap<PeakName, f64>,
    /// Filled in by the analytics engine when the sample is added.
    pub anomaly_score: f64,
}

impl PerformanceMetric {
    /// Derive the metric for a snapshot; `anomaly_score` starts at 0.
    pub fn from_snapshot(snapshot: &MissionSnapshot) -> Self {
        let per_peak_ratio = snapshot
            .peaks
            .iter()
            .map(|(&name, progress)| (name, progress.ratio()))
            .collect();
        Self {
            timestamp: snapshot.timestamp,
            total_completed: snapshot.total_completed,
            completion_rate_pct: snapshot.completion_rate_pct(),
            avg_rider_acceptance_pct: snapshot.avg_rider_acceptance_pct(),
            per_peak_ratio,
            anomaly_score: 0.0,
        }
    }

    /// Peaks below the underperformance ratio, in clock order.
    pub fn underperforming_peaks(&self) -> Vec<PeakName> {
        self.per_peak_ratio
            .iter()
            .filter(|(_, &ratio)| ratio < UNDERPERFORMANCE_RATIO)
            .map(|(&name, _)| name)
            .collect()
    }
}
