//! [`AnomalyAnalytics`] — rolling history, anomaly scoring, prediction.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use mission_core::MissionSnapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::PerformanceMetric;
use crate::recommend::{recommendation, risk_factors, RecommendationInput};
use crate::stats::{least_squares_slope, z_score};

/// Rolling history capacity (ring-buffer semantics, oldest evicted first).
pub const HISTORY_CAP: usize = 100;
/// Trailing window for the anomaly z-scores.
const ANOMALY_WINDOW: usize = 10;
/// Below this many samples the anomaly score is defined as 0.
const MIN_SAMPLES_FOR_ANOMALY: usize = 5;
/// Below this many samples prediction reports `InsufficientData`.
const MIN_SAMPLES_FOR_PREDICTION: usize = 3;
/// Trailing window for the least-squares slope.
const SLOPE_WINDOW: usize = 5;
/// Slope (per sample) thresholds classifying the trend.
const TREND_SLOPE_THRESHOLD: f64 = 5.0;
/// Confidence grows with history length but never past this.
const CONFIDENCE_CAP: f64 = 0.95;
const CONFIDENCE_BASE: f64 = 0.3;
const CONFIDENCE_PER_SAMPLE: f64 = 0.05;

/// Direction of the short-horizon completion trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

/// Short-horizon prediction with operator-facing text. Recomputed on
/// demand; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_completion: f64,
    /// In [0, 1].
    pub confidence: f64,
    pub trend: Trend,
    pub recommendation: String,
    pub risk_factors: Vec<String>,
}

/// Rolling-window statistical model over incoming snapshots.
pub struct AnomalyAnalytics {
    history: VecDeque<PerformanceMetric>,
}

impl AnomalyAnalytics {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAP),
        }
    }

    /// Derive a metric from the snapshot, score it against recent history,
    /// and append it (evicting the oldest past the cap).
    pub fn add_sample(&mut self, snapshot: &MissionSnapshot) {
        let mut metric = PerformanceMetric::from_snapshot(snapshot);
        metric.anomaly_score = self.score(&metric);
        debug!(
            total = metric.total_completed,
            score = metric.anomaly_score,
            "analytics sample added"
        );
        self.history.push_back(metric);
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
    }

    /// Larger of the z-scores of `total_completed` and `completion_rate_pct`
    /// against the trailing window; 0 with insufficient history.
    fn score(&self, metric: &PerformanceMetric) -> f64 {
        // The incoming sample counts toward the minimum.
        if self.history.len() + 1 < MIN_SAMPLES_FOR_ANOMALY {
            return 0.0;
        }
        let window: Vec<&PerformanceMetric> = self
            .history
            .iter()
            .rev()
            .take(ANOMALY_WINDOW)
            .collect();

        let completed: Vec<f64> = window.iter().map(|m| f64::from(m.total_completed)).collect();
        let rates: Vec<f64> = window.iter().map(|m| m.completion_rate_pct).collect();

        let completed_z = z_score(f64::from(metric.total_completed), &completed);
        let rate_z = z_score(metric.completion_rate_pct, &rates);
        completed_z.max(rate_z)
    }

    /// Project `total_completed` to `target_time` from the trailing slope.
    pub fn predict(&self, target_time: NaiveDateTime) -> PredictionResult {
        if self.history.len() < MIN_SAMPLES_FOR_PREDICTION {
            let input = RecommendationInput {
                trend: Trend::InsufficientData,
                completion_rate_pct: 0.0,
                avg_rider_acceptance_pct: 100.0,
                anomaly_score: 0.0,
                underperforming_peaks: vec![],
            };
            return PredictionResult {
                predicted_completion: 0.0,
                confidence: 0.0,
                trend: Trend::InsufficientData,
                recommendation: recommendation(&input),
                risk_factors: vec![],
            };
        }

        let window: Vec<&PerformanceMetric> = {
            let start = self.history.len().saturating_sub(SLOPE_WINDOW);
            self.history.iter().skip(start).collect()
        };
        let values: Vec<f64> = window.iter().map(|m| f64::from(m.total_completed)).collect();
        let slope = least_squares_slope(&values);

        let trend = if slope > TREND_SLOPE_THRESHOLD {
            Trend::Increasing
        } else if slope < -TREND_SLOPE_THRESHOLD {
            Trend::Decreasing
        } else {
            Trend::Stable
        };

        let latest = window[window.len() - 1];
        let predicted = project(&window, slope, target_time).max(0.0);

        let confidence = (CONFIDENCE_BASE + CONFIDENCE_PER_SAMPLE * self.history.len() as f64)
            .min(CONFIDENCE_CAP);

        let input = RecommendationInput {
            trend,
            completion_rate_pct: latest.completion_rate_pct,
            avg_rider_acceptance_pct: latest.avg_rider_acceptance_pct,
            anomaly_score: latest.anomaly_score,
            underperforming_peaks: latest.underperforming_peaks(),
        };

        PredictionResult {
            predicted_completion: predicted,
            confidence,
            trend,
            recommendation: recommendation(&input),
            risk_factors: risk_factors(&input),
        }
    }

    /// Latest anomaly score (0 with no history).
    pub fn latest_anomaly_score(&self) -> f64 {
        self.history.back().map_or(0.0, |m| m.anomaly_score)
    }

    pub fn history(&self) -> impl Iterator<Item = &PerformanceMetric> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for AnomalyAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

/// Extend the fitted line from sample indices to wall-clock time using the
/// window's average sampling interval. Falls back to the last value when
/// the timestamps carry no spread.
fn project(window: &[&PerformanceMetric], slope: f64, target_time: NaiveDateTime) -> f64 {
    let first = window[0];
    let last = window[window.len() - 1];
    let last_value = f64::from(last.total_completed);
    if window.len() < 2 {
        return last_value;
    }

    let span_minutes = (last.timestamp - first.timestamp).num_minutes() as f64;
    if span_minutes <= 0.0 {
        return last_value;
    }
    let avg_interval = span_minutes / (window.len() - 1) as f64;
    let steps_ahead = (target_time - last.timestamp).num_minutes() as f64 / avg_interval;
    last_value + slope * steps_ahead
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use mission_core::{PeakName, PeakProgress};
    use std::collections::BTreeMap;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn snapshot(minutes: i64, completed: u32) -> MissionSnapshot {
        let mut peaks = BTreeMap::new();
        peaks.insert(
            PeakName::MorningLunch,
            PeakProgress { current: completed, target: 100 },
        );
        MissionSnapshot {
            total_score: 80.0,
            quantity_score: 80.0,
            acceptance_score: 80.0,
            total_completed: completed,
            total_rejected: 0,
            acceptance_rate_pct: 95.0,
            peaks,
            riders: vec![],
            timestamp: base_time() + Duration::minutes(minutes),
            mission_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        }
    }

    #[test]
    fn few_samples_score_zero() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..4 {
            analytics.add_sample(&snapshot(i * 15, 10 + i as u32 * 30));
        }
        assert!(analytics.history().all(|m| m.anomaly_score == 0.0));
    }

    #[test]
    fn outlier_scores_high_with_enough_history() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..8 {
            // Mild noise around 20.
            analytics.add_sample(&snapshot(i * 15, 20 + (i as u32 % 3)));
        }
        analytics.add_sample(&snapshot(8 * 15, 200));
        assert!(analytics.latest_anomaly_score() > 2.0);
    }

    #[test]
    fn constant_series_is_never_anomalous() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..10 {
            analytics.add_sample(&snapshot(i * 15, 25));
        }
        assert_eq!(analytics.latest_anomaly_score(), 0.0);
    }

    #[test]
    fn history_is_capped_fifo() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..(HISTORY_CAP as i64 + 20) {
            analytics.add_sample(&snapshot(i, 20));
        }
        assert_eq!(analytics.len(), HISTORY_CAP);
        let oldest = analytics.history().next().unwrap();
        assert_eq!(oldest.timestamp, base_time() + Duration::minutes(20));
    }

    #[test]
    fn prediction_needs_three_samples() {
        let mut analytics = AnomalyAnalytics::new();
        analytics.add_sample(&snapshot(0, 10));
        analytics.add_sample(&snapshot(15, 20));

        let result = analytics.predict(base_time() + Duration::minutes(60));
        assert_eq!(result.trend, Trend::InsufficientData);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn increasing_sequence_predicts_above_last_sample() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..5 {
            analytics.add_sample(&snapshot(i * 15, (10 + i * 10) as u32));
        }

        let result = analytics.predict(base_time() + Duration::minutes(5 * 15));
        assert_eq!(result.trend, Trend::Increasing);
        assert!(result.predicted_completion > 50.0);
        assert!(result.confidence > 0.0 && result.confidence <= CONFIDENCE_CAP);
    }

    #[test]
    fn decreasing_sequence_clamps_at_zero() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..5 {
            analytics.add_sample(&snapshot(i * 15, (40 - i * 10) as u32));
        }

        // Far enough out that the raw projection would go negative.
        let result = analytics.predict(base_time() + Duration::minutes(600));
        assert_eq!(result.trend, Trend::Decreasing);
        assert_eq!(result.predicted_completion, 0.0);
    }

    #[test]
    fn small_slope_is_stable() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..5 {
            analytics.add_sample(&snapshot(i * 15, 20 + (i % 2) as u32));
        }
        let result = analytics.predict(base_time() + Duration::minutes(120));
        assert_eq!(result.trend, Trend::Stable);
    }

    #[test]
    fn confidence_grows_with_history() {
        let mut analytics = AnomalyAnalytics::new();
        for i in 0..3 {
            analytics.add_sample(&snapshot(i * 15, 20));
        }
        let early = analytics.predict(base_time() + Duration::minutes(60)).confidence;
        for i in 3..40 {
            analytics.add_sample(&snapshot(i * 15, 20));
        }
        let late = analytics.predict(base_time() + Duration::minutes(700)).confidence;
        assert!(late > early);
        assert!(late <= CONFIDENCE_CAP);
    }
}
