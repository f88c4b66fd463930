//! Deterministic recommendation and risk-factor text.
//!
//! A fixed rule table keyed on the numeric model's outputs. Kept separate
//! from the model so the wording can be localized or re-ordered without
//! touching the statistics.

use mission_core::PeakName;

use crate::analytics::Trend;

/// Anomaly score past this calls for investigation before acting on trends.
pub const ANOMALY_ALERT_SCORE: f64 = 2.5;
/// Completion rate below this counts as falling behind.
pub const LOW_COMPLETION_PCT: f64 = 50.0;
/// Average rider acceptance below this is a staffing risk.
pub const LOW_ACCEPTANCE_PCT: f64 = 80.0;

/// Inputs the rule table keys on.
#[derive(Debug, Clone)]
pub struct RecommendationInput {
    pub trend: Trend,
    pub completion_rate_pct: f64,
    pub avg_rider_acceptance_pct: f64,
    pub anomaly_score: f64,
    pub underperforming_peaks: Vec<PeakName>,
}

/// First matching rule wins.
pub fn recommendation(input: &RecommendationInput) -> String {
    if input.trend == Trend::InsufficientData {
        return "Not enough history yet; keep collecting snapshots before acting.".to_string();
    }
    if input.anomaly_score > ANOMALY_ALERT_SCORE {
        return format!(
            "Latest snapshot deviates sharply from recent history (score {:.1}); \
             verify the dashboard data before reacting.",
            input.anomaly_score
        );
    }
    if input.trend == Trend::Decreasing && input.completion_rate_pct < LOW_COMPLETION_PCT {
        return "Completion is low and falling; consider an encouragement notice to riders."
            .to_string();
    }
    if input.avg_rider_acceptance_pct < LOW_ACCEPTANCE_PCT {
        return "Rider acceptance is low; review mission difficulty or incentives.".to_string();
    }
    if let Some(&peak) = input.underperforming_peaks.first() {
        return format!(
            "The {peak} band is under half its target; shift attention to that window."
        );
    }
    if input.trend == Trend::Increasing {
        return "Completion is trending up; current cadence is working.".to_string();
    }
    "On track; keep the regular dispatch cadence.".to_string()
}

/// Every matching risk is listed, in a fixed order.
pub fn risk_factors(input: &RecommendationInput) -> Vec<String> {
    let mut risks = Vec::new();
    if input.anomaly_score > ANOMALY_ALERT_SCORE {
        risks.push(format!(
            "anomaly score {:.1} above alert threshold {ANOMALY_ALERT_SCORE}",
            input.anomaly_score
        ));
    }
    if input.trend == Trend::Decreasing {
        risks.push("completion trending down".to_string());
    }
    if input.completion_rate_pct < LOW_COMPLETION_PCT {
        risks.push(format!(
            "completion rate {:.0}% below {LOW_COMPLETION_PCT:.0}%",
            input.completion_rate_pct
        ));
    }
    if input.avg_rider_acceptance_pct < LOW_ACCEPTANCE_PCT {
        risks.push(format!(
            "average rider acceptance {:.0}% below {LOW_ACCEPTANCE_PCT:.0}%",
            input.avg_rider_acceptance_pct
        ));
    }
    for peak in &input.underperforming_peaks {
        risks.push(format!("{peak} band under half its target"));
    }
    risks
}
