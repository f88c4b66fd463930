//! Lightweight anomaly and trend analytics over mission snapshots.
//!
//! The numeric model (rolling metrics, z-scores, least-squares slope) is
//! pure and lives apart from the recommendation-text rule table, so the
//! wording can be swapped without touching the statistics.

pub mod analytics;
pub mod metrics;
pub mod recommend;
pub mod stats;

pub use analytics::{AnomalyAnalytics, PredictionResult, Trend};
pub use metrics::PerformanceMetric;
