//! Mission snapshot data model.
//!
//! A [`MissionSnapshot`] is one point-in-time read of the mission dashboard,
//! produced by the external collector. This core treats it as an opaque
//! read-only value: validation and analytics derive from it, nothing here
//! mutates it in place.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The four recurring daily time bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakName {
    MorningLunch,
    AfternoonOffPeak,
    Evening,
    LateNightOffPeak,
}

impl PeakName {
    /// All peaks in clock order, starting from the morning band.
    pub const ALL: [PeakName; 4] = [
        PeakName::MorningLunch,
        PeakName::AfternoonOffPeak,
        PeakName::Evening,
        PeakName::LateNightOffPeak,
    ];

    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            PeakName::MorningLunch => "morning/lunch",
            PeakName::AfternoonOffPeak => "afternoon off-peak",
            PeakName::Evening => "evening",
            PeakName::LateNightOffPeak => "late-night off-peak",
        }
    }
}

impl std::fmt::Display for PeakName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress of one peak band: missions completed so far vs the quota.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakProgress {
    pub current: u32,
    pub target: u32,
}

impl PeakProgress {
    /// Achievement ratio in [0, inf); 1.0 when the target is zero.
    pub fn ratio(&self) -> f64 {
        if self.target == 0 {
            1.0
        } else {
            f64::from(self.current) / f64::from(self.target)
        }
    }
}

/// Per-rider statistics for one mission day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderStat {
    pub name: String,
    pub completed: u32,
    /// Completions split by peak, in [`PeakName::ALL`] order.
    pub per_peak_counts: [u32; 4],
    pub acceptance_rate_pct: f64,
    pub rejected: u32,
    pub cancelled: u32,
    pub contribution_pct: f64,
}

/// One point-in-time read of mission and rider data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub total_score: f64,
    pub quantity_score: f64,
    pub acceptance_score: f64,
    pub total_completed: u32,
    pub total_rejected: u32,
    pub acceptance_rate_pct: f64,
    /// Ordered map so the content hash is deterministic.
    pub peaks: BTreeMap<PeakName, PeakProgress>,
    pub riders: Vec<RiderStat>,
    /// Wall-clock time the dashboard was read (local time).
    pub timestamp: NaiveDateTime,
    /// Mission day the snapshot claims to describe.
    pub mission_date: NaiveDate,
}

impl MissionSnapshot {
    /// Hex SHA-256 of the canonical JSON encoding.
    ///
    /// Used by the send history to detect whether two dispatch attempts
    /// carried the same payload.
    pub fn data_hash(&self) -> String {
        // BTreeMap keys and struct field order make the encoding canonical.
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        let mut out = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Sum of `current` across all peak bands.
    pub fn peaks_completed_sum(&self) -> u32 {
        self.peaks.values().map(|p| p.current).sum()
    }

    /// Sum of `completed` across all riders.
    pub fn riders_completed_sum(&self) -> u32 {
        self.riders.iter().map(|r| r.completed).sum()
    }

    /// Overall completion rate against the summed peak targets, in percent.
    /// 0 when no targets are set.
    pub fn completion_rate_pct(&self) -> f64 {
        let target_sum: u32 = self.peaks.values().map(|p| p.target).sum();
        if target_sum == 0 {
            0.0
        } else {
            f64::from(self.peaks_completed_sum()) / f64::from(target_sum) * 100.0
        }
    }

    /// Mean rider acceptance rate in percent; 0 with no riders.
    pub fn avg_rider_acceptance_pct(&self) -> f64 {
        if self.riders.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.riders.iter().map(|r| r.acceptance_rate_pct).sum();
        sum / self.riders.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> MissionSnapshot {
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
            timestamp: NaiveDate::from_ymd_opt(2025, 6, 2)
                .unwrap()
                .and_hms_opt(11, 45, 0)
                .unwrap(),
            mission_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        }
    }

    #[test]
    fn data_hash_is_stable_and_content_sensitive() {
        let snap = sample();
        let h1 = snap.data_hash();
        let h2 = snap.clone().data_hash();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        let mut other = snap;
        other.total_completed += 1;
        assert_ne!(h1, other.data_hash());
    }

    #[test]
    fn sums_and_rates() {
        let snap = sample();
        assert_eq!(snap.peaks_completed_sum(), 15);
        assert_eq!(snap.riders_completed_sum(), 15);
        assert!((snap.completion_rate_pct() - 30.0).abs() < 1e-9);
        assert!((snap.avg_rider_acceptance_pct() - 93.5).abs() < 1e-9);
    }

    #[test]
    fn peak_ratio_handles_zero_target() {
        let p = PeakProgress { current: 3, target: 0 };
        assert_eq!(p.ratio(), 1.0);
    }
}
