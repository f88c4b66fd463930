//! Best-effort snapshot repair.
//!
//! Clamps or re-derives numeric fields the consistency stages flagged.
//! Freshness findings, peak/rider sum mismatches, and over-target currents
//! are structural and stay unrepairable — those snapshots are discarded.

use mission_core::{MissionSnapshot, PeakName};

use crate::limits::FieldLimits;
use crate::report::ValidationReport;

/// Produce a repaired copy, or `None` when no flagged finding is repairable.
/// The caller re-validates the copy exactly once.
pub fn repair_snapshot(
    snapshot: &MissionSnapshot,
    report: &ValidationReport,
    limits: &FieldLimits,
) -> Option<MissionSnapshot> {
    let mut copy = snapshot.clone();
    let mut changed = false;

    for issue in &report.errors {
        let path = issue.path.as_str();
        match path {
            "total_score" => changed |= clamp_pct(&mut copy.total_score, limits.pct_max),
            "quantity_score" => changed |= clamp_pct(&mut copy.quantity_score, limits.pct_max),
            "acceptance_score" => changed |= clamp_pct(&mut copy.acceptance_score, limits.pct_max),
            "acceptance_rate_pct" => {
                changed |= clamp_pct(&mut copy.acceptance_rate_pct, limits.pct_max)
            }
            _ => {
                if let Some(i) = rider_index(path) {
                    if i >= copy.riders.len() {
                        continue;
                    }
                    if path.ends_with(".acceptance_rate_pct") {
                        changed |=
                            clamp_pct(&mut copy.riders[i].acceptance_rate_pct, limits.pct_max);
                    } else if path.ends_with(".contribution_pct") {
                        changed |= rederive_contribution(&mut copy, i);
                    }
                } else if let Some(peak) = peak_name(path) {
                    // Range overflows are clamped; over-target faults are not
                    // (those carry an "x the target" message and stay fatal).
                    if issue.message.contains("x the target") {
                        continue;
                    }
                    if let Some(progress) = copy.peaks.get_mut(&peak) {
                        if path.ends_with(".current") && progress.current > limits.peak_current_max
                        {
                            progress.current = limits.peak_current_max;
                            changed = true;
                        } else if path.ends_with(".target")
                            && progress.target > limits.peak_target_max
                        {
                            progress.target = limits.peak_target_max;
                            changed = true;
                        }
                    }
                }
            }
        }
    }

    changed.then_some(copy)
}

fn clamp_pct(value: &mut f64, max: f64) -> bool {
    let clamped = value.clamp(0.0, max);
    if (clamped - *value).abs() > f64::EPSILON {
        *value = clamped;
        true
    } else {
        false
    }
}

/// Re-derive one rider's contribution from completed counts when possible,
/// otherwise clamp it into range.
fn rederive_contribution(snapshot: &mut MissionSnapshot, i: usize) -> bool {
    let total = snapshot.riders_completed_sum();
    let rider = &mut snapshot.riders[i];
    let derived = if total > 0 {
        f64::from(rider.completed) / f64::from(total) * 100.0
    } else {
        rider.contribution_pct.clamp(0.0, 100.0)
    };
    if (derived - rider.contribution_pct).abs() > f64::EPSILON {
        rider.contribution_pct = derived;
        true
    } else {
        false
    }
}

/// Extract `i` from `riders[i].field`.
fn rider_index(path: &str) -> Option<usize> {
    let rest = path.strip_prefix("riders[")?;
    let end = rest.find(']')?;
    rest[..end].parse().ok()
}

/// Extract the peak from `peaks.{label}.current` / `.target`.
fn peak_name(path: &str) -> Option<PeakName> {
    let rest = path.strip_prefix("peaks.")?;
    PeakName::ALL
        .into_iter()
        .find(|name| rest.starts_with(name.label()))
}
