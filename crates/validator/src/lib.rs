//! Multi-stage data-quality validation for mission snapshots.
//!
//! Three independently callable stages — freshness, field consistency, and
//! cross-field consistency — plus a best-effort auto-repair pass. Errors
//! make a snapshot non-dispatchable; warnings are logged but do not block.

pub mod limits;
pub mod repair;
pub mod report;
pub mod validator;

pub use limits::{CrossCheckLimits, FieldLimits};
pub use repair::repair_snapshot;
pub use report::{ValidationIssue, ValidationReport};
pub use validator::{DataValidator, RepairOutcome};
