//! Dispatch decision engine.
//!
//! Orchestrates the calendar, scheduler, send history, validator, and
//! analytics into a single per-tick decision: dispatch now, skip with a
//! reason, or recover a missed slot. Channel adapters sit behind the
//! [`DispatchSink`] trait and are out of scope here.

pub mod engine;
pub mod recovery;
pub mod source;
pub mod status;
pub mod traits;

pub use engine::{DispatchDecisionEngine, SkipReason, TickOutcome};
pub use recovery::RecoveryReport;
pub use source::FileSnapshotSource;
pub use status::StatusReport;
pub use traits::{DispatchRequest, DispatchSink, SinkError, SnapshotSource, SourceError};
