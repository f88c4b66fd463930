//! Time-window scheduling: peak windows, mission-day boundary, dispatch grid.
//!
//! Everything in this crate is a pure function of wall-clock time and a
//! resolved [`RestDayInfo`](mission_core::RestDayInfo) — no I/O, no clock
//! reads. The worker binary supplies `now`; tests supply fixed instants.

pub mod mission_day;
pub mod scheduler;
pub mod windows;

pub use mission_day::{mission_day, MISSION_DAY_CUTOFF_HOUR};
pub use scheduler::{SlotEvaluation, SlotKind, TimeWindowScheduler};
pub use windows::{DispatchGrid, PeakWindow, WindowTable};
