//! Holiday-aware calendar lookups.
//!
//! This crate answers "is date D a rest day, and why" against a remote
//! special-day registry, with a per-month cache and a weekday-only fallback
//! when the registry is unreachable. The registry is behind a trait so tests
//! inject a fake instead of patching global state.

pub mod provider;
pub mod registry;

pub use provider::HolidayProvider;
pub use registry::{HttpRegistry, RegistryError, SpecialDay, SpecialDayRegistry};
