//! Durable send-history log.
//!
//! One record per dispatch attempt, indexed by target minute. The store,
//! not its callers, enforces the at-most-one-successful-send-per-slot
//! guarantee, so a live tick and a recovery sweep may race and both observe
//! the same outcome.

pub mod error;
pub mod store;

pub use error::HistoryError;
pub use store::{SendHistoryStore, SendOutcome, SendRecord};
