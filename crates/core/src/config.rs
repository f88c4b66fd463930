//! Environment-driven configuration.
//!
//! Every knob is an env var with a default; call [`load_dotenv`] first so a
//! local `.env` file is honored. Structural scheduling config (window tables,
//! grids) lives in `mission-schedule` and is validated at construction — this
//! module only carries deployment-level settings.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub registry: RegistryConfig,
    pub history: HistoryConfig,
    pub validator: ValidatorConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            registry: RegistryConfig::from_env(),
            history: HistoryConfig::from_env(),
            validator: ValidatorConfig::from_env(),
        }
    }
}

/// Remote special-day registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the special-day registry API.
    pub base_url: String,
    /// Optional API key, sent as a query parameter when present.
    pub service_key: Option<String>,
    /// Request timeout. The provider falls back to weekday-only on expiry.
    pub timeout_secs: u64,
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("HOLIDAY_REGISTRY_URL", "https://holidays.example.com/api"),
            service_key: env_opt("HOLIDAY_REGISTRY_KEY"),
            timeout_secs: env_u64("HOLIDAY_REGISTRY_TIMEOUT_SECS", 5),
        }
    }
}

/// Send history persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// JSON Lines file holding send records.
    pub path: PathBuf,
    /// Records older than this are pruned (diagnostic log, not an audit trail).
    pub retention_hours: i64,
    /// How far back the recovery sweep looks for missed slots.
    pub recovery_lookback_minutes: i64,
}

impl HistoryConfig {
    pub fn from_env() -> Self {
        Self {
            path: PathBuf::from(env_or("SEND_HISTORY_PATH", "data/send-history.jsonl")),
            retention_hours: env_i64("SEND_HISTORY_RETENTION_HOURS", 72),
            recovery_lookback_minutes: env_i64("RECOVERY_LOOKBACK_MINUTES", 120),
        }
    }
}

/// Data validator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Snapshots older than this are rejected as stale.
    pub freshness_max_minutes: i64,
}

impl ValidatorConfig {
    pub fn from_env() -> Self {
        Self {
            freshness_max_minutes: env_i64("SNAPSHOT_FRESHNESS_MINUTES", 30),
        }
    }
}
