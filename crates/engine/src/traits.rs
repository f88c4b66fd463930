//! Trait seams to the out-of-scope collector and channel adapters.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use mission_core::MissionSnapshot;
use mission_schedule::SlotKind;

/// Errors reported by a channel adapter.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Errors from the snapshot collector.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),
}

/// A validated snapshot plus dispatch metadata, handed to a channel adapter.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchRequest {
    pub snapshot: MissionSnapshot,
    pub target_minute: NaiveDateTime,
    pub slot_kind: SlotKind,
    pub message_id: String,
    pub data_hash: String,
}

/// Outbound delivery channel (Kakao, Telegram, webhook, ... — implemented
/// elsewhere). Delivery confirmation gates the send-history record.
#[async_trait]
pub trait DispatchSink: Send + Sync {
    async fn deliver(&self, request: &DispatchRequest) -> Result<(), SinkError>;

    /// Human-readable name for logs (e.g. "webhook").
    fn channel_name(&self) -> &str;
}

/// Supplier of the latest mission snapshot, one per tick.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// `Ok(None)` means no data is available yet this cycle — a skip, not
    /// an error.
    async fn latest(&self) -> Result<Option<MissionSnapshot>, SourceError>;
}
