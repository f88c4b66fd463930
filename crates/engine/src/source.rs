//! File-backed snapshot source.
//!
//! The collector drops its latest scrape as a JSON file; the worker reads
//! it each tick. Doubles as the test fixture format.

use std::path::PathBuf;

use async_trait::async_trait;
use mission_core::MissionSnapshot;
use tracing::debug;

use crate::traits::{SnapshotSource, SourceError};

pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn latest(&self) -> Result<Option<MissionSnapshot>, SourceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot file yet");
                return Ok(None);
            }
            Err(e) => return Err(SourceError::Unavailable(e.to_string())),
        };
        let snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Unavailable(format!("bad snapshot file: {e}")))?;
        Ok(Some(snapshot))
    }
}
