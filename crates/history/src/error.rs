use std::path::PathBuf;

use chrono::NaiveDateTime;
use mission_core::DispatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    /// A `Sent` record already exists for this slot. Expected under
    /// concurrent recovery; callers skip, they do not retry.
    #[error("slot {0} already has a sent record")]
    DuplicateSlot(NaiveDateTime),

    /// Another process holds the history file. Two workers sharing one
    /// history path is a deployment fault; the second fails fast.
    #[error("history file {0} is locked by another process")]
    Locked(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt history line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

impl From<HistoryError> for DispatchError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::DuplicateSlot(minute) => DispatchError::DuplicateSlot(minute),
            HistoryError::Locked(path) => DispatchError::Configuration(format!(
                "history file {} is locked by another process",
                path.display()
            )),
            HistoryError::Io(io) => DispatchError::Io(io),
            HistoryError::Corrupt { line, reason } => {
                DispatchError::Serialize(format!("history line {line}: {reason}"))
            }
        }
    }
}
