use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Transient registry error: {0}")]
    TransientIo(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Slot {0} already has a sent record")]
    DuplicateSlot(NaiveDateTime),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        DispatchError::Serialize(e.to_string())
    }
}
