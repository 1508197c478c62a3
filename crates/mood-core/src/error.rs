//! Failure kinds reported by the sync layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No matching document
    #[error("Not found: {0}")]
    NotFound(String),

    /// A document exists but its fields are missing or mistyped
    #[error("Data error: {0}")]
    Data(String),

    /// A remote read failed or timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// The picked media could not be turned into a local file
    #[error("Staging error: {0}")]
    Staging(String),

    /// Object storage rejected the upload or the download URL lookup
    #[error("Upload error: {0}")]
    Upload(String),

    /// A remote write failed or timed out
    #[error("Write error: {0}")]
    Write(String),

    /// Rejected before any remote call was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    pub(crate) fn transport(e: anyhow::Error) -> Self {
        Self::Transport(format!("{:#}", e))
    }

    pub(crate) fn write(e: anyhow::Error) -> Self {
        Self::Write(format!("{:#}", e))
    }

    pub(crate) fn upload(e: anyhow::Error) -> Self {
        Self::Upload(format!("{:#}", e))
    }

    pub(crate) fn staging(e: anyhow::Error) -> Self {
        Self::Staging(format!("{:#}", e))
    }
}
