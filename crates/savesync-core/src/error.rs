//! Error types for savesync-core

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ConflictResolution;

/// Result type alias using savesync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the local save store, backup manager and preference store
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A save record exists but cannot be trusted
    #[error("Corrupt save at {}: {reason}", path.display())]
    CorruptSave {
        /// File the record was read from
        path: PathBuf,
        /// What failed while reading it
        reason: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A resolution that cannot be used where it was supplied
    #[error("Invalid conflict choice: {0}")]
    InvalidChoice(ConflictResolution),
}

impl Error {
    /// Whether the error means "the data is there but unreadable" rather than an I/O failure.
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptSave { .. })
    }
}
