use std::io;

use savesync_core::storage::CloudError;
use savesync_core::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] savesync_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Cloud(#[from] CloudError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Save payload is empty: {0}")]
    EmptyPayload(String),
    #[error("Local save is readable; recovery only replaces an unreadable save")]
    NothingToRecover,
    #[error("No valid backup is available to recover from")]
    NoValidBackup,
    #[error(
        "Cloud directory is not configured. Pass --cloud-dir, set SAVESYNC_CLOUD_DIR, or run `savesync config init --cloud-dir <PATH>`."
    )]
    CloudNotConfigured,
}
