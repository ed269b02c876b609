use std::path::Path;
use std::time::Duration;

use savesync_core::storage::LocalSaveStore;
use savesync_core::{SaveBlob, SaveMetadata};

use crate::commands::common::{format_metadata_line, Context};
use crate::error::CliError;

/// Progress recorded alongside a new local save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveProgress {
    pub level: u32,
    pub meta_currency: u64,
    pub perma_currency: u64,
    pub play_time_secs: u64,
}

pub fn run_save(context: &Context, payload_path: &Path, progress: SaveProgress) -> Result<(), CliError> {
    let blob = write_save(context, payload_path, progress)?;
    println!("Saved: {}", format_metadata_line(blob.metadata()));
    Ok(())
}

pub fn write_save(
    context: &Context,
    payload_path: &Path,
    progress: SaveProgress,
) -> Result<SaveBlob, CliError> {
    let payload = std::fs::read(payload_path)?;
    if payload.is_empty() {
        return Err(CliError::EmptyPayload(payload_path.display().to_string()));
    }

    let metadata = SaveMetadata::now(
        progress.level,
        progress.meta_currency,
        progress.perma_currency,
        Duration::from_secs(progress.play_time_secs),
    );
    let blob = SaveBlob::new(payload, metadata);
    context.open_local()?.write_local(&blob)?;
    tracing::info!("Wrote local save at level {}", progress.level);
    Ok(blob)
}
