use savesync_core::storage::{BackupManager, LocalSaveStore};
use savesync_core::SaveBlob;
use serde::Serialize;

use crate::cli::BackupCommands;
use crate::commands::common::{format_metadata_line, Context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct BackupItem {
    pub sequence: u64,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<savesync_core::SaveMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn run_backups(context: &Context, command: BackupCommands) -> Result<(), CliError> {
    match command {
        BackupCommands::List { json } => run_backups_list(context, json),
        BackupCommands::Recover => run_backups_recover(context),
    }
}

pub fn list_backups(backups: &BackupManager) -> Result<Vec<BackupItem>, CliError> {
    let items = backups
        .entries()?
        .into_iter()
        .map(|entry| {
            let (metadata, error) = match backups.load(&entry) {
                Ok(blob) => (Some(blob.metadata().clone()), None),
                Err(error) => (None, Some(error.to_string())),
            };
            BackupItem {
                sequence: entry.sequence,
                path: entry.path.display().to_string(),
                metadata,
                error,
            }
        })
        .collect();
    Ok(items)
}

fn run_backups_list(context: &Context, as_json: bool) -> Result<(), CliError> {
    let store = context.open_local()?;
    let items = list_backups(store.backups())?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No backups retained.");
        return Ok(());
    }

    for item in &items {
        match (&item.metadata, &item.error) {
            (Some(metadata), _) => {
                println!("#{:<4} {}", item.sequence, format_metadata_line(metadata));
            }
            (None, Some(error)) => println!("#{:<4} unreadable: {error}", item.sequence),
            (None, None) => println!("#{:<4}", item.sequence),
        }
    }
    Ok(())
}

fn run_backups_recover(context: &Context) -> Result<(), CliError> {
    let recovered = recover_local(context)?;
    println!("Restored: {}", format_metadata_line(recovered.metadata()));
    Ok(())
}

/// Replace a missing or corrupt local save with the newest valid backup.
pub fn recover_local(context: &Context) -> Result<SaveBlob, CliError> {
    let store = context.open_local()?;
    match store.read_local() {
        Ok(Some(_)) => return Err(CliError::NothingToRecover),
        Ok(None) => tracing::info!("No local save; restoring the newest backup"),
        Err(error) if error.is_corruption() => {
            tracing::warn!("Local save is unreadable: {}", error);
        }
        Err(error) => return Err(error.into()),
    }

    store.recover_last_good()?.ok_or(CliError::NoValidBackup)
}
