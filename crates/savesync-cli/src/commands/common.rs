use std::time::Duration;

use chrono::{DateTime, Utc};
use savesync_core::storage::{DirectoryCloudStore, FileSaveStore, JsonPreferenceStore};
use savesync_core::sync::{diverging_fields, ResolutionSource};
use savesync_core::{SaveMetadata, SyncConfig, SyncOutcome};
use serde::Serialize;

use crate::error::CliError;
use crate::settings::{CliSettings, ResolvedDirs};

/// Everything a command needs to open the stores
#[derive(Debug, Clone)]
pub struct Context {
    pub dirs: ResolvedDirs,
    pub settings: CliSettings,
    pub config: SyncConfig,
}

impl Context {
    pub fn new(settings: CliSettings, dirs: ResolvedDirs) -> Result<Self, CliError> {
        let config = settings.sync_config().map_err(CliError::Config)?;
        Ok(Self {
            dirs,
            settings,
            config,
        })
    }

    pub fn open_local(&self) -> Result<FileSaveStore, CliError> {
        Ok(FileSaveStore::open(
            &self.dirs.save_dir,
            self.config.backup_retention,
        )?)
    }

    pub fn open_cloud(&self) -> Result<DirectoryCloudStore, CliError> {
        let root = self
            .dirs
            .cloud_dir
            .as_ref()
            .ok_or(CliError::CloudNotConfigured)?;
        Ok(DirectoryCloudStore::new(root).with_quota(self.settings.cloud_quota_bytes))
    }

    pub fn open_preferences(&self) -> JsonPreferenceStore {
        JsonPreferenceStore::new(self.dirs.preferences_path())
    }
}

/// One side of `savesync status`
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SideStatus {
    Missing,
    Present { metadata: SaveMetadata },
    Unreadable { reason: String },
}

impl SideStatus {
    pub const fn metadata(&self) -> Option<&SaveMetadata> {
        match self {
            Self::Present { metadata } => Some(metadata),
            Self::Missing | Self::Unreadable { .. } => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub local: SideStatus,
    pub cloud: SideStatus,
    pub in_sync: bool,
    pub diverging_fields: Vec<&'static str>,
}

impl StatusItem {
    pub fn new(local: SideStatus, cloud: SideStatus) -> Self {
        let (in_sync, diverging) = match (local.metadata(), cloud.metadata()) {
            (Some(local), Some(cloud)) => {
                let fields = diverging_fields(local, cloud);
                (fields.is_empty(), fields)
            }
            _ => (false, Vec::new()),
        };
        Self {
            local,
            cloud,
            in_sync,
            diverging_fields: diverging,
        }
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_play_time(play_time: Duration) -> String {
    let total = play_time.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn format_metadata_line(metadata: &SaveMetadata) -> String {
    format!(
        "level {}  saved {}  meta {}  perma {}  played {}",
        metadata.player_level,
        format_timestamp(metadata.last_saved),
        metadata.meta_currency,
        metadata.perma_currency,
        format_play_time(metadata.total_play_time)
    )
}

fn format_side(label: &str, side: &SideStatus) -> String {
    match side {
        SideStatus::Missing => format!("{label:<6} (no save)"),
        SideStatus::Present { metadata } => format!("{label:<6} {}", format_metadata_line(metadata)),
        SideStatus::Unreadable { reason } => format!("{label:<6} unreadable: {reason}"),
    }
}

pub fn format_status_lines(status: &StatusItem) -> Vec<String> {
    let mut lines = vec![
        format_side("local", &status.local),
        format_side("cloud", &status.cloud),
    ];
    if status.in_sync {
        lines.push("Saves are in sync.".to_string());
    } else if !status.diverging_fields.is_empty() {
        lines.push(format!(
            "Saves diverge in: {}",
            status.diverging_fields.join(", ")
        ));
    }
    lines
}

/// Side-by-side view of a conflict, marking the fields that differ.
pub fn format_conflict_lines(local: &SaveMetadata, cloud: &SaveMetadata) -> Vec<String> {
    let differing = diverging_fields(local, cloud);
    let row = |field: &'static str, local: String, cloud: String| {
        let marker = if differing.contains(&field) { '*' } else { ' ' };
        format!("{marker} {field:<16} {local:<24} {cloud}")
    };

    vec![
        format!("  {:<16} {:<24} {}", "", "local", "cloud"),
        row(
            "player_level",
            local.player_level.to_string(),
            cloud.player_level.to_string(),
        ),
        row(
            "last_saved",
            format_timestamp(local.last_saved),
            format_timestamp(cloud.last_saved),
        ),
        row(
            "meta_currency",
            local.meta_currency.to_string(),
            cloud.meta_currency.to_string(),
        ),
        row(
            "perma_currency",
            local.perma_currency.to_string(),
            cloud.perma_currency.to_string(),
        ),
        row(
            "total_play_time",
            format_play_time(local.total_play_time),
            format_play_time(cloud.total_play_time),
        ),
    ]
}

pub fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::InSync => "Already in sync".to_string(),
        SyncOutcome::NoSaves => "No saves yet on either side".to_string(),
        SyncOutcome::Pushed => "Uploaded local save".to_string(),
        SyncOutcome::Pulled => "Downloaded cloud save".to_string(),
        SyncOutcome::Resolved {
            winner,
            source,
            cloud_pending,
        } => {
            let how = match source {
                ResolutionSource::Preference => "remembered strategy",
                ResolutionSource::Prompt => "your choice",
            };
            if *cloud_pending {
                format!("Kept {winner} save ({how}); cloud update pending until the next sync")
            } else {
                format!("Kept {winner} save ({how})")
            }
        }
        SyncOutcome::Deferred { .. } => {
            "Conflict left unresolved; both saves untouched".to_string()
        }
        SyncOutcome::ResolutionTimedOut { .. } => {
            "No choice made in time; both saves untouched".to_string()
        }
        SyncOutcome::LocalOnly { reason } => format!("Playing on the local save ({reason})"),
    }
}
