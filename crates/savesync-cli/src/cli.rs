use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use savesync_core::models::SyncPreference;
use savesync_core::ConflictResolution;

#[derive(Parser)]
#[command(name = "savesync")]
#[command(about = "Keep a local game save and its cloud copy in step")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local save and its backups
    #[arg(long, global = true, value_name = "PATH")]
    pub save_dir: Option<PathBuf>,

    /// Directory acting as the cloud replica
    #[arg(long, global = true, value_name = "PATH")]
    pub cloud_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the local save with the cloud copy
    Sync {
        /// Resolve a conflict without prompting
        #[arg(long, value_enum, value_name = "RESOLUTION")]
        choose: Option<ResolutionArg>,
        /// Remember the chosen resolution for future conflicts
        #[arg(long)]
        remember: bool,
        /// Seconds to wait on each cloud call
        #[arg(long, value_name = "SECONDS")]
        cloud_timeout: Option<u64>,
        /// Seconds to wait for a conflict choice
        #[arg(long, value_name = "SECONDS")]
        resolution_timeout: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare both saves without changing either
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a new local save
    Save {
        /// File holding the opaque save payload
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,
        /// Player level
        #[arg(long)]
        level: u32,
        /// Run-scoped currency
        #[arg(long, default_value = "0")]
        meta_currency: u64,
        /// Persistent currency
        #[arg(long, default_value = "0")]
        perma_currency: u64,
        /// Total play time in seconds
        #[arg(long, value_name = "SECONDS", default_value = "0")]
        play_time: u64,
    },
    /// Inspect or restore local backups
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Manage the remembered conflict strategy
    Preference {
        #[command(subcommand)]
        command: PreferenceCommands,
    },
    /// Operate on the cloud copy directly
    Cloud {
        #[command(subcommand)]
        command: CloudCommands,
    },
    /// Show or update CLI settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolutionArg {
    KeepLocal,
    KeepCloud,
    KeepNewer,
    Cancel,
}

impl From<ResolutionArg> for ConflictResolution {
    fn from(value: ResolutionArg) -> Self {
        match value {
            ResolutionArg::KeepLocal => Self::KeepLocal,
            ResolutionArg::KeepCloud => Self::KeepCloud,
            ResolutionArg::KeepNewer => Self::KeepNewer,
            ResolutionArg::Cancel => Self::Cancel,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PreferenceArg {
    KeepLocal,
    KeepCloud,
    KeepNewer,
}

impl From<PreferenceArg> for SyncPreference {
    fn from(value: PreferenceArg) -> Self {
        match value {
            PreferenceArg::KeepLocal => Self::KeepLocal,
            PreferenceArg::KeepCloud => Self::KeepCloud,
            PreferenceArg::KeepNewer => Self::KeepNewer,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// List retained backups, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a missing or corrupt local save with the newest valid backup
    Recover,
}

#[derive(Subcommand)]
pub enum PreferenceCommands {
    /// Show the remembered strategy
    Show,
    /// Resolve future conflicts automatically
    Set {
        #[arg(value_enum)]
        strategy: PreferenceArg,
    },
    /// Prompt on every conflict again
    Clear,
}

#[derive(Subcommand)]
pub enum CloudCommands {
    /// Remove the cloud copy
    Delete {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings and where they come from
    Show,
    /// Initialize or update the settings file
    Init {
        /// Backups retained per save
        #[arg(long, value_name = "COUNT")]
        backup_retention: Option<usize>,
        /// Seconds to wait on each cloud call
        #[arg(long, value_name = "SECONDS")]
        cloud_timeout: Option<u64>,
        /// Seconds to wait for a conflict choice
        #[arg(long, value_name = "SECONDS")]
        resolution_timeout: Option<u64>,
        /// Largest cloud record accepted, in bytes
        #[arg(long, value_name = "BYTES")]
        cloud_quota: Option<u64>,
    },
}
