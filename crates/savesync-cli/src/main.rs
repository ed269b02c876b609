//! savesync CLI - reconcile a local game save with its cloud copy
//!
//! Wires the core orchestrator to a directory-backed cloud replica and an
//! interactive terminal prompt.

mod cli;
mod commands;
mod error;
mod prompt;
mod settings;

use clap::Parser;
use tracing_subscriber::filter::Directive;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::commands::backups::run_backups;
use crate::commands::cloud::run_cloud;
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::config::{run_config_init, run_config_show, SettingsUpdate};
use crate::commands::preference::run_preference;
use crate::commands::save::{run_save, SaveProgress};
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, SyncArgs};
use crate::error::CliError;
use crate::settings::{CliSettings, DirOverrides};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let default_directive = "savesync=info"
        .parse::<Directive>()
        .map_err(|error| CliError::Config(error.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_directive),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = DirOverrides {
        save_dir: cli.save_dir,
        cloud_dir: cli.cloud_dir,
    };

    match cli.command {
        Commands::Sync {
            choose,
            remember,
            cloud_timeout,
            resolution_timeout,
            json,
        } => {
            let args = SyncArgs {
                choose: choose.map(Into::into),
                remember,
                cloud_timeout,
                resolution_timeout,
                json,
            };
            run_sync(&load_context(overrides)?, &args).await?;
        }
        Commands::Status { json } => run_status(&load_context(overrides)?, json).await?,
        Commands::Save {
            payload,
            level,
            meta_currency,
            perma_currency,
            play_time,
        } => {
            let progress = SaveProgress {
                level,
                meta_currency,
                perma_currency,
                play_time_secs: play_time,
            };
            run_save(&load_context(overrides)?, &payload, progress)?;
        }
        Commands::Backups { command } => run_backups(&load_context(overrides)?, command)?,
        Commands::Preference { command } => {
            run_preference(&load_context(overrides)?, command)?;
        }
        Commands::Cloud { command } => run_cloud(&load_context(overrides)?, command).await?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => run_config_show(&load_context(overrides)?)?,
            ConfigCommands::Init {
                backup_retention,
                cloud_timeout,
                resolution_timeout,
                cloud_quota,
            } => run_config_init(SettingsUpdate {
                dirs: overrides,
                backup_retention,
                cloud_timeout,
                resolution_timeout,
                cloud_quota,
            })?,
        },
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_context(overrides: DirOverrides) -> Result<Context, CliError> {
    let settings = CliSettings::load().map_err(CliError::Config)?;
    let dirs = settings
        .resolve_dirs(overrides, |key| std::env::var(key).ok())
        .map_err(CliError::Config)?;
    tracing::debug!("Using save directory {}", dirs.save_dir.display());
    Context::new(settings, dirs)
}
