use std::path::PathBuf;

use savesync_core::config::MAX_BACKUP_RETENTION;
use serde::Serialize;

use crate::commands::common::Context;
use crate::error::CliError;
use crate::settings::{default_settings_path, normalize_path_option, CliSettings, DirOverrides};

/// Values `config init` may change
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub dirs: DirOverrides,
    pub backup_retention: Option<usize>,
    pub cloud_timeout: Option<u64>,
    pub resolution_timeout: Option<u64>,
    pub cloud_quota: Option<u64>,
}

#[derive(Debug, Serialize)]
struct EffectiveSettings<'a> {
    settings_path: Option<PathBuf>,
    save_dir: &'a PathBuf,
    cloud_dir: Option<&'a PathBuf>,
    preferences_path: PathBuf,
    backup_retention: usize,
    cloud_timeout_secs: Option<u64>,
    resolution_timeout_secs: Option<u64>,
    cloud_quota_bytes: Option<u64>,
}

pub fn run_config_show(context: &Context) -> Result<(), CliError> {
    let effective = EffectiveSettings {
        settings_path: default_settings_path().ok(),
        save_dir: &context.dirs.save_dir,
        cloud_dir: context.dirs.cloud_dir.as_ref(),
        preferences_path: context.dirs.preferences_path(),
        backup_retention: context.config.backup_retention,
        cloud_timeout_secs: context.config.cloud_timeout.map(|timeout| timeout.as_secs()),
        resolution_timeout_secs: context
            .config
            .resolution_timeout
            .map(|timeout| timeout.as_secs()),
        cloud_quota_bytes: context.settings.cloud_quota_bytes,
    };
    println!("{}", serde_json::to_string_pretty(&effective)?);
    Ok(())
}

pub fn run_config_init(update: SettingsUpdate) -> Result<(), CliError> {
    let mut settings = CliSettings::load().map_err(CliError::Config)?;
    apply_update(&mut settings, update)?;
    let path = settings.save().map_err(CliError::Config)?;
    println!("Saved settings to {}", path.display());
    Ok(())
}

/// Merge explicit values into `settings`, leaving unspecified ones as they were.
pub fn apply_update(settings: &mut CliSettings, update: SettingsUpdate) -> Result<(), CliError> {
    if let Some(retention) = update.backup_retention {
        if retention == 0 || retention > MAX_BACKUP_RETENTION {
            return Err(CliError::InvalidArgument(format!(
                "--backup-retention must be between 1 and {MAX_BACKUP_RETENTION}"
            )));
        }
        settings.backup_retention = Some(retention);
    }
    if let Some(seconds) = update.cloud_timeout {
        settings.cloud_timeout_secs = Some(non_zero("--cloud-timeout", seconds)?);
    }
    if let Some(seconds) = update.resolution_timeout {
        settings.resolution_timeout_secs = Some(non_zero("--resolution-timeout", seconds)?);
    }
    if let Some(bytes) = update.cloud_quota {
        settings.cloud_quota_bytes = Some(non_zero("--cloud-quota", bytes)?);
    }
    if let Some(dir) = normalize_path_option(update.dirs.save_dir) {
        settings.save_dir = Some(dir);
    }
    if let Some(dir) = normalize_path_option(update.dirs.cloud_dir) {
        settings.cloud_dir = Some(dir);
    }
    Ok(())
}

fn non_zero(flag: &str, value: u64) -> Result<u64, CliError> {
    if value == 0 {
        return Err(CliError::InvalidArgument(format!(
            "{flag} must be greater than zero"
        )));
    }
    Ok(value)
}
