//! Persistent CLI settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use savesync_core::config::DEFAULT_BACKUP_RETENTION;
use savesync_core::util::normalize_text_option;
use savesync_core::SyncConfig;
use serde::{Deserialize, Serialize};

const APP_DIR_NAME: &str = "savesync";
const SETTINGS_FILE_NAME: &str = "cli-settings.json";
const SAVE_DIR_NAME: &str = "save";
const PREFERENCES_FILE_NAME: &str = "sync-preferences.json";

pub const SAVE_DIR_ENV: &str = "SAVESYNC_SAVE_DIR";
pub const CLOUD_DIR_ENV: &str = "SAVESYNC_CLOUD_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliSettings {
    #[serde(default = "default_settings_version")]
    pub version: u32,
    #[serde(default)]
    pub save_dir: Option<PathBuf>,
    #[serde(default)]
    pub cloud_dir: Option<PathBuf>,
    #[serde(default)]
    pub backup_retention: Option<usize>,
    #[serde(default)]
    pub cloud_timeout_secs: Option<u64>,
    #[serde(default)]
    pub resolution_timeout_secs: Option<u64>,
    #[serde(default)]
    pub cloud_quota_bytes: Option<u64>,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            version: default_settings_version(),
            save_dir: None,
            cloud_dir: None,
            backup_retention: None,
            cloud_timeout_secs: None,
            resolution_timeout_secs: None,
            cloud_quota_bytes: None,
        }
    }
}

/// Directories given on the command line
#[derive(Debug, Clone, Default)]
pub struct DirOverrides {
    pub save_dir: Option<PathBuf>,
    pub cloud_dir: Option<PathBuf>,
}

/// Directories after applying flags, environment, settings and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirs {
    pub save_dir: PathBuf,
    pub cloud_dir: Option<PathBuf>,
}

impl ResolvedDirs {
    pub fn preferences_path(&self) -> PathBuf {
        self.save_dir.join(PREFERENCES_FILE_NAME)
    }
}

const fn default_settings_version() -> u32 {
    1
}

pub fn default_settings_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
        .ok_or_else(|| "Failed to resolve the platform config directory".to_string())
}

pub fn default_save_dir() -> Result<PathBuf, String> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(SAVE_DIR_NAME))
        .ok_or_else(|| "Failed to resolve the platform data directory".to_string())
}

pub fn normalize_path_option(value: Option<PathBuf>) -> Option<PathBuf> {
    let value = value?;
    normalize_text_option(Some(value.to_string_lossy().into_owned())).map(PathBuf::from)
}

impl CliSettings {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_settings_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read settings at {}: {}", path.display(), error))?;
        let mut settings = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse settings at {}: {}", path.display(), error))?;
        settings.normalize();
        Ok(settings)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_settings_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create settings directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize settings: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write settings at {}: {}", path.display(), error))
    }

    /// Sync tunables with unset values falling back to the core defaults.
    pub fn sync_config(&self) -> Result<SyncConfig, String> {
        let mut config = SyncConfig::default()
            .with_backup_retention(self.backup_retention.unwrap_or(DEFAULT_BACKUP_RETENTION));
        if let Some(seconds) = self.cloud_timeout_secs {
            config = config.with_cloud_timeout(Duration::from_secs(seconds));
        }
        if let Some(seconds) = self.resolution_timeout_secs {
            config = config.with_resolution_timeout(Duration::from_secs(seconds));
        }
        config.validate().map_err(|error| error.to_string())?;
        Ok(config)
    }

    /// Flags win over the environment, which wins over the settings file.
    pub fn resolve_dirs(
        &self,
        overrides: DirOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedDirs, String> {
        let from_env = |key: &str| normalize_text_option(lookup(key)).map(PathBuf::from);

        let save_dir = match normalize_path_option(overrides.save_dir)
            .or_else(|| from_env(SAVE_DIR_ENV))
            .or_else(|| self.save_dir.clone())
        {
            Some(dir) => dir,
            None => default_save_dir()?,
        };
        let cloud_dir = normalize_path_option(overrides.cloud_dir)
            .or_else(|| from_env(CLOUD_DIR_ENV))
            .or_else(|| self.cloud_dir.clone());

        Ok(ResolvedDirs {
            save_dir,
            cloud_dir,
        })
    }

    fn normalize(&mut self) {
        self.save_dir = normalize_path_option(self.save_dir.take());
        self.cloud_dir = normalize_path_option(self.cloud_dir.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn normalize_path_option_rejects_blank() {
        assert_eq!(normalize_path_option(None), None);
        assert_eq!(normalize_path_option(Some(PathBuf::from("   "))), None);
        assert_eq!(
            normalize_path_option(Some(PathBuf::from(" /saves "))),
            Some(PathBuf::from("/saves"))
        );
    }

    #[test]
    fn missing_settings_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let settings = CliSettings::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, CliSettings::default());
        assert_eq!(settings.version, 1);
    }

    #[test]
    fn settings_roundtrip_normalizes_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let settings = CliSettings {
            save_dir: Some(PathBuf::from(" /games/save ")),
            cloud_dir: Some(PathBuf::from("  ")),
            backup_retention: Some(8),
            cloud_quota_bytes: Some(4096),
            ..CliSettings::default()
        };
        settings.save_to_path(&path).unwrap();

        let loaded = CliSettings::load_from_path(&path).unwrap();
        assert_eq!(loaded.save_dir, Some(PathBuf::from("/games/save")));
        assert_eq!(loaded.cloud_dir, None);
        assert_eq!(loaded.backup_retention, Some(8));
        assert_eq!(loaded.cloud_quota_bytes, Some(4096));
    }

    #[test]
    fn malformed_settings_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let error = CliSettings::load_from_path(&path).unwrap_err();
        assert!(error.starts_with("Failed to parse settings at"));
    }

    #[test]
    fn resolve_dirs_prefers_flags_then_env_then_file() {
        let settings = CliSettings {
            save_dir: Some(PathBuf::from("/file/save")),
            cloud_dir: Some(PathBuf::from("/file/cloud")),
            ..CliSettings::default()
        };
        let env = |key: &str| match key {
            SAVE_DIR_ENV => Some("/env/save".to_string()),
            CLOUD_DIR_ENV => Some(" ".to_string()),
            _ => None,
        };

        let resolved = settings
            .resolve_dirs(
                DirOverrides {
                    save_dir: None,
                    cloud_dir: Some(PathBuf::from("/flag/cloud")),
                },
                env,
            )
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedDirs {
                save_dir: PathBuf::from("/env/save"),
                cloud_dir: Some(PathBuf::from("/flag/cloud")),
            }
        );

        let resolved = settings.resolve_dirs(DirOverrides::default(), env).unwrap();
        assert_eq!(resolved.cloud_dir, Some(PathBuf::from("/file/cloud")));
        assert_eq!(
            resolved.preferences_path(),
            PathBuf::from("/env/save").join(PREFERENCES_FILE_NAME)
        );
    }

    #[test]
    fn sync_config_applies_overrides_and_validates() {
        let settings = CliSettings {
            backup_retention: Some(2),
            cloud_timeout_secs: Some(3),
            resolution_timeout_secs: Some(30),
            ..CliSettings::default()
        };
        let config = settings.sync_config().unwrap();
        assert_eq!(config.backup_retention, 2);
        assert_eq!(config.cloud_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.resolution_timeout, Some(Duration::from_secs(30)));

        let invalid = CliSettings {
            backup_retention: Some(0),
            ..CliSettings::default()
        };
        assert!(invalid.sync_config().is_err());
        assert_eq!(
            CliSettings::default().sync_config().unwrap(),
            SyncConfig::default()
        );
    }
}
