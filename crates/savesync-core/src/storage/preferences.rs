//! Persisted sync preference storage

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::models::{SyncPreference, SyncSettings};
use crate::util::write_bytes_atomic;

/// Trait for the remembered conflict strategy
pub trait PreferenceStore {
    /// Load the remembered strategy, if the user opted into one
    fn load(&self) -> Result<Option<SyncPreference>>;

    /// Remember `preference` for future conflicts
    fn remember(&self, preference: SyncPreference) -> Result<()>;

    /// Stop applying a remembered strategy
    fn forget(&self) -> Result<()>;
}

/// JSON file implementation of `PreferenceStore`
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_settings(&self) -> Result<SyncSettings> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(SyncSettings::default())
            }
            Err(error) => return Err(error.into()),
        };
        serde_json::from_str(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "Failed to parse sync settings at {}: {error}",
                self.path.display()
            ))
        })
    }

    /// Current settings as the base for a write; an unparseable file is replaced.
    fn settings_for_update(&self) -> Result<SyncSettings> {
        match self.load_settings() {
            Err(Error::InvalidInput(reason)) => {
                tracing::warn!("Replacing unreadable sync settings: {}", reason);
                Ok(SyncSettings::default())
            }
            other => other,
        }
    }

    fn save_settings(&self, settings: &SyncSettings) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(settings)?;
        write_bytes_atomic(&self.path, &serialized)?;
        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn load(&self) -> Result<Option<SyncPreference>> {
        Ok(self.load_settings()?.conflict_strategy)
    }

    fn remember(&self, preference: SyncPreference) -> Result<()> {
        let mut settings = self.settings_for_update()?;
        settings.conflict_strategy = Some(preference);
        self.save_settings(&settings)
    }

    fn forget(&self) -> Result<()> {
        let mut settings = self.settings_for_update()?;
        settings.conflict_strategy = None;
        self.save_settings(&settings)
    }
}

/// In-memory implementation of `PreferenceStore`
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    preference: Mutex<Option<SyncPreference>>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn new(preference: Option<SyncPreference>) -> Self {
        Self {
            preference: Mutex::new(preference),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<SyncPreference>> {
        Ok(*self
            .preference
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn remember(&self, preference: SyncPreference) -> Result<()> {
        *self
            .preference
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(preference);
        Ok(())
    }

    fn forget(&self) -> Result<()> {
        *self
            .preference
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
