//! File-backed local save store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::backup::BackupManager;
use crate::error::Result;
use crate::models::{SaveBlob, SaveOrigin};
use crate::util::{unix_millis_now, write_bytes_atomic};

const SAVE_FILE_NAME: &str = "save.json";
const BACKUP_DIR_NAME: &str = "backups";

/// Trait for the on-device save replica
pub trait LocalSaveStore {
    /// Read the active save; `Ok(None)` when none has been written yet.
    ///
    /// An unreadable save is reported as [`crate::Error::CorruptSave`].
    fn read_local(&self) -> Result<Option<SaveBlob>>;

    /// Replace the active save, retaining the superseded one as a backup first.
    fn write_local(&self, blob: &SaveBlob) -> Result<()>;

    /// Replace an unreadable active save with the newest valid backup.
    fn recover_last_good(&self) -> Result<Option<SaveBlob>>;
}

/// Local store keeping `save.json` and a `backups/` directory under one root
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    save_path: PathBuf,
    backups: BackupManager,
}

impl FileSaveStore {
    /// Open a store rooted at `dir`, creating the directory when missing.
    pub fn open(dir: impl Into<PathBuf>, backup_retention: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            save_path: dir.join(SAVE_FILE_NAME),
            backups: BackupManager::new(dir.join(BACKUP_DIR_NAME), backup_retention),
        })
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub const fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Move an unreadable active save aside so it is never silently destroyed.
    fn quarantine_corrupt_save(&self) -> Result<Option<PathBuf>> {
        if !self.save_path.exists() {
            return Ok(None);
        }

        let quarantine_name = format!("{SAVE_FILE_NAME}.corrupt-{}", unix_millis_now());
        let quarantine_path = self.save_path.with_file_name(quarantine_name);
        fs::rename(&self.save_path, &quarantine_path)?;
        tracing::warn!(
            "Moved corrupted save from {} to {}",
            self.save_path.display(),
            quarantine_path.display()
        );
        Ok(Some(quarantine_path))
    }
}

impl LocalSaveStore for FileSaveStore {
    fn read_local(&self) -> Result<Option<SaveBlob>> {
        let bytes = match fs::read(&self.save_path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        SaveBlob::decode(&bytes, SaveOrigin::Local, &self.save_path).map(Some)
    }

    fn write_local(&self, blob: &SaveBlob) -> Result<()> {
        match self.read_local() {
            Ok(Some(current)) => self.backups.on_before_overwrite(&current)?,
            Ok(None) => {}
            Err(error) if error.is_corruption() => {
                tracing::warn!("Replacing unreadable save: {}", error);
                self.quarantine_corrupt_save()?;
            }
            Err(error) => return Err(error),
        }

        write_bytes_atomic(&self.save_path, &blob.encode()?)?;
        tracing::debug!(
            "Wrote local save (level {}, saved {})",
            blob.metadata().player_level,
            blob.metadata().last_saved
        );
        Ok(())
    }

    fn recover_last_good(&self) -> Result<Option<SaveBlob>> {
        let Some(recovered) = self.backups.recover_last_good()? else {
            return Ok(None);
        };

        self.quarantine_corrupt_save()?;
        // primary first: a crash in between leaves a duplicate, never a gap
        write_bytes_atomic(&self.save_path, &recovered.blob.encode()?)?;
        self.backups.remove(&recovered.entry)?;
        Ok(Some(recovered.blob))
    }
}
