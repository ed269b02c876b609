//! Rotating backups of superseded local saves.
//!
//! Backups live one file per superseded save under a dedicated directory,
//! named `backup-<sequence>.json`. Sequence numbers only grow, so a backup
//! file is written exactly once and never modified afterwards.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{SaveBlob, SaveOrigin};
use crate::util::write_bytes_atomic;

const BACKUP_PREFIX: &str = "backup-";
const BACKUP_SUFFIX: &str = ".json";

/// One retained backup file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// Position in write order; higher is more recent
    pub sequence: u64,
    pub path: PathBuf,
}

/// A backup that passed the integrity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredBackup {
    pub entry: BackupEntry,
    pub blob: SaveBlob,
}

/// Bounded, most-recent-first sequence of superseded local saves
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
    retention: usize,
}

impl BackupManager {
    /// Manage backups under `dir`, keeping at most `retention` of them.
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub const fn retention(&self) -> usize {
        self.retention
    }

    /// Retain `current` before the active save is replaced.
    ///
    /// Evicts the oldest backups beyond the retention cap.
    pub fn on_before_overwrite(&self, current: &SaveBlob) -> Result<()> {
        if self.retention == 0 {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let sequence = self
            .entries()?
            .first()
            .map_or(1, |newest| newest.sequence + 1);
        let path = self.dir.join(backup_file_name(sequence));
        write_bytes_atomic(&path, &current.encode()?)?;
        tracing::debug!(
            "Backed up save from {} as {}",
            current.metadata().last_saved,
            path.display()
        );

        self.prune()
    }

    /// Retained backups, most recent first.
    pub fn entries(&self) -> Result<Vec<BackupEntry>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(sequence) = parse_backup_sequence(&file_name.to_string_lossy()) {
                entries.push(BackupEntry {
                    sequence,
                    path: entry.path(),
                });
            }
        }

        entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(entries)
    }

    /// Read and integrity-check one backup.
    pub fn load(&self, entry: &BackupEntry) -> Result<SaveBlob> {
        let bytes = fs::read(&entry.path)?;
        SaveBlob::decode(&bytes, SaveOrigin::Local, &entry.path)
    }

    /// The most recent backup that passes the integrity check.
    ///
    /// Backups that fail the check are discarded on the way.
    pub fn recover_last_good(&self) -> Result<Option<RecoveredBackup>> {
        for entry in self.entries()? {
            match self.load(&entry) {
                Ok(blob) => {
                    tracing::info!("Recovered save from backup {}", entry.path.display());
                    return Ok(Some(RecoveredBackup { entry, blob }));
                }
                Err(error) if error.is_corruption() => {
                    tracing::warn!("Discarding unreadable backup: {}", error);
                    self.remove(&entry)?;
                }
                Err(error) => return Err(error),
            }
        }

        Ok(None)
    }

    pub fn remove(&self, entry: &BackupEntry) -> Result<()> {
        match fs::remove_file(&entry.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    fn prune(&self) -> Result<()> {
        for stale in self.entries()?.iter().skip(self.retention) {
            tracing::debug!("Evicting backup {}", stale.path.display());
            self.remove(stale)?;
        }
        Ok(())
    }
}

fn backup_file_name(sequence: u64) -> String {
    format!("{BACKUP_PREFIX}{sequence:010}{BACKUP_SUFFIX}")
}

fn parse_backup_sequence(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?
        .parse()
        .ok()
}
