//! Sync configuration shared by every client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Backups kept when nothing else is configured.
pub const DEFAULT_BACKUP_RETENTION: usize = 5;
/// Upper bound on retained backups.
pub const MAX_BACKUP_RETENTION: usize = 100;
const DEFAULT_CLOUD_TIMEOUT_SECS: u64 = 10;

/// Tunables for the sync subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Superseded local saves kept for corruption recovery
    pub backup_retention: usize,
    /// Bound on each cloud call (default: 10 seconds)
    pub cloud_timeout: Option<Duration>,
    /// Bound on waiting for a conflict choice (default: wait indefinitely)
    pub resolution_timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backup_retention: DEFAULT_BACKUP_RETENTION,
            cloud_timeout: Some(Duration::from_secs(DEFAULT_CLOUD_TIMEOUT_SECS)),
            resolution_timeout: None,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn with_backup_retention(mut self, retention: usize) -> Self {
        self.backup_retention = retention;
        self
    }

    #[must_use]
    pub const fn with_cloud_timeout(mut self, timeout: Duration) -> Self {
        self.cloud_timeout = Some(timeout);
        self
    }

    /// Wait on the cloud for as long as it takes
    #[must_use]
    pub const fn without_cloud_timeout(mut self) -> Self {
        self.cloud_timeout = None;
        self
    }

    #[must_use]
    pub const fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = Some(timeout);
        self
    }

    /// Reject settings that would disable recovery or time out instantly.
    pub fn validate(&self) -> Result<()> {
        if self.backup_retention == 0 || self.backup_retention > MAX_BACKUP_RETENTION {
            return Err(Error::InvalidInput(format!(
                "backup_retention must be between 1 and {MAX_BACKUP_RETENTION}, got {}",
                self.backup_retention
            )));
        }
        if self.cloud_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidInput(
                "cloud_timeout must be greater than zero".to_string(),
            ));
        }
        if self.resolution_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidInput(
                "resolution_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
