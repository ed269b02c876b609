//! Storage for the two save replicas, backups and the sync preference.

mod backup;
mod cloud;
mod local;
mod preferences;

pub use backup::{BackupEntry, BackupManager, RecoveredBackup};
pub use cloud::{CloudError, CloudResult, CloudStore, DirectoryCloudStore, MemoryCloudStore};
pub use local::{FileSaveStore, LocalSaveStore};
pub use preferences::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore};
