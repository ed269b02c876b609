//! Remote save store contract and the stores shipped with the crate.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::models::{SaveBlob, SaveMetadata, SaveOrigin};
use crate::util::{compact_text, temp_path_for};

const CLOUD_SAVE_FILE_NAME: &str = "cloud-save.json";

/// Failures reported by a cloud store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("No cloud save exists")]
    NotFound,
    /// Network, auth, timeout or cancellation; never fatal to a sync
    #[error("Cloud unavailable: {0}")]
    Unavailable(String),
    #[error("Cloud quota exceeded: {required} bytes needed, {limit} allowed")]
    QuotaExceeded { required: u64, limit: u64 },
}

pub type CloudResult<T> = Result<T, CloudError>;

/// Remote save replica. Transport is up to the implementation.
#[allow(async_fn_in_trait)]
pub trait CloudStore {
    /// Metadata of the remote save without its payload.
    async fn fetch_metadata(&self) -> CloudResult<SaveMetadata>;

    /// The full remote save.
    async fn download(&self) -> CloudResult<SaveBlob>;

    /// Replace the remote save.
    async fn upload(&self, blob: &SaveBlob) -> CloudResult<()>;

    /// Remove the remote save. Deleting an absent save succeeds.
    async fn delete(&self) -> CloudResult<()>;
}

#[derive(Debug, Default)]
struct MemoryCloudState {
    save: Option<SaveBlob>,
    unavailable: Option<String>,
    quota_bytes: Option<u64>,
    latency: Option<Duration>,
    uploads: usize,
}

/// In-process cloud store with fault injection, for tests and offline play
#[derive(Debug, Default)]
pub struct MemoryCloudStore {
    state: Mutex<MemoryCloudState>,
}

impl MemoryCloudStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `blob` already stored remotely.
    #[must_use]
    pub fn with_save(blob: SaveBlob) -> Self {
        let store = Self::new();
        store.lock().save = Some(blob.with_origin(SaveOrigin::Cloud));
        store
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Make every call fail with `Unavailable(reason)`, or clear the fault.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.lock().unavailable = reason.map(ToOwned::to_owned);
    }

    /// Reject uploads whose payload exceeds `limit` bytes.
    pub fn set_quota(&self, limit: Option<u64>) {
        self.lock().quota_bytes = limit;
    }

    /// Current remote save, if any.
    pub fn stored(&self) -> Option<SaveBlob> {
        self.lock().save.clone()
    }

    /// Number of accepted uploads.
    pub fn upload_count(&self) -> usize {
        self.lock().uploads
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_round_trip(&self) -> CloudResult<()> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match &self.lock().unavailable {
            Some(reason) => Err(CloudError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl CloudStore for MemoryCloudStore {
    async fn fetch_metadata(&self) -> CloudResult<SaveMetadata> {
        self.simulate_round_trip().await?;
        self.lock()
            .save
            .as_ref()
            .map(|save| save.metadata().clone())
            .ok_or(CloudError::NotFound)
    }

    async fn download(&self) -> CloudResult<SaveBlob> {
        self.simulate_round_trip().await?;
        self.lock().save.clone().ok_or(CloudError::NotFound)
    }

    async fn upload(&self, blob: &SaveBlob) -> CloudResult<()> {
        self.simulate_round_trip().await?;
        let mut state = self.lock();
        if let Some(limit) = state.quota_bytes {
            let required = blob
                .encoded_len()
                .map_err(|error| CloudError::Unavailable(error.to_string()))?;
            check_quota(required, limit)?;
        }
        state.save = Some(blob.clone().with_origin(SaveOrigin::Cloud));
        state.uploads += 1;
        Ok(())
    }

    async fn delete(&self) -> CloudResult<()> {
        self.simulate_round_trip().await?;
        self.lock().save = None;
        Ok(())
    }
}

/// Cloud store backed by a synced or mounted folder.
///
/// The folder itself must exist: a missing root means the remote is not
/// mounted and every call reports `Unavailable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCloudStore {
    root: PathBuf,
    quota_bytes: Option<u64>,
}

impl DirectoryCloudStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quota_bytes: None,
        }
    }

    /// Reject uploads whose encoded record exceeds `limit` bytes.
    #[must_use]
    pub const fn with_quota(mut self, limit: Option<u64>) -> Self {
        self.quota_bytes = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn save_path(&self) -> PathBuf {
        self.root.join(CLOUD_SAVE_FILE_NAME)
    }

    async fn ensure_reachable(&self) -> CloudResult<()> {
        match tokio::fs::metadata(&self.root).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(CloudError::Unavailable(format!(
                "cloud root {} is not a directory",
                self.root.display()
            ))),
            Err(error) => Err(cloud_io_error("reach", &self.root, &error)),
        }
    }

    async fn read_save(&self) -> CloudResult<SaveBlob> {
        self.ensure_reachable().await?;
        let path = self.save_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(CloudError::NotFound)
            }
            Err(error) => return Err(cloud_io_error("read", &path, &error)),
        };
        // an unreadable remote record is never treated as absent
        SaveBlob::decode(&bytes, SaveOrigin::Cloud, &path)
            .map_err(|error| CloudError::Unavailable(compact_text(&error.to_string())))
    }
}

impl CloudStore for DirectoryCloudStore {
    async fn fetch_metadata(&self) -> CloudResult<SaveMetadata> {
        self.read_save().await.map(|save| save.metadata().clone())
    }

    async fn download(&self) -> CloudResult<SaveBlob> {
        self.read_save().await
    }

    async fn upload(&self, blob: &SaveBlob) -> CloudResult<()> {
        self.ensure_reachable().await?;
        let bytes = blob
            .encode()
            .map_err(|error| CloudError::Unavailable(error.to_string()))?;
        if let Some(limit) = self.quota_bytes {
            check_quota(bytes.len() as u64, limit)?;
        }

        let path = self.save_path();
        let tmp_path = temp_path_for(&path);
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|error| cloud_io_error("write", &tmp_path, &error))?;
        if let Err(error) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(cloud_io_error("replace", &path, &error));
        }
        Ok(())
    }

    async fn delete(&self) -> CloudResult<()> {
        self.ensure_reachable().await?;
        let path = self.save_path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(cloud_io_error("delete", &path, &error)),
        }
    }
}

const fn check_quota(required: u64, limit: u64) -> CloudResult<()> {
    if required > limit {
        return Err(CloudError::QuotaExceeded { required, limit });
    }
    Ok(())
}

fn cloud_io_error(operation: &str, path: &Path, error: &io::Error) -> CloudError {
    CloudError::Unavailable(format!(
        "cloud {operation} failed for {}: {error}",
        path.display()
    ))
}
