//! savesync-core - Core library for savesync
//!
//! Reconciles a locally persisted game save with a cloud-stored copy:
//! detects divergence, resolves it under an explicit policy, and keeps
//! rotating backups so a corrupt save never costs the player their progress.

pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use models::{ConflictResolution, SaveBlob, SaveConflict, SaveMetadata, SaveOrigin};
pub use state::SyncPhase;
pub use sync::{SyncError, SyncOrchestrator, SyncOutcome, SyncReport, SyncRequest};
