//! Data models for savesync

mod conflict;
mod metadata;
mod save;
mod settings;

pub use conflict::{ConflictResolution, ResolutionChoice, SaveConflict};
pub use metadata::SaveMetadata;
pub use save::{SaveBlob, SaveOrigin, SaveRecord, SAVE_FORMAT_VERSION};
pub use settings::{SyncPreference, SyncSettings};
