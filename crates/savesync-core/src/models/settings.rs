//! Persisted sync settings model

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConflictResolution;
use crate::error::Error;

/// A remembered conflict strategy.
///
/// Unlike [`ConflictResolution`] this cannot hold `Cancel`: deferring is never
/// something to apply automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPreference {
    KeepLocal,
    KeepCloud,
    KeepNewer,
}

impl From<SyncPreference> for ConflictResolution {
    fn from(value: SyncPreference) -> Self {
        match value {
            SyncPreference::KeepLocal => Self::KeepLocal,
            SyncPreference::KeepCloud => Self::KeepCloud,
            SyncPreference::KeepNewer => Self::KeepNewer,
        }
    }
}

impl TryFrom<ConflictResolution> for SyncPreference {
    type Error = Error;

    fn try_from(value: ConflictResolution) -> Result<Self, Self::Error> {
        match value {
            ConflictResolution::KeepLocal => Ok(Self::KeepLocal),
            ConflictResolution::KeepCloud => Ok(Self::KeepCloud),
            ConflictResolution::KeepNewer => Ok(Self::KeepNewer),
            ConflictResolution::Cancel => Err(Error::InvalidChoice(value)),
        }
    }
}

impl fmt::Display for SyncPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ConflictResolution::from(*self).fmt(f)
    }
}

/// User settings owned by the sync subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_settings_version")]
    pub version: u32,
    /// Strategy applied without prompting when set
    #[serde(default)]
    pub conflict_strategy: Option<SyncPreference>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            version: default_settings_version(),
            conflict_strategy: None,
        }
    }
}

const fn default_settings_version() -> u32 {
    1
}
