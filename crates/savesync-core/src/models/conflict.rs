//! Sync conflict model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::SaveMetadata;

/// Local and cloud saves that describe diverging progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConflict {
    /// Metadata of the on-device save
    pub local: SaveMetadata,
    /// Metadata of the remote save
    pub cloud: SaveMetadata,
}

/// Action chosen for a detected conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Overwrite the cloud with the local save
    KeepLocal,
    /// Overwrite the local save with the cloud
    KeepCloud,
    /// Keep whichever was saved last, local on a tie
    KeepNewer,
    /// Defer; touch neither store
    Cancel,
}

impl ConflictResolution {
    pub const ALL: [Self; 4] = [Self::KeepLocal, Self::KeepCloud, Self::KeepNewer, Self::Cancel];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::KeepCloud => "keep_cloud",
            Self::KeepNewer => "keep_newer",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|resolution| resolution.as_str() == normalized)
            .ok_or_else(|| {
                format!("unknown resolution '{s}' (expected keep_local, keep_cloud, keep_newer or cancel)")
            })
    }
}

/// What the conflict UI answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionChoice {
    pub resolution: ConflictResolution,
    /// Persist the resolution as the default for future conflicts
    pub remember: bool,
}

impl ResolutionChoice {
    #[must_use]
    pub const fn once(resolution: ConflictResolution) -> Self {
        Self {
            resolution,
            remember: false,
        }
    }

    #[must_use]
    pub const fn remembered(resolution: ConflictResolution) -> Self {
        Self {
            resolution,
            remember: true,
        }
    }
}
