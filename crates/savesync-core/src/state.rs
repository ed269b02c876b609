//! Sync lifecycle state shared with UI clients.

use std::fmt;

use serde::Serialize;

/// Where the orchestrator is in a sync cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    CheckingLocal,
    CheckingCloud,
    Comparing,
    ConflictDetected,
    AwaitingResolution,
    Applying,
    Synced,
    Failed,
}

impl SyncPhase {
    /// A cycle is running.
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Idle | Self::Synced | Self::Failed)
    }

    /// Legal edges of the sync state machine.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Failed, Self::CheckingLocal)
                | (Self::CheckingLocal, Self::CheckingCloud)
                | (Self::CheckingCloud, Self::Comparing | Self::Idle)
                | (
                    Self::Comparing,
                    Self::Synced | Self::ConflictDetected | Self::Idle
                )
                | (
                    Self::ConflictDetected,
                    Self::AwaitingResolution | Self::Applying
                )
                | (Self::AwaitingResolution, Self::Applying | Self::Idle)
                | (Self::Applying, Self::Synced | Self::Idle)
                | (Self::Synced, Self::Idle)
                | (
                    Self::CheckingLocal
                        | Self::CheckingCloud
                        | Self::Comparing
                        | Self::ConflictDetected
                        | Self::AwaitingResolution
                        | Self::Applying,
                    Self::Failed
                )
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingLocal => "checking local save",
            Self::CheckingCloud => "checking cloud save",
            Self::Comparing => "comparing saves",
            Self::ConflictDetected => "conflict detected",
            Self::AwaitingResolution => "awaiting resolution",
            Self::Applying => "applying resolution",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
