//! Resolution policies for a detected conflict.

use serde::Serialize;

use crate::models::{ConflictResolution, SaveConflict, SaveOrigin};

/// What to do with a conflict once a resolution is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResolvedOutcome {
    /// Keep `winner`'s save; the other side gets overwritten
    Keep { winner: SaveOrigin },
    /// Touch neither store; the conflict comes back on the next sync
    Deferred,
}

impl ResolvedOutcome {
    pub const fn winner(self) -> Option<SaveOrigin> {
        match self {
            Self::Keep { winner } => Some(winner),
            Self::Deferred => None,
        }
    }
}

/// Map a resolution onto the conflict. Pure; no store is touched.
pub fn resolve(conflict: &SaveConflict, choice: ConflictResolution) -> ResolvedOutcome {
    match choice {
        ConflictResolution::KeepLocal => ResolvedOutcome::Keep {
            winner: SaveOrigin::Local,
        },
        ConflictResolution::KeepCloud => ResolvedOutcome::Keep {
            winner: SaveOrigin::Cloud,
        },
        ConflictResolution::KeepNewer => ResolvedOutcome::Keep {
            winner: newer_side(conflict),
        },
        ConflictResolution::Cancel => ResolvedOutcome::Deferred,
    }
}

/// Strictly newer `last_saved` wins; an exact tie goes to the active client.
fn newer_side(conflict: &SaveConflict) -> SaveOrigin {
    if conflict.cloud.is_newer_than(&conflict.local) {
        SaveOrigin::Cloud
    } else {
        SaveOrigin::Local
    }
}
