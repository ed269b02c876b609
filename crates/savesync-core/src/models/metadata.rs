//! Save metadata model

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a save: when it was written and how far the player had progressed.
///
/// Two values describe the same progress state only when every field is equal;
/// a single currency unit of difference is divergence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Player level at the time of the save
    pub player_level: u32,
    /// Wall-clock time of the write; the only input to "newer"
    pub last_saved: DateTime<Utc>,
    /// Run-scoped currency
    pub meta_currency: u64,
    /// Currency that persists across runs
    pub perma_currency: u64,
    /// Accumulated play time
    pub total_play_time: Duration,
}

impl SaveMetadata {
    /// Metadata stamped with the current time.
    #[must_use]
    pub fn now(
        player_level: u32,
        meta_currency: u64,
        perma_currency: u64,
        total_play_time: Duration,
    ) -> Self {
        Self {
            player_level,
            last_saved: Utc::now(),
            meta_currency,
            perma_currency,
            total_play_time,
        }
    }

    /// Order two saves by `last_saved` only.
    pub fn compare_last_saved(&self, other: &Self) -> Ordering {
        self.last_saved.cmp(&other.last_saved)
    }

    /// Strictly newer than `other`.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.compare_last_saved(other) == Ordering::Greater
    }
}
