//! Conflict detection between the two replicas.

use crate::models::{SaveConflict, SaveMetadata};

/// Compare local and cloud metadata field by field.
///
/// Returns `None` when every field matches. Any difference, however small,
/// is a conflict. A side with no save at all never reaches this function.
pub fn detect(local: &SaveMetadata, cloud: &SaveMetadata) -> Option<SaveConflict> {
    if local == cloud {
        return None;
    }

    Some(SaveConflict {
        local: local.clone(),
        cloud: cloud.clone(),
    })
}

/// Names of the fields that differ.
pub fn diverging_fields(local: &SaveMetadata, cloud: &SaveMetadata) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if local.player_level != cloud.player_level {
        fields.push("player_level");
    }
    if local.last_saved != cloud.last_saved {
        fields.push("last_saved");
    }
    if local.meta_currency != cloud.meta_currency {
        fields.push("meta_currency");
    }
    if local.perma_currency != cloud.perma_currency {
        fields.push("perma_currency");
    }
    if local.total_play_time != cloud.total_play_time {
        fields.push("total_play_time");
    }
    fields
}
