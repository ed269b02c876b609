//! Save blob model and its on-disk record

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::SaveMetadata;
use crate::error::{Error, Result};

/// Current on-disk record version.
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// Which replica a blob was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOrigin {
    /// The on-device save
    Local,
    /// The remote save
    Cloud,
}

impl SaveOrigin {
    /// The other replica.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Local => Self::Cloud,
            Self::Cloud => Self::Local,
        }
    }
}

impl fmt::Display for SaveOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// A serialized game state together with the metadata derived from it.
///
/// Blobs are never mutated: every write produces a new one. Fields are private
/// so metadata cannot drift from the payload it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveBlob {
    payload: Vec<u8>,
    metadata: SaveMetadata,
    origin: SaveOrigin,
}

impl SaveBlob {
    /// Capture a freshly written local save.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>, metadata: SaveMetadata) -> Self {
        Self {
            payload: payload.into(),
            metadata,
            origin: SaveOrigin::Local,
        }
    }

    /// Rebuild a blob read back from a replica.
    #[must_use]
    pub fn from_record(record: SaveRecord, origin: SaveOrigin) -> Self {
        Self {
            payload: record.payload,
            metadata: record.metadata,
            origin,
        }
    }

    /// Opaque serialized game state
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub const fn metadata(&self) -> &SaveMetadata {
        &self.metadata
    }

    pub const fn origin(&self) -> SaveOrigin {
        self.origin
    }

    /// Same content, tagged as read from `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: SaveOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Persisted form of this blob; the origin is not part of it.
    pub fn to_record(&self) -> SaveRecord {
        SaveRecord {
            format_version: SAVE_FORMAT_VERSION,
            metadata: self.metadata.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Encode as the on-disk JSON record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_record())?)
    }

    /// Size of the encoded record, the figure cloud quotas are checked against.
    pub fn encoded_len(&self) -> Result<u64> {
        Ok(self.encode()?.len() as u64)
    }

    /// Decode an on-disk record, running the integrity check.
    ///
    /// `path` only labels the error.
    pub fn decode(bytes: &[u8], origin: SaveOrigin, path: &Path) -> Result<Self> {
        let record: SaveRecord =
            serde_json::from_slice(bytes).map_err(|error| Error::CorruptSave {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;
        record.verify(path)?;
        Ok(Self::from_record(record, origin))
    }
}

/// On-disk save record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveRecord {
    pub format_version: u32,
    pub metadata: SaveMetadata,
    #[serde(default, with = "base64_payload")]
    pub payload: Vec<u8>,
}

/// Payload bytes as a standard base64 string.
mod base64_payload {
    use base64::prelude::{Engine as _, BASE64_STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

impl SaveRecord {
    fn verify(&self, path: &Path) -> Result<()> {
        if self.format_version != SAVE_FORMAT_VERSION {
            return Err(Error::CorruptSave {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported format_version {} (expected {SAVE_FORMAT_VERSION})",
                    self.format_version
                ),
            });
        }
        Ok(())
    }
}
