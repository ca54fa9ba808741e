use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::AppError;

/// Cached JSON payload stored next to its SHA-256 checksum.
///
/// Entries are checked on every read; a mismatch or unparsable entry is
/// reported as a miss so the caller reloads from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCacheEntry {
    /// The cached data (JSON string)
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the checksum still matches the data.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// Serialize `value` and wrap it into a storable string.
    pub fn encode<T: Serialize>(value: &T) -> Result<String, AppError> {
        let data = serde_json::to_string(value)?;
        Ok(serde_json::to_string(&Self::new(data))?)
    }

    /// Validate and deserialize an entry produced by [`ValidatedCacheEntry::encode`].
    pub fn decode<T: DeserializeOwned>(serialized: &str) -> Option<T> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if !entry.is_valid() {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            return None;
        }

        serde_json::from_str(&entry.data).ok()
    }
}
