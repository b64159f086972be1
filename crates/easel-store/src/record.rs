use chrono::{DateTime, Utc};
use easel_types::AssetKey;

use crate::hasher::ContentHasher;

/// A stored binary asset.
///
/// `key` is always the digest of `bytes`; two records with the same key hold
/// identical content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobRecord {
    pub key: AssetKey,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl BlobRecord {
    /// Digest `bytes` and wrap them in a new record stamped now.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            key: ContentHasher::ASSET.hash(&bytes),
            bytes,
            created_at: Utc::now(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
