use easel_types::AssetKey;

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is prepended to every digest so asset keys can never
/// collide with hashes computed elsewhere for other purposes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for image and other binary assets.
    pub const ASSET: Self = Self {
        domain: "easel-asset-v1",
    };

    /// Digest raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> AssetKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        AssetKey::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected key.
    pub fn verify(&self, data: &[u8], expected: &AssetKey) -> bool {
        self.hash(data) == *expected
    }
}
