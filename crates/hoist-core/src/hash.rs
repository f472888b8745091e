use crate::id::Fingerprint;

/// Domain-separated BLAKE3 hash: "hoist\0" || version || payload
///
/// Only the bytes participate; names and metadata never do.
pub fn fingerprint(payload: &[u8]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"hoist\0");
    hasher.update(&[1u8]); // version
    hasher.update(payload);
    let hash = hasher.finalize();
    Fingerprint::from_bytes(*hash.as_bytes())
}
