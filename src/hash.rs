//! Content hashing.
//!
//! SHA-256 over the raw payload bytes, rendered as lowercase hex. The
//! digest both verifies caller-declared hashes at ingestion and populates
//! the `sha256` field of every stored record.

use sha2::{Digest, Sha256};

/// Compute the content hash of a byte payload.
///
/// Pure and deterministic: identical bytes always yield the identical
/// 64-character lowercase hex digest.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
