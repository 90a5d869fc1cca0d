//! Content checksums for change detection.
//!
//! The digest is computed over the raw file bytes so any edit, including
//! whitespace, produces a new checksum. It is not used for integrity or security.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `bytes`
pub fn content_checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
