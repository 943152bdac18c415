//! Content fingerprinting for push de-duplication.

use sha2::{Digest, Sha256};

/// Fingerprint of the empty input.
///
/// Stored on push status documents whose payload carries no alert, so that
/// "no content" still correlates across broadcasts.
pub const EMPTY_FINGERPRINT: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Deterministic fixed-width digest of a string (SHA-256, lowercase hex).
pub fn fingerprint(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
