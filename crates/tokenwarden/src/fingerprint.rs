//! Short, non-reversible token identifiers for log fields.

use sha2::{Digest, Sha256};

/// Number of hex characters in a fingerprint.
pub const FINGERPRINT_LEN: usize = 12;

/// Returns the first [`FINGERPRINT_LEN`] hex characters of the token's SHA-256.
///
/// Raw tokens are bearer credentials and must never reach a log sink; this is
/// what gets logged instead when no token id is known.
#[must_use]
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}
