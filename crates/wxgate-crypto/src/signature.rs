//! `msg_signature`: SHA-1 over the sorted concatenation of token, timestamp,
//! nonce and payload.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Lowercase hex SHA-1 of the four values sorted ascending and joined without
/// a separator.
pub fn sign(token: &str, timestamp: &str, nonce: &str, payload: &str) -> String {
    let mut parts = [token, timestamp, nonce, payload];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Recompute the signature and compare it to `candidate` in constant time.
pub fn verify(candidate: &str, token: &str, timestamp: &str, nonce: &str, payload: &str) -> bool {
    let expected = sign(token, timestamp, nonce, payload);
    let candidate = candidate.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}
