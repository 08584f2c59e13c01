//! Cache key generation.

use sha2::{Digest, Sha256};

/// Namespace prefix shared with other users of the redis instance.
pub const KEY_PREFIX: &str = "unfurl:";

/// Compute the cache key for a preview request.
///
/// The key is derived from the URL exactly as requested (surrounding
/// whitespace aside), before any redirect is followed, so repeated requests
/// for the same input always land on the same entry.
pub fn compute_cache_key(requested_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(requested_url.trim().as_bytes());
    format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}
