//! Content-addressed deduplication for share links.
//!
//! A fingerprint is the SHA-256 hex digest of the raw link string. It is used
//! for membership tests only, never for integrity. The seen-cache is a FIFO
//! list capped at [`CACHE_CAP`] entries after every cycle: a link older than
//! the 500 most recent admissions may be reprocessed as new, which is an
//! accepted tradeoff of the approximate dedup.

use sha2::{Digest, Sha256};

/// Maximum number of fingerprints retained across cycles.
pub const CACHE_CAP: usize = 500;

/// Stable digest of a share link's exact string value.
pub fn fingerprint(config: &str) -> String {
    let digest = Sha256::digest(config.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Append `fp` to the cache if it is not already present.
/// Returns `true` when the fingerprint was new.
pub fn admit(cache: &mut Vec<String>, fp: String) -> bool {
    if cache.iter().any(|seen| *seen == fp) {
        return false;
    }
    cache.push(fp);
    true
}

/// Drop oldest entries (insertion order) until the cache is within the cap.
pub fn truncate(cache: &mut Vec<String>) {
    if cache.len() > CACHE_CAP {
        let excess = cache.len() - CACHE_CAP;
        cache.drain(..excess);
    }
}
