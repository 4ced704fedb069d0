//! # Hashing Utilities
//!
//! Hash functions used by the identifier mapping. Two families, two jobs:
//!
//! - **BLAKE3** — everything keyed by the *partition key*: the Stage 1 seed,
//!   per-identifier Stage 1 scores, partition tags and role preferences.
//!   Always used in derive-key mode with a context string from
//!   [`crate::config`], so a Stage 1 seed can never collide with a tag.
//!
//! - **HMAC-SHA256** — Stage 2 scoring, keyed by the Argon2id output derived
//!   from the password. A PRF is what we actually need there: without the
//!   key, the ranking of candidates must look uniformly random.
//!
//! Hash outputs are compared as 32-byte big-endian integers, which for byte
//! arrays is just lexicographic order. That's what makes `sort()` on
//! `[u8; 32]` the "interpret as big integer, sort ascending" rule.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{StoreError, StoreResult};

/// HMAC-SHA256, the Stage 2 PRF.
pub type HmacSha256 = Hmac<Sha256>;

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// `domain_separated_hash("a", x)` and `domain_separated_hash("b", x)` are
/// independent functions; there is no need to prepend tags by hand.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Domain-separated hash over several parts, each prefixed with its
/// length so `("ab", "c")` and `("a", "bc")` hash differently.
pub fn domain_separated_hash_parts(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(&(part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Build an HMAC-SHA256 instance keyed with `key`, ready to be cloned once
/// per message. HMAC takes keys of any length, so the error arm is
/// unreachable in practice.
pub fn hmac_sha256_keyed(key: &[u8]) -> StoreResult<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| StoreError::KeyDerivation(e.to_string()))
}

/// Finish an HMAC over `data` starting from a pre-keyed instance.
pub fn hmac_sha256_with(keyed: &HmacSha256, data: &[u8]) -> [u8; 32] {
    let mut mac = keyed.clone();
    mac.update(data);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&tag);
    out
}

/// One-shot HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> StoreResult<[u8; 32]> {
    let keyed = hmac_sha256_keyed(key)?;
    Ok(hmac_sha256_with(&keyed, data))
}
