//! # Cryptographic Primitives for Veil
//!
//! Everything the store needs below the level of "shares" and "partitions":
//!
//! - **GF(P)** arithmetic on the secp256k1 base field, via arkworks.
//! - **BLAKE3** in derive-key mode for everything keyed by a partition key.
//! - **HMAC-SHA256** as the Stage 2 PRF.
//! - **Argon2id** to stretch the password into the Stage 2 key.
//!
//! None of this is novel. Thin wrappers around audited crates, with the
//! store's domain-separation contexts applied in one place.

pub mod field;
pub mod hash;
pub mod kdf;

pub use field::{modulus, FieldElement};
pub use hash::{blake3_hash, domain_separated_hash, hmac_sha256};
pub use kdf::derive_key;
