//! # Store Configuration & Constants
//!
//! Every magic number in Veil lives here. If you're hardcoding a constant
//! somewhere else, move it here instead.
//!
//! Most of these values are baked into every store file ever written.
//! Changing `CHUNK_SIZE` or a domain-separation context after stores exist
//! means those stores can no longer be opened, so treat this file as a wire
//! format definition, not a tuning knob.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::layout::{validate_id_space, validate_ratios};

// ---------------------------------------------------------------------------
// Store Format
// ---------------------------------------------------------------------------

/// Version of the persisted JSON layout. Bump on any incompatible change.
pub const STORE_FORMAT_VERSION: u16 = 1;

/// Length of the store-wide salt in bytes.
pub const SALT_LENGTH: usize = 32;

/// Payload bytes carried by one chunk. 31 bytes is the largest whole-byte
/// width that always stays below the field modulus (P > 2^255).
pub const CHUNK_SIZE: usize = 31;

/// Size of the frame header prepended by the document codec:
/// 1 format tag byte + 4 length bytes.
pub const FRAME_HEADER_LENGTH: usize = 5;

// ---------------------------------------------------------------------------
// Identifier Space
// ---------------------------------------------------------------------------

/// Upper bound on the identifier space. Every chunk stores one share per
/// identifier, so this also caps the width of a share row.
pub const MAX_ID_SPACE_SIZE: u32 = 500_000;

/// Default identifier space for new stores.
pub const DEFAULT_ID_SPACE_SIZE: u32 = 10_000;

/// Default reconstruction threshold.
pub const DEFAULT_THRESHOLD: u32 = 3;

/// Default per-role pool fractions. The remaining 30% is the unassigned pool.
pub const DEFAULT_PARTITION_RATIOS: [f64; 2] = [0.35, 0.35];

/// Fraction of a pool that Stage 1 keeps as candidates. Below one, so the
/// partition key narrows the public pool to a key-specific subset.
pub const DEFAULT_CANDIDATE_RATIO: f64 = 0.5;

/// Slack allowed when checking that ratios sum to at most one.
pub const RATIO_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Domain Separation
// ---------------------------------------------------------------------------

/// BLAKE3 derive-key context for the Stage 1 seed.
pub const STAGE1_SEED_CONTEXT: &str = "veil 2026-10 stage1 partition seed";

/// BLAKE3 derive-key context for the digest of an ordered Stage 1 list,
/// mixed into every Stage 2 score.
pub const CANDIDATE_BINDING_CONTEXT: &str = "veil 2026-10 stage2 candidate binding";

/// BLAKE3 derive-key context for partition tags in `chunk_counts`.
pub const PARTITION_TAG_CONTEXT: &str = "veil 2026-10 partition tag";

/// BLAKE3 derive-key context for the preferred role of a partition key.
pub const ROLE_PREFERENCE_CONTEXT: &str = "veil 2026-10 role preference";

/// Length of the Stage 2 key derived from the password.
pub const STAGE2_KEY_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Password KDF
// ---------------------------------------------------------------------------

/// Argon2id memory cost in KiB (19 MiB, the OWASP baseline).
pub const DEFAULT_KDF_MEMORY_KIB: u32 = 19_456;

/// Argon2id pass count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 2;

/// Argon2id lanes.
pub const DEFAULT_KDF_PARALLELISM: u32 = 1;

/// Argon2id cost parameters. Persisted in store metadata so decryption
/// reproduces the exact Stage 2 key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_KDF_MEMORY_KIB,
            iterations: DEFAULT_KDF_ITERATIONS,
            parallelism: DEFAULT_KDF_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// Cheapest parameters Argon2 accepts. Only meant for tests and benches.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Parameters for creating a new store.
///
/// Decryption and update never consult a `StoreConfig`; they read the same
/// values back out of the store's metadata. Fields missing from a
/// serialized config take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Minimum number of shares needed to rebuild a chunk.
    pub threshold: u32,
    /// Number of identifiers `N`; every chunk stores exactly `N` shares.
    pub id_space_size: u32,
    /// Fraction of `N` given to each partition role.
    pub partition_ratios: Vec<f64>,
    /// Fraction of a role's pool that Stage 1 keeps.
    pub candidate_ratio: f64,
    /// Password KDF cost.
    pub kdf: KdfParams,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            id_space_size: DEFAULT_ID_SPACE_SIZE,
            partition_ratios: DEFAULT_PARTITION_RATIOS.to_vec(),
            candidate_ratio: DEFAULT_CANDIDATE_RATIO,
            kdf: KdfParams::default(),
        }
    }
}

impl StoreConfig {
    /// Validate every field. Called by [`crate::CryptoStore::new`].
    pub fn validate(&self) -> StoreResult<()> {
        if self.threshold < 1 {
            return Err(StoreError::InvalidThreshold(format!(
                "threshold must be >= 1, got {}",
                self.threshold
            )));
        }
        validate_id_space(self.id_space_size)?;
        validate_ratios(&self.partition_ratios)?;
        validate_candidate_ratio(self.candidate_ratio)?;
        validate_kdf(&self.kdf)
    }
}

/// The Stage 1 ratio must lie in `(0, 1]`.
pub fn validate_candidate_ratio(ratio: f64) -> StoreResult<()> {
    if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
        return Err(StoreError::InvalidRatioConfiguration(format!(
            "candidate ratio must be in (0, 1], got {ratio}"
        )));
    }
    Ok(())
}

/// Reject KDF parameters Argon2 would refuse, before any work is done.
pub fn validate_kdf(params: &KdfParams) -> StoreResult<()> {
    argon2::Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(STAGE2_KEY_LENGTH),
    )
    .map(|_| ())
    .map_err(|e| StoreError::KeyDerivation(e.to_string()))
}
