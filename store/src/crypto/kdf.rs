//! Password-to-key derivation for Stage 2.
//!
//! Argon2id, version 0x13, with cost parameters persisted in the store
//! metadata. The derived key only ever lives inside a [`Zeroizing`] buffer.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::config::{KdfParams, STAGE2_KEY_LENGTH};
use crate::error::{StoreError, StoreResult};

/// Derive the 32-byte Stage 2 key from a password and the store salt.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> StoreResult<Zeroizing<[u8; STAGE2_KEY_LENGTH]>> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(STAGE2_KEY_LENGTH),
    )
    .map_err(|e| StoreError::KeyDerivation(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; STAGE2_KEY_LENGTH]);
    argon
        .hash_password_into(password, salt, key.as_mut_slice())
        .map_err(|e| StoreError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
