//! # Two-Stage Identifier Mapping
//!
//! Turns a partition's secrets into the `t` share identifiers its document
//! lives at. Nothing here is ever persisted: decryption recomputes the same
//! identifiers from the same inputs.
//!
//! ## Stage 1: partition key → candidates
//!
//! `seed = BLAKE3-derive-key(key)`, then every identifier in the role's pool
//! is scored with `BLAKE3(seed ‖ id_be32)`. The `floor(ratio · |pool|)`
//! lowest scores win, ties broken by identifier. A bounded max-heap keeps
//! memory proportional to what is selected, not to the pool.
//!
//! ## Stage 2: password → the `t` identifiers
//!
//! The password is stretched with Argon2id under the store salt, and the key
//! scores each candidate with `HMAC-SHA256(key, binding ‖ id_be32)`, where
//! `binding` is a BLAKE3 digest of the ordered Stage 1 list. Ascending order,
//! first `t`. The order matters: reconstruction consumes points in exactly
//! this order.
//!
//! Pools are public, so without the binding a wrong partition key that lands
//! in the right pool would rank the same identifiers as the real one. With it,
//! any other candidate list (a different key, or the same ids in a different
//! order) gives an unrelated ranking, and the password is useless without
//! the key.
//!
//! ## Roles and tags
//!
//! A partition occupies one pool ("role"). The role is picked at create time
//! from a hash of the key, probing forward past roles already taken. It is
//! never written down directly; instead the store's `chunk_counts` is keyed
//! by `tag(key, role, salt)`, and the holder of the key finds their role by
//! recomputing the tag for each role in turn.

use std::collections::{BTreeMap, BinaryHeap};

use rayon::prelude::*;

use crate::config::{
    validate_candidate_ratio, KdfParams, CANDIDATE_BINDING_CONTEXT, PARTITION_TAG_CONTEXT,
    ROLE_PREFERENCE_CONTEXT, STAGE1_SEED_CONTEXT,
};
use crate::crypto::hash::{
    blake3_hash_multi, domain_separated_hash, domain_separated_hash_parts, hmac_sha256_keyed,
    hmac_sha256_with,
};
use crate::crypto::kdf::derive_key;
use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Stage 1
// ---------------------------------------------------------------------------

/// Score of `id` under a Stage 1 seed.
fn stage1_score(seed: &[u8; 32], id: u32) -> [u8; 32] {
    blake3_hash_multi(&[seed.as_slice(), id.to_be_bytes().as_slice()])
}

/// Deterministically pick `floor(ratio · |ids|)` identifiers for a
/// partition key, ordered by ascending score.
///
/// # Errors
///
/// [`StoreError::InvalidRatioConfiguration`] if `ratio` is outside `(0, 1]`.
pub fn candidate_ids<I>(partition_key: &[u8], ids: I, ratio: f64) -> StoreResult<Vec<u32>>
where
    I: IntoIterator<Item = u32>,
    I::IntoIter: ExactSizeIterator,
{
    validate_candidate_ratio(ratio)?;
    let ids = ids.into_iter();
    let keep = (ratio * ids.len() as f64).floor() as usize;
    if keep == 0 {
        return Ok(Vec::new());
    }

    let seed = domain_separated_hash(STAGE1_SEED_CONTEXT, partition_key);

    // Max-heap on (score, id): the root is the worst entry still kept.
    let mut heap: BinaryHeap<([u8; 32], u32)> = BinaryHeap::with_capacity(keep + 1);
    for id in ids {
        let entry = (stage1_score(&seed, id), id);
        if heap.len() < keep {
            heap.push(entry);
        } else if heap.peek().is_some_and(|worst| entry < *worst) {
            heap.pop();
            heap.push(entry);
        }
    }

    Ok(heap.into_sorted_vec().into_iter().map(|(_, id)| id).collect())
}

// ---------------------------------------------------------------------------
// Stage 2
// ---------------------------------------------------------------------------

/// Digest of an ordered candidate list. Stage 2 mixes it into every score.
fn candidate_binding(candidates: &[u32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(CANDIDATE_BINDING_CONTEXT);
    hasher.update(&(candidates.len() as u64).to_be_bytes());
    for id in candidates {
        hasher.update(&id.to_be_bytes());
    }
    *hasher.finalize().as_bytes()
}

/// Rank `candidates` under the password and return the first `threshold`.
///
/// Scores depend on the whole ordered list, not only on each identifier, so
/// the same password ranks a reordered or different list differently.
///
/// # Errors
///
/// - [`StoreError::InvalidThreshold`] if `threshold` is zero or exceeds the
///   number of candidates.
/// - [`StoreError::KeyDerivation`] if Argon2 rejects the parameters.
pub fn select_for_threshold(
    password: &[u8],
    candidates: &[u32],
    salt: &[u8],
    threshold: u32,
    kdf: &KdfParams,
) -> StoreResult<Vec<u32>> {
    let needed = threshold as usize;
    if needed == 0 || needed > candidates.len() {
        return Err(StoreError::InvalidThreshold(format!(
            "threshold {threshold} cannot be drawn from {} candidates",
            candidates.len()
        )));
    }

    let key = derive_key(password, salt, kdf)?;
    let keyed = hmac_sha256_keyed(key.as_slice())?;
    let binding = candidate_binding(candidates);

    let mut scored: Vec<([u8; 32], u32)> = candidates
        .par_iter()
        .map(|&id| {
            let mut message = [0u8; 36];
            message[..32].copy_from_slice(&binding);
            message[32..].copy_from_slice(&id.to_be_bytes());
            (hmac_sha256_with(&keyed, &message), id)
        })
        .collect();
    scored.sort_unstable();

    Ok(scored.into_iter().take(needed).map(|(_, id)| id).collect())
}

// ---------------------------------------------------------------------------
// Roles & Tags
// ---------------------------------------------------------------------------

/// The role a partition key would like to occupy.
pub fn preferred_role(partition_key: &[u8], role_count: usize) -> usize {
    if role_count == 0 {
        return 0;
    }
    let digest = domain_separated_hash(ROLE_PREFERENCE_CONTEXT, partition_key);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % role_count as u64) as usize
}

/// Give every key its own role: the preferred one, or the next free one
/// after it (wrapping).
///
/// # Errors
///
/// - [`StoreError::OverlappingPartitions`] if a key appears twice.
/// - [`StoreError::InvalidRatioConfiguration`] if there are more keys than
///   roles.
pub fn assign_roles(partition_keys: &[&[u8]], role_count: usize) -> StoreResult<Vec<usize>> {
    for (i, key) in partition_keys.iter().enumerate() {
        if partition_keys[..i].contains(key) {
            return Err(StoreError::OverlappingPartitions);
        }
    }
    if partition_keys.len() > role_count {
        return Err(StoreError::InvalidRatioConfiguration(format!(
            "{} partitions but only {role_count} partition ratios",
            partition_keys.len()
        )));
    }

    let mut taken = vec![false; role_count];
    let mut roles = Vec::with_capacity(partition_keys.len());
    for key in partition_keys {
        let start = preferred_role(key, role_count);
        let role = (0..role_count)
            .map(|step| (start + step) % role_count)
            .find(|&r| !taken[r])
            .ok_or(StoreError::OverlappingPartitions)?;
        taken[role] = true;
        roles.push(role);
    }
    Ok(roles)
}

/// Opaque `chunk_counts` key binding a partition key to a role in one store.
pub fn partition_tag(partition_key: &[u8], role: usize, salt: &[u8]) -> String {
    let role_bytes = (role as u32).to_be_bytes();
    hex::encode(domain_separated_hash_parts(
        PARTITION_TAG_CONTEXT,
        &[partition_key, role_bytes.as_slice(), salt],
    ))
}

/// Find the role and chunk count recorded for `partition_key`.
///
/// Every role's tag is computed before looking at the map, so the work done
/// does not depend on which role (if any) matches.
pub fn locate_partition(
    partition_key: &[u8],
    salt: &[u8],
    chunk_counts: &BTreeMap<String, u32>,
    role_count: usize,
) -> Option<(usize, u32)> {
    let tags: Vec<String> = (0..role_count)
        .map(|role| partition_tag(partition_key, role, salt))
        .collect();
    let mut found = None;
    for (role, tag) in tags.iter().enumerate() {
        if let Some(&count) = chunk_counts.get(tag) {
            found = found.or(Some((role, count)));
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{all_identifiers, IdLayout};

    const SALT: [u8; 32] = [0x5A; 32];

    fn fast() -> KdfParams {
        KdfParams::insecure_fast()
    }

    #[test]
    fn test_stage1_is_deterministic() {
        let a = candidate_ids(b"alice", all_identifiers(1000), 0.3).unwrap();
        let b = candidate_ids(b"alice", all_identifiers(1000), 0.3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 300);
    }

    #[test]
    fn test_stage1_matches_full_sort() {
        let seed = domain_separated_hash(STAGE1_SEED_CONTEXT, b"k");
        let mut all: Vec<([u8; 32], u32)> = all_identifiers(500)
            .map(|id| (stage1_score(&seed, id), id))
            .collect();
        all.sort();
        let expected: Vec<u32> = all.iter().take(125).map(|&(_, id)| id).collect();

        assert_eq!(candidate_ids(b"k", all_identifiers(500), 0.25).unwrap(), expected);
    }

    #[test]
    fn test_stage1_depends_on_key() {
        let a = candidate_ids(b"alice", all_identifiers(1000), 0.1).unwrap();
        let b = candidate_ids(b"bob", all_identifiers(1000), 0.1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stage1_full_ratio_is_a_permutation() {
        let mut ids = candidate_ids(b"key", 100..200, 1.0).unwrap();
        ids.sort_unstable();
        assert_eq!(ids, (100..200).collect::<Vec<u32>>());
    }

    #[test]
    fn test_stage1_small_ratio_can_be_empty() {
        assert!(candidate_ids(b"key", all_identifiers(3), 0.1).unwrap().is_empty());
        assert!(candidate_ids(b"key", all_identifiers(3), 0.0).is_err());
    }

    #[test]
    fn test_stage2_is_deterministic() {
        let candidates: Vec<u32> = (1..=50).collect();
        let a = select_for_threshold(b"pw", &candidates, &SALT, 3, &fast()).unwrap();
        let b = select_for_threshold(b"pw", &candidates, &SALT, 3, &fast()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.iter().all(|id| candidates.contains(id)));
    }

    #[test]
    fn test_stage2_is_bound_to_candidate_order() {
        let candidates: Vec<u32> = (1..=200).collect();
        let reversed: Vec<u32> = candidates.iter().rev().copied().collect();
        let a = select_for_threshold(b"pw", &candidates, &SALT, 5, &fast()).unwrap();
        let b = select_for_threshold(b"pw", &reversed, &SALT, 5, &fast()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_password_other_key_same_pool_selects_elsewhere() {
        let layout = IdLayout::new(1000, &[0.35, 0.35]).unwrap();
        let pool = layout.pool(0).unwrap();
        let owner = candidate_ids(b"alice", pool.clone(), 1.0).unwrap();
        let expected = select_for_threshold(b"pw", &owner, &SALT, 3, &fast()).unwrap();

        for i in 0..20 {
            let key = format!("mallory-{i}");
            let other = candidate_ids(key.as_bytes(), pool.clone(), 1.0).unwrap();
            let picked = select_for_threshold(b"pw", &other, &SALT, 3, &fast()).unwrap();
            let mut a = picked.clone();
            let mut b = expected.clone();
            a.sort_unstable();
            b.sort_unstable();
            assert_ne!(a, b, "{key} selected the owner's identifiers");
        }
    }

    #[test]
    fn test_candidate_binding_covers_length_and_order() {
        assert_ne!(candidate_binding(&[1, 2]), candidate_binding(&[2, 1]));
        assert_ne!(candidate_binding(&[1, 2]), candidate_binding(&[1, 2, 3]));
        assert_eq!(candidate_binding(&[4, 5, 6]), candidate_binding(&[4, 5, 6]));
    }

    #[test]
    fn test_stage2_depends_on_password_and_salt() {
        let candidates: Vec<u32> = (1..=200).collect();
        let base = select_for_threshold(b"pw", &candidates, &SALT, 5, &fast()).unwrap();
        let other_pw = select_for_threshold(b"pw2", &candidates, &SALT, 5, &fast()).unwrap();
        let other_salt =
            select_for_threshold(b"pw", &candidates, &[0xA5; 32], 5, &fast()).unwrap();
        assert_ne!(base, other_pw);
        assert_ne!(base, other_salt);
    }

    #[test]
    fn test_stage2_threshold_bounds() {
        let candidates = [1u32, 2, 3];
        assert!(select_for_threshold(b"pw", &candidates, &SALT, 3, &fast()).is_ok());
        assert!(matches!(
            select_for_threshold(b"pw", &candidates, &SALT, 4, &fast()),
            Err(StoreError::InvalidThreshold(_))
        ));
        assert!(matches!(
            select_for_threshold(b"pw", &candidates, &SALT, 0, &fast()),
            Err(StoreError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_roles_are_distinct() {
        let keys: Vec<&[u8]> = vec![b"a".as_slice(), b"b".as_slice(), b"c".as_slice(), b"d".as_slice()];
        let mut roles = assign_roles(&keys, 4).unwrap();
        roles.sort_unstable();
        assert_eq!(roles, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_first_key_gets_preferred_role() {
        let roles = assign_roles(&[b"alice".as_slice(), b"bob".as_slice()], 2).unwrap();
        assert_eq!(roles[0], preferred_role(b"alice", 2));
        assert_ne!(roles[0], roles[1]);
    }

    #[test]
    fn test_role_assignment_errors() {
        assert!(matches!(
            assign_roles(&[b"a".as_slice(), b"a".as_slice()], 2),
            Err(StoreError::OverlappingPartitions)
        ));
        assert!(matches!(
            assign_roles(&[b"a".as_slice(), b"b".as_slice(), b"c".as_slice()], 2),
            Err(StoreError::InvalidRatioConfiguration(_))
        ));
    }

    #[test]
    fn test_tags_bind_key_role_and_salt() {
        let tag = partition_tag(b"alice", 0, &SALT);
        assert_eq!(tag.len(), 64);
        assert_ne!(tag, partition_tag(b"alice", 1, &SALT));
        assert_ne!(tag, partition_tag(b"bob", 0, &SALT));
        assert_ne!(tag, partition_tag(b"alice", 0, &[0u8; 32]));
    }

    #[test]
    fn test_locate_partition() {
        let mut counts = BTreeMap::new();
        counts.insert(partition_tag(b"alice", 1, &SALT), 4);
        counts.insert(hex::encode([9u8; 32]), 2);

        assert_eq!(locate_partition(b"alice", &SALT, &counts, 2), Some((1, 4)));
        assert_eq!(locate_partition(b"mallory", &SALT, &counts, 2), None);
    }

    #[test]
    fn test_candidates_from_distinct_pools_are_disjoint() {
        let layout = IdLayout::new(1000, &[0.35, 0.35]).unwrap();
        let a = candidate_ids(b"alice", layout.pool(0).unwrap(), 1.0).unwrap();
        let b = candidate_ids(b"bob", layout.pool(1).unwrap(), 1.0).unwrap();
        assert!(a.iter().all(|id| !b.contains(id)));
    }
}
