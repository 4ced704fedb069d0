//! # CryptoStore
//!
//! Orchestrates create, decrypt and update. Each is a pure transform: the
//! input store is never touched, and a new [`EncryptedStore`] exists only if
//! the whole operation completed.
//!
//! ## Share rows
//!
//! For every chunk index `c < chunk_total` the store holds exactly one share
//! per identifier in `1..=N`. For a partition with Stage 2 identifiers
//! `s_1..s_t`, row `c` carries real Shamir points of chunk `c` at those `t`
//! identifiers (for `c` below the partition's own chunk count). Every other
//! slot, including the rest of that partition's pool, the unassigned pool
//! and rows beyond the partition's length, holds a uniformly random field
//! element. With `t >= 2` a real point is itself uniform, so nothing short of
//! the right `(key, password)` pair separates the two.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use rayon::prelude::*;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cancel::CancelFlag;
use crate::codec::{self, Chunk, Document};
use crate::config::{StoreConfig, SALT_LENGTH, STORE_FORMAT_VERSION};
use crate::crypto::FieldElement;
use crate::error::{StoreError, StoreResult};
use crate::layout::{all_identifiers, IdLayout};
use crate::mapping::{
    assign_roles, candidate_ids, locate_partition, partition_tag, preferred_role,
    select_for_threshold,
};
use crate::sharing::{generate_shares, reconstruct, SharePoint};

use super::types::{EncryptedStore, Share, StoreMetadata};

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// One plaintext and the two secrets that protect it.
#[derive(Clone)]
pub struct Partition {
    /// Selects the candidate pool. Must differ between partitions.
    pub key: Vec<u8>,
    /// Selects the `t` identifiers within the pool.
    pub password: Zeroizing<Vec<u8>>,
    /// The plaintext.
    pub document: Document,
}

impl Partition {
    /// Bundle a partition for [`CryptoStore::create`].
    pub fn new(key: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>, document: Document) -> Self {
        Self {
            key: key.into(),
            password: Zeroizing::new(password.into()),
            document,
        }
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("key", &"<redacted>")
            .field("password", &"<redacted>")
            .field("document", &self.document.kind())
            .finish()
    }
}

/// A partition after mapping: where its shares go and what they encode.
struct PlacedPartition {
    role: usize,
    tag: String,
    selected: Vec<u32>,
    chunks: Vec<Chunk>,
}

// ---------------------------------------------------------------------------
// CryptoStore
// ---------------------------------------------------------------------------

/// Entry point for building and reading stores.
#[derive(Debug, Clone)]
pub struct CryptoStore {
    config: StoreConfig,
    cancel: CancelFlag,
}

impl CryptoStore {
    /// Build an engine for `config`.
    ///
    /// # Errors
    ///
    /// Any configuration error from [`StoreConfig::validate`].
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelFlag::new(),
        })
    }

    /// Poll `cancel` between chunks; once it is set, operations return
    /// [`StoreError::Cancelled`].
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The configuration new stores are created with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The flag this engine polls.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Encode every partition into one fresh store.
    ///
    /// # Errors
    ///
    /// - [`StoreError::OverlappingPartitions`] for duplicate keys.
    /// - [`StoreError::InvalidRatioConfiguration`] for more partitions than
    ///   roles.
    /// - [`StoreError::InvalidThreshold`] if a candidate pool is smaller
    ///   than the threshold.
    /// - [`StoreError::Cancelled`] if the cancel flag was raised.
    pub fn create(&self, partitions: &[Partition]) -> StoreResult<EncryptedStore> {
        let config = &self.config;
        let layout = IdLayout::new(config.id_space_size, &config.partition_ratios)?;
        self.check_candidate_pools(&layout, config.threshold)?;

        let keys: Vec<&[u8]> = partitions.iter().map(|p| p.key.as_slice()).collect();
        let roles = assign_roles(&keys, layout.role_count())?;

        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LENGTH];
        rng.fill_bytes(&mut salt);

        let mut placed = Vec::with_capacity(partitions.len());
        let mut claimed: HashSet<u32> = HashSet::new();
        for (partition, &role) in partitions.iter().zip(&roles) {
            self.cancel.check()?;
            let pool = layout
                .pool(role)
                .ok_or_else(|| StoreError::InvalidRatioConfiguration(format!("no pool for role {role}")))?;
            let candidates = candidate_ids(&partition.key, pool, config.candidate_ratio)?;
            if !candidates.iter().all(|id| claimed.insert(*id)) {
                return Err(StoreError::OverlappingPartitions);
            }
            let selected = select_for_threshold(
                &partition.password,
                &candidates,
                &salt,
                config.threshold,
                &config.kdf,
            )?;
            let chunks = codec::encode(&partition.document)?;
            debug!(
                candidates = candidates.len(),
                chunks = chunks.len(),
                kind = partition.document.kind(),
                "partition mapped"
            );
            placed.push(PlacedPartition {
                role,
                tag: partition_tag(&partition.key, role, &salt),
                selected,
                chunks,
            });
        }

        let chunk_total = placed.iter().map(|p| p.chunks.len()).max().unwrap_or(0) as u32;
        let real = real_share_plan(&placed);

        let rows = (0..chunk_total)
            .into_par_iter()
            .map(|c| {
                self.cancel.check()?;
                build_row(c, config.id_space_size, &real, config.threshold)
            })
            .collect::<StoreResult<Vec<Vec<Share>>>>()?;
        let mut shares: Vec<Share> = rows.into_iter().flatten().collect();
        shares.shuffle(&mut rng);

        let mut chunk_counts = BTreeMap::new();
        for role in 0..layout.role_count() {
            match placed.iter().find(|p| p.role == role) {
                Some(p) => chunk_counts.insert(p.tag.clone(), p.chunks.len() as u32),
                None => chunk_counts.insert(decoy_tag(&mut rng), rng.gen_range(0..=chunk_total)),
            };
        }

        info!(
            partitions = partitions.len(),
            chunk_total,
            id_space_size = config.id_space_size,
            shares = shares.len(),
            "store created"
        );

        Ok(EncryptedStore {
            metadata: StoreMetadata {
                format_version: STORE_FORMAT_VERSION,
                salt,
                threshold: config.threshold,
                id_space_size: config.id_space_size,
                partition_ratios: config.partition_ratios.clone(),
                candidate_ratio: config.candidate_ratio,
                kdf: config.kdf,
                chunk_total,
                chunk_counts,
                created_at: Utc::now(),
            },
            shares,
        })
    }

    /// Every role must yield at least `threshold` Stage 1 candidates, or
    /// some partition could not be placed there.
    fn check_candidate_pools(&self, layout: &IdLayout, threshold: u32) -> StoreResult<()> {
        let smallest = layout.smallest_pool();
        let candidates = (self.config.candidate_ratio * smallest as f64).floor() as u32;
        if candidates < threshold {
            return Err(StoreError::InvalidThreshold(format!(
                "threshold {threshold} exceeds the smallest candidate pool ({candidates})"
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Decrypt
    // -----------------------------------------------------------------------

    /// Recover the document stored under `(key, password)`.
    ///
    /// A key that matches no partition is treated like one that does, using
    /// its preferred role and the store's chunk total. Wrong credentials
    /// therefore come back as a garbage document or
    /// [`StoreError::MalformedDocument`], never as a distinct error.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ReconstructionFailed`] if a chunk has fewer than
    ///   `threshold` shares at the selected identifiers.
    /// - [`StoreError::MalformedDocument`] if the recovered bytes do not
    ///   decode.
    pub fn decrypt(
        &self,
        store: &EncryptedStore,
        key: &[u8],
        password: &[u8],
    ) -> StoreResult<Document> {
        let meta = &store.metadata;
        let layout = meta.layout()?;
        let (role, chunk_count) =
            locate_partition(key, &meta.salt, &meta.chunk_counts, layout.role_count())
                .unwrap_or_else(|| (preferred_role(key, layout.role_count()), meta.chunk_total));

        let selected = self.stage_ids(store, &layout, role, key, password)?;
        let position: HashMap<u32, usize> =
            selected.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        // rows[c][i] is the share of chunk c at selected[i].
        let mut rows: Vec<Vec<Option<FieldElement>>> =
            vec![vec![None; selected.len()]; chunk_count as usize];
        for share in &store.shares {
            if share.chunk_index >= chunk_count {
                continue;
            }
            if let Some(&i) = position.get(&share.share_id) {
                rows[share.chunk_index as usize][i] = Some(share.value);
            }
        }

        let threshold = meta.threshold;
        let recovered = rows
            .into_par_iter()
            .enumerate()
            .map(|(c, row)| {
                self.cancel.check()?;
                let points: Vec<SharePoint> = selected
                    .iter()
                    .zip(row)
                    .filter_map(|(&id, value)| value.map(|value| SharePoint { id, value }))
                    .collect();
                if points.len() < threshold as usize {
                    return Err(StoreError::ReconstructionFailed {
                        chunk_index: c as u32,
                        found: points.len(),
                        needed: threshold as usize,
                    });
                }
                Ok(reconstruct(&points, threshold)?.to_chunk())
            })
            .collect::<StoreResult<Vec<Option<Chunk>>>>()?;

        // Every chunk is rebuilt before any of them is judged.
        let chunks: Option<Vec<Chunk>> = recovered.into_iter().collect();
        let document = chunks
            .ok_or(StoreError::MalformedDocument)
            .and_then(|chunks| codec::decode(&chunks));

        debug!(chunks = chunk_count, ok = document.is_ok(), "decrypt finished");
        document
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Replace the document of one partition, leaving every share outside its
    /// candidate set untouched.
    ///
    /// The salt is store-wide and is kept, as is `created_at`. The row count
    /// only ever grows.
    ///
    /// # Errors
    ///
    /// - [`StoreError::StoreFormat`] if `store` fails validation.
    /// - [`StoreError::UnknownPartition`] if no tag matches `key`.
    /// - [`StoreError::Cancelled`] if the cancel flag was raised.
    pub fn update(
        &self,
        store: &EncryptedStore,
        key: &[u8],
        password: &[u8],
        document: &Document,
    ) -> StoreResult<EncryptedStore> {
        store.validate()?;
        let meta = &store.metadata;
        let layout = meta.layout()?;
        let (role, old_count) =
            locate_partition(key, &meta.salt, &meta.chunk_counts, layout.role_count())
                .ok_or(StoreError::UnknownPartition)?;

        let pool = layout
            .pool(role)
            .ok_or_else(|| StoreError::StoreFormat(format!("no pool for role {role}")))?;
        let candidates: HashSet<u32> = candidate_ids(key, pool, meta.candidate_ratio)?
            .into_iter()
            .collect();
        let selected = self.stage_ids(store, &layout, role, key, password)?;

        let chunks = codec::encode(document)?;
        let new_count = chunks.len() as u32;
        let old_total = meta.chunk_total;
        let new_total = old_total.max(new_count);

        let mut real: Vec<HashMap<u32, FieldElement>> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            self.cancel.check()?;
            let secret = FieldElement::from_chunk(chunk);
            let points = generate_shares(&secret, meta.threshold, &selected)?;
            real.push(points.into_iter().map(|p| (p.id, p.value)).collect());
        }

        let mut rng = rand::thread_rng();
        let mut rewritten = 0usize;
        let mut shares: Vec<Share> = store
            .shares
            .iter()
            .map(|share| {
                if !candidates.contains(&share.share_id) {
                    return *share;
                }
                rewritten += 1;
                let value = real
                    .get(share.chunk_index as usize)
                    .and_then(|row| row.get(&share.share_id))
                    .copied()
                    .unwrap_or_else(|| FieldElement::random(&mut rng));
                Share { value, ..*share }
            })
            .collect();

        for c in old_total..new_total {
            self.cancel.check()?;
            for id in all_identifiers(meta.id_space_size) {
                let value = real
                    .get(c as usize)
                    .and_then(|row| row.get(&id))
                    .copied()
                    .unwrap_or_else(|| FieldElement::random(&mut rng));
                shares.push(Share {
                    chunk_index: c,
                    share_id: id,
                    value,
                });
            }
        }
        shares.shuffle(&mut rng);

        let mut metadata = meta.clone();
        metadata.chunk_total = new_total;
        metadata
            .chunk_counts
            .insert(partition_tag(key, role, &meta.salt), new_count);

        info!(
            old_chunks = old_count,
            new_chunks = new_count,
            chunk_total = new_total,
            rewritten,
            "partition updated"
        );

        Ok(EncryptedStore { metadata, shares })
    }

    /// Stage 1 within the role's pool, then Stage 2 under the store's salt.
    fn stage_ids(
        &self,
        store: &EncryptedStore,
        layout: &IdLayout,
        role: usize,
        key: &[u8],
        password: &[u8],
    ) -> StoreResult<Vec<u32>> {
        let meta = &store.metadata;
        let pool = layout
            .pool(role)
            .ok_or_else(|| StoreError::StoreFormat(format!("no pool for role {role}")))?;
        let candidates = candidate_ids(key, pool, meta.candidate_ratio)?;
        select_for_threshold(password, &candidates, &meta.salt, meta.threshold, &meta.kdf)
    }
}

// ---------------------------------------------------------------------------
// Row Construction
// ---------------------------------------------------------------------------

/// For each partition, its chunks and the identifiers they are shared at.
struct RealShares<'a> {
    partitions: Vec<(&'a [u32], &'a [Chunk])>,
}

fn real_share_plan(placed: &[PlacedPartition]) -> RealShares<'_> {
    RealShares {
        partitions: placed
            .iter()
            .map(|p| (p.selected.as_slice(), p.chunks.as_slice()))
            .collect(),
    }
}

/// All `n` shares of chunk row `c`: real points where a partition has a
/// chunk at this index, random elements everywhere else.
fn build_row(c: u32, n: u32, real: &RealShares<'_>, threshold: u32) -> StoreResult<Vec<Share>> {
    let mut rng = rand::thread_rng();
    let mut values: Vec<FieldElement> = (0..n).map(|_| FieldElement::random(&mut rng)).collect();

    for (selected, chunks) in &real.partitions {
        if let Some(chunk) = chunks.get(c as usize) {
            let secret = FieldElement::from_chunk(chunk);
            for point in generate_shares(&secret, threshold, selected)? {
                values[(point.id - 1) as usize] = point.value;
            }
        }
    }

    Ok(values
        .into_iter()
        .zip(all_identifiers(n))
        .map(|(value, share_id)| Share {
            chunk_index: c,
            share_id,
            value,
        })
        .collect())
}

/// A random tag for a role no partition occupies.
fn decoy_tag<R: RngCore>(rng: &mut R) -> String {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
