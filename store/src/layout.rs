//! # Share Identifier Space
//!
//! The universe of share identifiers is `{1, ..., N}`. It is carved into
//! contiguous pools, one per partition *role*, sized by the configured
//! ratios and laid out in ratio order. Whatever is left at the tail is the
//! unassigned pool; it only ever holds garbage.
//!
//! ```text
//!   1                 r0*N              (r0+r1)*N               N
//!   |---- role 0 -----|------ role 1 -----|----- unassigned -----|
//! ```
//!
//! The layout is public. What stays secret is which role (if any) a given
//! partition key occupies, and which `t` identifiers inside that pool the
//! password selects. Pools are plain `Range<u32>` values: nothing of size
//! `N` is ever materialized here.

use std::ops::Range;

use crate::config::{MAX_ID_SPACE_SIZE, RATIO_EPSILON};
use crate::error::{StoreError, StoreResult};

/// Every identifier of an `n`-sized space, in ascending order.
pub fn all_identifiers(n: u32) -> Range<u32> {
    1..n.saturating_add(1)
}

/// `n` must lie in `1..=MAX_ID_SPACE_SIZE`.
pub fn validate_id_space(n: u32) -> StoreResult<()> {
    if n == 0 || n > MAX_ID_SPACE_SIZE {
        return Err(StoreError::IdSpaceTooLarge {
            size: n,
            max: MAX_ID_SPACE_SIZE,
        });
    }
    Ok(())
}

/// Each ratio finite and positive, at least one of them, summing to at most one.
pub fn validate_ratios(ratios: &[f64]) -> StoreResult<()> {
    if ratios.is_empty() {
        return Err(StoreError::InvalidRatioConfiguration(
            "at least one partition ratio is required".to_string(),
        ));
    }
    for (i, &r) in ratios.iter().enumerate() {
        if !r.is_finite() || r <= 0.0 {
            return Err(StoreError::InvalidRatioConfiguration(format!(
                "ratio {i} must be finite and > 0, got {r}"
            )));
        }
    }
    let sum: f64 = ratios.iter().sum();
    if sum > 1.0 + RATIO_EPSILON {
        return Err(StoreError::InvalidRatioConfiguration(format!(
            "ratios sum to {sum}, which exceeds 1"
        )));
    }
    Ok(())
}

/// The per-role pools of one identifier space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdLayout {
    size: u32,
    pools: Vec<Range<u32>>,
}

impl IdLayout {
    /// Lay out `n` identifiers according to `ratios`.
    ///
    /// Pool `i` gets `floor(ratios[i] * n)` identifiers, clamped so the
    /// pools never run past `n` even when the ratios sum to exactly one.
    pub fn new(n: u32, ratios: &[f64]) -> StoreResult<Self> {
        validate_id_space(n)?;
        validate_ratios(ratios)?;

        let mut pools = Vec::with_capacity(ratios.len());
        let mut start = 1u32;
        let end_of_space = n + 1;
        for &ratio in ratios {
            let len = ((ratio * n as f64).floor() as u32).min(end_of_space - start);
            pools.push(start..start + len);
            start += len;
        }

        Ok(Self { size: n, pools })
    }

    /// Number of identifiers in the whole space.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of roles (and hence the maximum number of partitions).
    pub fn role_count(&self) -> usize {
        self.pools.len()
    }

    /// The identifier range of `role`, or `None` if the role does not exist.
    pub fn pool(&self, role: usize) -> Option<Range<u32>> {
        self.pools.get(role).cloned()
    }

    /// The smallest pool, which bounds the usable threshold.
    pub fn smallest_pool(&self) -> u32 {
        self.pools.iter().map(|p| p.len() as u32).min().unwrap_or(0)
    }

    /// Identifiers belonging to no role.
    pub fn unassigned(&self) -> Range<u32> {
        let start = self.pools.last().map_or(1, |p| p.end);
        start..self.size + 1
    }

    /// The role whose pool contains `id`, if any.
    pub fn role_of(&self, id: u32) -> Option<usize> {
        self.pools.iter().position(|p| p.contains(&id))
    }
}
