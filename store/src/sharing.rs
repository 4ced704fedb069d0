//! # Shamir's Secret Sharing over GF(P)
//!
//! Splits one field element (one document chunk) into points on a random
//! polynomial of degree `t - 1`, and recovers it again by Lagrange
//! interpolation at `x = 0`.
//!
//! ## Security Model
//!
//! - Coefficients come from `rand::thread_rng()`, a ChaCha CSPRNG seeded
//!   from the OS.
//! - Any `t - 1` points reveal nothing about the constant term.
//! - Identifiers are 1-based. `x = 0` *is* the secret, so a share at zero
//!   would hand it out in the clear; we refuse to make one.
//!
//! ## What reconstruction does not do
//!
//! It does not check that the points lie on a common polynomial of degree
//! `t - 1`. Hand it `t` unrelated values and it returns an unrelated field
//! element without complaint. The store relies on exactly that: a wrong
//! password picks the wrong points and gets garbage, not an error.
//!
//! ## Usage
//!
//! ```
//! use veil_store::crypto::FieldElement;
//! use veil_store::sharing::{generate_shares, reconstruct};
//!
//! let secret = FieldElement::from_u64(42);
//! let shares = generate_shares(&secret, 3, &[4, 8, 15, 16, 23]).unwrap();
//!
//! // Any 3 of the 5 points give the secret back.
//! let recovered = reconstruct(&shares[2..], 3).unwrap();
//! assert_eq!(recovered, secret);
//! ```

use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::FieldElement;
use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Public Types
// ---------------------------------------------------------------------------

/// One evaluation point `(x, f(x))` of a sharing polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePoint {
    /// The x-coordinate, a share identifier (never zero).
    pub id: u32,
    /// The polynomial evaluated at `id`.
    pub value: FieldElement,
}

// ---------------------------------------------------------------------------
// Split and Reconstruct
// ---------------------------------------------------------------------------

/// Split `secret` into one point per identifier, any `threshold` of which
/// recover it.
///
/// # Errors
///
/// - [`StoreError::InvalidThreshold`] if `threshold < 1`.
/// - [`StoreError::InvalidIdentifier`] if any identifier is zero.
pub fn generate_shares(
    secret: &FieldElement,
    threshold: u32,
    identifiers: &[u32],
) -> StoreResult<Vec<SharePoint>> {
    generate_shares_with_rng(secret, threshold, identifiers, &mut rand::thread_rng())
}

/// [`generate_shares`] with an explicit randomness source.
pub fn generate_shares_with_rng<R: Rng + ?Sized>(
    secret: &FieldElement,
    threshold: u32,
    identifiers: &[u32],
    rng: &mut R,
) -> StoreResult<Vec<SharePoint>> {
    if threshold < 1 {
        return Err(StoreError::InvalidThreshold(
            "threshold must be >= 1".to_string(),
        ));
    }
    if identifiers.contains(&0) {
        return Err(StoreError::InvalidIdentifier);
    }

    // [secret, c_1, ..., c_{t-1}]
    let mut coefficients = Vec::with_capacity(threshold as usize);
    coefficients.push(*secret);
    for _ in 1..threshold {
        coefficients.push(FieldElement::random(rng));
    }

    Ok(identifiers
        .iter()
        .map(|&id| SharePoint {
            id,
            value: eval_polynomial(&coefficients, &FieldElement::from_u64(id as u64)),
        })
        .collect())
}

/// Recover the secret from the first `threshold` points with distinct
/// identifiers, in the order given.
///
/// Later duplicates of an identifier are skipped, as is everything past the
/// first `threshold` distinct points.
///
/// # Errors
///
/// - [`StoreError::InvalidThreshold`] if `threshold < 1`.
/// - [`StoreError::InsufficientShares`] if fewer than `threshold` distinct
///   identifiers are present.
/// - [`StoreError::InvalidIdentifier`] if a selected identifier is zero.
pub fn reconstruct(shares: &[SharePoint], threshold: u32) -> StoreResult<FieldElement> {
    if threshold < 1 {
        return Err(StoreError::InvalidThreshold(
            "threshold must be >= 1".to_string(),
        ));
    }
    let needed = threshold as usize;

    let mut selected: Vec<SharePoint> = Vec::with_capacity(needed);
    for share in shares {
        if selected.len() == needed {
            break;
        }
        if selected.iter().any(|s| s.id == share.id) {
            continue;
        }
        selected.push(*share);
    }

    if selected.len() < needed {
        return Err(StoreError::InsufficientShares {
            needed,
            got: selected.len(),
        });
    }
    if selected.iter().any(|s| s.id == 0) {
        return Err(StoreError::InvalidIdentifier);
    }

    lagrange_interpolate_at_zero(&selected)
}

// ---------------------------------------------------------------------------
// Polynomial Helpers
// ---------------------------------------------------------------------------

/// Evaluate a polynomial at `x` using Horner's method. `coefficients[0]` is
/// the constant term.
fn eval_polynomial(coefficients: &[FieldElement], x: &FieldElement) -> FieldElement {
    coefficients
        .iter()
        .rev()
        .fold(FieldElement::zero(), |acc, c| acc.mul(x).add(c))
}

/// `sum_i y_i * prod_{j != i} x_j / (x_j - x_i)`.
///
/// The caller guarantees distinct non-zero identifiers, so every
/// denominator is invertible.
fn lagrange_interpolate_at_zero(points: &[SharePoint]) -> StoreResult<FieldElement> {
    let xs: Vec<FieldElement> = points
        .iter()
        .map(|p| FieldElement::from_u64(p.id as u64))
        .collect();

    let mut secret = FieldElement::zero();
    for (i, point) in points.iter().enumerate() {
        let mut numerator = FieldElement::one();
        let mut denominator = FieldElement::one();
        for (j, x_j) in xs.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = numerator.mul(x_j);
            denominator = denominator.mul(&x_j.sub(&xs[i]));
        }
        let basis = numerator.mul(&denominator.inverse()?);
        secret = secret.add(&point.value.mul(&basis));
    }
    Ok(secret)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> FieldElement {
        FieldElement::from_u64(v)
    }

    #[test]
    fn basic_2_of_3_split_and_reconstruct() {
        let secret = fe(0xDEAD_BEEF);
        let shares = generate_shares(&secret, 2, &[1, 2, 3]).unwrap();
        assert_eq!(shares.len(), 3);

        assert_eq!(reconstruct(&shares[..2], 2).unwrap(), secret);
        assert_eq!(reconstruct(&shares[1..], 2).unwrap(), secret);
        assert_eq!(reconstruct(&[shares[0], shares[2]], 2).unwrap(), secret);
    }

    #[test]
    fn threshold_3_of_5_all_combinations() {
        let mut rng = rand::thread_rng();
        let secret = FieldElement::random(&mut rng);
        let shares = generate_shares(&secret, 3, &[10, 200, 3_000, 40_000, 499_999]).unwrap();

        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = [shares[a], shares[b], shares[c]];
                    assert_eq!(
                        reconstruct(&subset, 3).unwrap(),
                        secret,
                        "failed for combo {:?}",
                        (a, b, c)
                    );
                }
            }
        }
    }

    #[test]
    fn threshold_one_is_a_constant_polynomial() {
        let secret = fe(7);
        let shares = generate_shares(&secret, 1, &[5, 9]).unwrap();
        assert!(shares.iter().all(|s| s.value == secret));
        assert_eq!(reconstruct(&shares[1..], 1).unwrap(), secret);
    }

    #[test]
    fn insufficient_points_produce_wrong_result() {
        let secret = fe(123_456);
        let shares = generate_shares(&secret, 3, &[1, 2, 3, 4, 5]).unwrap();
        // Interpolating a degree-2 polynomial through 2 points is a line.
        let recovered = reconstruct(&shares[..2], 2).unwrap();
        assert_ne!(recovered, secret);
    }

    #[test]
    fn extra_points_are_ignored() {
        let secret = fe(99);
        let mut shares = generate_shares(&secret, 2, &[1, 2]).unwrap();
        shares.push(SharePoint {
            id: 3,
            value: fe(1),
        });
        assert_eq!(reconstruct(&shares, 2).unwrap(), secret);
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let secret = fe(31337);
        let shares = generate_shares(&secret, 2, &[6, 7]).unwrap();
        let with_dup = [shares[0], shares[0], shares[1]];
        assert_eq!(reconstruct(&with_dup, 2).unwrap(), secret);
    }

    #[test]
    fn too_few_distinct_ids_rejected() {
        let shares = generate_shares(&fe(1), 3, &[1, 2]).unwrap();
        let with_dup = [shares[0], shares[0], shares[1]];
        assert!(matches!(
            reconstruct(&with_dup, 3),
            Err(StoreError::InsufficientShares { needed: 3, got: 2 })
        ));
    }

    #[test]
    fn zero_threshold_rejected() {
        assert!(matches!(
            generate_shares(&fe(1), 0, &[1, 2]),
            Err(StoreError::InvalidThreshold(_))
        ));
        assert!(matches!(
            reconstruct(&[], 0),
            Err(StoreError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn zero_identifier_rejected() {
        assert!(matches!(
            generate_shares(&fe(1), 2, &[0, 1]),
            Err(StoreError::InvalidIdentifier)
        ));
    }

    #[test]
    fn zero_and_max_chunk_secrets() {
        let max = FieldElement::from_chunk(&[0xFF; crate::config::CHUNK_SIZE]);
        for secret in [FieldElement::zero(), max] {
            let shares = generate_shares(&secret, 4, &[11, 12, 13, 14]).unwrap();
            assert_eq!(reconstruct(&shares, 4).unwrap(), secret);
        }
    }

    #[test]
    fn horner_matches_direct_evaluation() {
        // 3 + 2x + x^2 at x = 5 is 38.
        let coefficients = [fe(3), fe(2), fe(1)];
        assert_eq!(eval_polynomial(&coefficients, &fe(5)), fe(38));
    }
}
