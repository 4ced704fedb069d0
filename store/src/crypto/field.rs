//! # Prime Field Arithmetic
//!
//! Every share value, polynomial coefficient and chunk secret in Veil is an
//! element of the prime field GF(P) with
//!
//! ```text
//! P = 2^256 - 2^32 - 977
//! ```
//!
//! which is the secp256k1 base field. We borrow the arkworks implementation
//! (`ark-secp256k1` on top of `ark-ff`) instead of writing our own modular
//! arithmetic: Montgomery multiplication over four fixed limbs, no
//! allocation, no operand-dependent loop counts.
//!
//! ## Why this prime?
//!
//! `P > 2^255`, so any 31-byte chunk is already a canonical field element
//! and encoding never needs reduction. And it's a field everyone has already
//! audited to death.
//!
//! ## Inversion
//!
//! arkworks' `Field::inverse` runs a binary extended GCD whose iteration
//! count depends on the operand. We invert with Fermat's little theorem
//! instead (`x^(P-2)`): square-and-multiply over a fixed, public exponent.
//! The only secret-dependent branch left is the zero check that produces
//! [`StoreError::DivisionByZero`].

use std::fmt;
use std::ops::Neg;

use ark_ff::{BigInteger, Field, PrimeField};
use ark_secp256k1::Fq;
use ark_std::{rand::Rng, One, UniformRand, Zero};
use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::config::CHUNK_SIZE;
use crate::error::{StoreError, StoreResult};

/// Width of a canonical big-endian field element encoding.
pub const FIELD_BYTES: usize = 32;

/// An element of GF(P).
///
/// Serializes as a base-10 string so store files stay readable by any JSON
/// tooling without 256-bit integer support.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldElement(Fq);

impl FieldElement {
    /// The additive identity.
    pub fn zero() -> Self {
        Self(Fq::zero())
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Self(Fq::one())
    }

    /// Embed a small integer (share identifiers, mostly).
    pub fn from_u64(value: u64) -> Self {
        Self(Fq::from(value))
    }

    /// Sample a uniformly random element.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(Fq::rand(rng))
    }

    /// `true` if this is the zero element.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Field addition.
    pub fn add(&self, rhs: &Self) -> Self {
        Self(self.0 + rhs.0)
    }

    /// Field subtraction.
    pub fn sub(&self, rhs: &Self) -> Self {
        Self(self.0 - rhs.0)
    }

    /// Field multiplication.
    pub fn mul(&self, rhs: &Self) -> Self {
        Self(self.0 * rhs.0)
    }

    /// Raise to a power given as little-endian 64-bit limbs.
    pub fn pow_mod(&self, exponent: &[u64]) -> Self {
        Self(self.0.pow(exponent))
    }

    /// Multiplicative inverse via `x^(P-2)`.
    pub fn inverse(&self) -> StoreResult<Self> {
        if self.0.is_zero() {
            return Err(StoreError::DivisionByZero);
        }
        let mut exponent = Fq::MODULUS;
        exponent.sub_with_borrow(&<Fq as PrimeField>::BigInt::from(2u64));
        Ok(self.pow_mod(exponent.as_ref()))
    }

    /// Interpret a chunk as a big-endian integer. Always canonical since
    /// `CHUNK_SIZE * 8 < 255`.
    pub fn from_chunk(chunk: &[u8; CHUNK_SIZE]) -> Self {
        Self(Fq::from_be_bytes_mod_order(chunk))
    }

    /// Recover a chunk, or `None` if the value does not fit in
    /// `CHUNK_SIZE` bytes (which is what garbage usually looks like).
    pub fn to_chunk(&self) -> Option<[u8; CHUNK_SIZE]> {
        let bytes = self.to_bytes_be();
        let (head, tail) = bytes.split_at(FIELD_BYTES - CHUNK_SIZE);
        if head.iter().any(|&b| b != 0) {
            return None;
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        chunk.copy_from_slice(tail);
        Some(chunk)
    }

    /// Canonical 32-byte big-endian encoding.
    pub fn to_bytes_be(&self) -> [u8; FIELD_BYTES] {
        let raw = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; FIELD_BYTES];
        out[FIELD_BYTES - raw.len()..].copy_from_slice(&raw);
        out
    }

    /// Parse a canonical base-10 representation. Values `>= P` are
    /// rejected rather than silently reduced.
    pub fn from_decimal(s: &str) -> Option<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = BigUint::parse_bytes(s.as_bytes(), 10)?;
        if value >= modulus() {
            return None;
        }
        Some(Self(Fq::from_be_bytes_mod_order(&value.to_bytes_be())))
    }

    /// Base-10 representation.
    pub fn to_decimal(&self) -> String {
        BigUint::from_bytes_be(&self.to_bytes_be()).to_str_radix(10)
    }
}

/// The field modulus as an arbitrary-precision integer.
pub fn modulus() -> BigUint {
    BigUint::from_bytes_be(&Fq::MODULUS.to_bytes_be())
}

impl Neg for FieldElement {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_decimal())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FieldElement::from_decimal(&s)
            .ok_or_else(|| de::Error::custom("field element is not a canonical decimal below P"))
    }
}
