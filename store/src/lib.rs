// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Veil — Core Library
//!
//! Veil keeps several unrelated documents in one pile of Shamir shares.
//! Each document is reachable only with its own partition key *and*
//! password; everyone else sees the same flat, shuffled list of field
//! elements, real and fake alike.
//!
//! ## Architecture
//!
//! - **crypto** — GF(P) arithmetic, BLAKE3/HMAC hashing, Argon2id.
//! - **sharing** — Shamir split and Lagrange reconstruction over GF(P).
//! - **layout** — The identifier space and its per-role pools.
//! - **mapping** — Stage 1 (key → candidates) and Stage 2 (password → `t` ids).
//! - **codec** — Documents to fixed-size chunks and back.
//! - **store** — The persisted format and the create/decrypt/update engine.
//! - **config** — Constants and `StoreConfig`.
//!
//! ## Design Philosophy
//!
//! 1. The mapping from secrets to identifiers is recomputed, never stored.
//! 2. A wrong password is not an error. It is just a different answer.
//! 3. Every share looks like every other share.
//! 4. Every operation returns a new store; nothing is patched in place.

pub mod cancel;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod layout;
pub mod mapping;
pub mod sharing;
pub mod store;

pub use cancel::CancelFlag;
pub use codec::Document;
pub use config::{KdfParams, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use store::{CryptoStore, EncryptedStore, Partition, Share, SharedStore, StoreMetadata};
