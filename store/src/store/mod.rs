//! # Store Module
//!
//! The persisted share store and the engine that builds, reads and rewrites
//! it.
//!
//! ```text
//! types.rs   — Share, StoreMetadata, EncryptedStore, load-time validation
//! engine.rs  — CryptoStore: create / decrypt / update
//! shared.rs  — SharedStore: one writer, many readers, snapshot swaps
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Document → codec → chunks → sharing (at Stage 2 ids) ─┐
//!                                      random filler ───┴→ rows → shuffle → EncryptedStore
//! ```
//!
//! Decryption runs the same mapping forward from the caller's secrets and
//! reads only the `t` identifiers it lands on. The store itself never says
//! which identifiers those are.

pub mod engine;
pub mod shared;
pub mod types;

pub use engine::{CryptoStore, Partition};
pub use shared::SharedStore;
pub use types::{EncryptedStore, Share, StoreMetadata};
