//! Single-writer, many-reader access to a store snapshot.
//!
//! Readers take an `Arc` clone of the current snapshot and decrypt from it
//! without holding any lock. Writers queue on a mutex, build the replacement
//! store from the snapshot they observed, and swap it in only on success.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::codec::Document;
use crate::error::StoreResult;

use super::engine::CryptoStore;
use super::types::EncryptedStore;

/// A store shared between threads.
#[derive(Debug)]
pub struct SharedStore {
    engine: CryptoStore,
    current: RwLock<Arc<EncryptedStore>>,
    writer: Mutex<()>,
}

impl SharedStore {
    /// Wrap an existing store.
    pub fn new(engine: CryptoStore, store: EncryptedStore) -> Self {
        Self {
            engine,
            current: RwLock::new(Arc::new(store)),
            writer: Mutex::new(()),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<EncryptedStore> {
        Arc::clone(&self.current.read())
    }

    /// Decrypt against the current snapshot.
    pub fn decrypt(&self, key: &[u8], password: &[u8]) -> StoreResult<Document> {
        let snapshot = self.snapshot();
        self.engine.decrypt(&snapshot, key, password)
    }

    /// Rewrite one partition. Concurrent updates run one at a time, each
    /// starting from the result of the previous one.
    pub fn update(
        &self,
        key: &[u8],
        password: &[u8],
        document: &Document,
    ) -> StoreResult<Arc<EncryptedStore>> {
        let _writer = self.writer.lock();
        let base = self.snapshot();
        let next = Arc::new(self.engine.update(&base, key, password, document)?);
        *self.current.write() = Arc::clone(&next);
        Ok(next)
    }

    /// Unwrap the latest snapshot.
    pub fn into_inner(self) -> Arc<EncryptedStore> {
        self.current.into_inner()
    }
}
