//! Open-once holder for a process's store.

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use parking_lot::RwLock;
use std::path::Path;
use tracing::debug;

/// Holds at most one open [`Store`].
///
/// For applications that open their store once at startup and hand it
/// out afterwards. Construct the slot explicitly and share it; it is not
/// a global.
#[derive(Debug, Default)]
pub struct StoreSlot {
    store: RwLock<Option<Store>>,
}

impl StoreSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the store unless one is already open.
    ///
    /// A second call while open succeeds without reopening and ignores its
    /// arguments.
    pub fn open(&self, path: impl AsRef<Path>, config: Config) -> StoreResult<Store> {
        let mut slot = self.store.write();
        if let Some(store) = slot.as_ref().filter(|s| s.is_open()) {
            debug!("store already open");
            return Ok(store.clone());
        }
        let store = Store::open(path, config)?;
        *slot = Some(store.clone());
        Ok(store)
    }

    /// Places an already open store in the slot.
    ///
    /// If the slot already holds an open store, that one is kept and
    /// returned.
    pub fn install(&self, store: Store) -> StoreResult<Store> {
        let mut slot = self.store.write();
        if let Some(existing) = slot.as_ref().filter(|s| s.is_open()) {
            return Ok(existing.clone());
        }
        *slot = Some(store.clone());
        Ok(store)
    }

    /// Closes and clears the slot. Does nothing if it is empty.
    pub fn close(&self) -> StoreResult<()> {
        match self.store.write().take() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    /// Returns the open store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if nothing is open.
    pub fn store(&self) -> StoreResult<Store> {
        self.store
            .read()
            .as_ref()
            .filter(|s| s.is_open())
            .cloned()
            .ok_or(StoreError::NotOpen)
    }

    /// Returns true if the slot holds an open store.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.store.read().as_ref().is_some_and(Store::is_open)
    }
}
