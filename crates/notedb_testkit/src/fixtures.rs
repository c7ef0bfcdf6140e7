//! Temporary stores.

use notedb_core::{Config, NoteKey, Store};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Map size for test stores. Small enough for many stores side by side.
pub const TEST_MAP_SIZE: u64 = 256 * 1024 * 1024;

/// Returns the default test configuration.
pub fn test_config() -> Config {
    Config::new().map_size_bytes(TEST_MAP_SIZE)
}

/// A store in a temporary directory, removed on drop.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    config: Config,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates a store with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates a store with `config`.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open(Self::store_dir(&temp_dir), config.clone())
            .expect("Failed to open test store");
        Self {
            store,
            config,
            temp_dir,
        }
    }

    fn store_dir(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("store")
    }

    /// Returns the store directory.
    pub fn path(&self) -> PathBuf {
        Self::store_dir(&self.temp_dir)
    }

    /// Closes the store and opens the same directory again.
    pub fn reopen(self) -> Self {
        self.store.close().expect("Failed to close store");
        let store = Store::open(Self::store_dir(&self.temp_dir), self.config.clone())
            .expect("Failed to reopen store");
        Self {
            store,
            config: self.config,
            temp_dir: self.temp_dir,
        }
    }

    /// Ingests event JSON and waits until it is stored.
    pub fn put(&self, event_json: &str) -> NoteKey {
        self.store
            .ingest_one_sync(event_json, None)
            .expect("Failed to ingest event")
    }

    /// Like [`TestStore::put`], from a worker thread.
    ///
    /// Engine read transactions are per thread, so use this while the
    /// calling thread holds a transaction or a cached snapshot.
    pub fn put_on_worker(&self, event_json: &str) -> NoteKey {
        std::thread::scope(|scope| {
            scope
                .spawn(|| self.put(event_json))
                .join()
                .expect("Worker thread panicked")
        })
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::fmt::Debug for TestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestStore")
            .field("store", &self.store)
            .field("path", &self.path())
            .finish()
    }
}

/// Runs a test with a temporary store.
///
/// # Example
///
/// ```rust,ignore
/// use notedb_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         assert_eq!(store.stat().unwrap().subscriptions, 0);
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::new();
    f(&test_store.store)
}

/// Runs a test with a temporary store and its directory.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store, &Path) -> R,
{
    let test_store = TestStore::new();
    let path = test_store.path();
    f(&test_store.store, &path)
}
