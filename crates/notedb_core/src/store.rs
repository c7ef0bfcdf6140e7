//! The store handle.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::stats::{StatsSnapshot, StoreStat, StoreStats};
use crate::subscription::Subscriptions;
use crate::txn::{self, Transaction};
use nostrdb::Ndb;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by every clone of a [`Store`] and its transactions.
pub(crate) struct Shared {
    /// Process-unique id, keys the per-thread snapshot cache.
    pub(crate) id: u64,
    pub(crate) config: Config,
    /// Read-locked by `begin()`, write-locked for the whole of close.
    pub(crate) gate: RwLock<()>,
    /// Cleared by close. Shared with the per-thread caches.
    pub(crate) open: Arc<AtomicBool>,
    engine: RwLock<Option<Ndb>>,
    /// Open transactions.
    pub(crate) readers: AtomicUsize,
    pub(crate) subscriptions: Subscriptions,
    pub(crate) stats: StoreStats,
}

impl Shared {
    /// Returns a handle to the engine, or `Closed` once the store is closed.
    pub(crate) fn engine(&self) -> StoreResult<Ndb> {
        self.engine.read().clone().ok_or(StoreError::Closed)
    }
}

struct StoreInner {
    shared: Arc<Shared>,
    path: PathBuf,
    /// Holds the directory lock until close.
    dir: Mutex<Option<StoreDir>>,
}

impl StoreInner {
    fn close(&self) -> StoreResult<()> {
        let shared = &self.shared;
        let _gate = shared.gate.write();
        if !shared.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(ndb) = shared.engine.write().take() {
            shared.subscriptions.release_all(ndb);
        }
        self.dir.lock().take();
        txn::forget_store(shared.id);

        info!(path = %self.path.display(), "closed note store");
        Ok(())
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Handle to an open note store.
///
/// Cloning is cheap; every clone refers to the same store. The store is
/// closed by [`Store::close`] or when the last clone is dropped.
///
/// ```rust,ignore
/// use notedb_core::{Config, Store};
///
/// let store = Store::open("notes", Config::default())?;
/// store.ingest_one(r#"{"id":"…","pubkey":"…","created_at":1,"kind":1,"tags":[],"content":"gm","sig":"…"}"#, None)?;
///
/// let txn = store.begin_with_retry(3, Duration::from_millis(10))?;
/// for json in txn.query(r#"{"kinds":[1],"limit":20}"#)? {
///     println!("{json}");
/// }
/// txn.end();
/// store.close()?;
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens or creates a store in `path`.
    ///
    /// Takes an exclusive lock on the directory and starts the engine with
    /// its ingester threads.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the options are invalid, the
    /// directory is inaccessible or locked, or the engine fails to start.
    pub fn open(path: impl AsRef<Path>, config: Config) -> StoreResult<Self> {
        let path = path.as_ref();
        Self::open_dir(path, config).map_err(|e| match e {
            StoreError::Open { .. } => e,
            other => StoreError::open(format!("{}: {other}", path.display())),
        })
    }

    fn open_dir(path: &Path, config: Config) -> StoreResult<Self> {
        config.validate()?;
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let ndb = Ndb::new(dir.engine_path()?, &config.engine_config())
            .map_err(|e| StoreError::open(format!("engine failed to start: {e}")))?;

        info!(
            path = %dir.path().display(),
            data_bytes = dir.data_bytes(),
            ingester_threads = config.ingester_threads,
            "opened note store"
        );

        let shared = Arc::new(Shared {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            config,
            gate: RwLock::new(()),
            open: Arc::new(AtomicBool::new(true)),
            engine: RwLock::new(Some(ndb)),
            readers: AtomicUsize::new(0),
            subscriptions: Subscriptions::new(),
            stats: StoreStats::new(),
        });

        Ok(Self {
            inner: Arc::new(StoreInner {
                shared,
                path: dir.path().to_path_buf(),
                dir: Mutex::new(Some(dir)),
            }),
        })
    }

    /// Closes the store.
    ///
    /// Live subscriptions are dropped, the engine is shut down once the last
    /// open transaction ends, and the directory lock is released.
    /// Idempotent. Operations afterwards fail with [`StoreError::Closed`].
    pub fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    /// Returns true until [`Store::close`] is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared().open.load(Ordering::Acquire)
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared().config
    }

    /// Opens a read transaction without waiting.
    ///
    /// # Errors
    ///
    /// Fails transiently with [`StoreError::Busy`] while the store is
    /// closing or the engine refuses a read transaction, and with
    /// [`StoreError::ReadersFull`] when every reader slot is taken.
    pub fn begin(&self) -> StoreResult<Transaction<'_>> {
        self.ensure_open()?;
        txn::begin(self.shared())
    }

    /// Opens a read transaction, retrying transient failures.
    ///
    /// Makes at most `max_attempts` attempts. The delay before attempt
    /// `i + 1` is [`crate::backoff_delay`]`(initial_backoff, i)`, so the
    /// total wait is bounded by the sum of that schedule.
    pub fn begin_with_retry(
        &self,
        max_attempts: u32,
        initial_backoff: Duration,
    ) -> StoreResult<Transaction<'_>> {
        self.ensure_open()?;
        txn::begin_with_retry(self.shared(), max_attempts, initial_backoff)
    }

    /// Opens a transaction with the default retry policy.
    pub(crate) fn begin_default(&self) -> StoreResult<Transaction<'_>> {
        self.begin_with_retry(txn::DEFAULT_RETRY_ATTEMPTS, txn::DEFAULT_RETRY_BACKOFF)
    }

    /// Returns the operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared().stats.snapshot()
    }

    /// Reports the store's footprint.
    pub fn stat(&self) -> StoreResult<StoreStat> {
        self.ensure_open()?;
        let data_bytes = self.inner.dir.lock().as_ref().map_or(0, StoreDir::data_bytes);
        Ok(StoreStat {
            data_bytes,
            subscriptions: self.subscription_count(),
            open_transactions: self.shared().readers.load(Ordering::Acquire),
        })
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    /// Returns a handle to the engine.
    pub(crate) fn ndb(&self) -> StoreResult<Ndb> {
        self.shared().engine()
    }

    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}
