//! Store configuration.

use crate::error::{StoreError, StoreResult};
use crate::types::SubscriptionId;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked on an engine writer thread for each subscription that
/// received new keys.
pub type NotifyFn = Arc<dyn Fn(SubscriptionId) + Send + Sync>;

/// Configuration for opening a store.
#[derive(Clone)]
pub struct Config {
    /// Virtual address space reserved for the database map, in bytes.
    pub map_size_bytes: u64,

    /// Number of engine threads that parse and verify events.
    pub ingester_threads: usize,

    /// Skip id and signature verification on ingest.
    pub ingest_skip_validation: bool,

    /// Maximum number of concurrently open read transactions.
    pub max_readers: usize,

    /// Hard upper bound on the number of results a single query returns.
    pub query_result_cap: usize,

    /// Reuse a per-thread snapshot in `begin()` until it is invalidated.
    pub thread_snapshot_cache: bool,

    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// How long `ingest_one_sync` waits for the engine to store a note.
    pub sync_ingest_timeout: Duration,

    /// Optional new-match notification.
    pub notify: Option<NotifyFn>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_size_bytes: 8 * 1024 * 1024 * 1024, // 8 GiB
            ingester_threads: 1,
            ingest_skip_validation: false,
            max_readers: 126,
            query_result_cap: 256,
            thread_snapshot_cache: false,
            create_if_missing: true,
            sync_ingest_timeout: Duration::from_secs(5),
            notify: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("map_size_bytes", &self.map_size_bytes)
            .field("ingester_threads", &self.ingester_threads)
            .field("ingest_skip_validation", &self.ingest_skip_validation)
            .field("max_readers", &self.max_readers)
            .field("query_result_cap", &self.query_result_cap)
            .field("thread_snapshot_cache", &self.thread_snapshot_cache)
            .field("create_if_missing", &self.create_if_missing)
            .field("sync_ingest_timeout", &self.sync_ingest_timeout)
            .field("notify", &self.notify.is_some())
            .finish()
    }
}

/// Options object accepted by [`Config::from_options_json`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OptionsJson {
    mapsize: Option<i64>,
    ingester_threads: Option<i64>,
    writer_scratch_buffer_size: Option<i64>,
    ingest_skip_validation: Option<Value>,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from an options object such as
    /// `{"mapsize": 1073741824, "ingester_threads": 2}`.
    ///
    /// Non-positive sizes and counts keep their defaults. Unknown keys are
    /// ignored; an empty string yields the default configuration.
    pub fn from_options_json(json: &str) -> StoreResult<Self> {
        let mut config = Self::default();
        if json.trim().is_empty() {
            return Ok(config);
        }

        let opts: OptionsJson = serde_json::from_str(json)
            .map_err(|e| StoreError::open(format!("invalid options: {e}")))?;

        if let Some(size) = opts.mapsize.filter(|v| *v > 0) {
            config.map_size_bytes = size as u64;
        }
        if let Some(threads) = opts.ingester_threads.filter(|v| *v > 0) {
            config.ingester_threads = threads as usize;
        }
        // The engine sizes its own scratch buffers.
        let _ = opts.writer_scratch_buffer_size;
        match opts.ingest_skip_validation {
            Some(Value::Bool(b)) => config.ingest_skip_validation = b,
            Some(Value::Number(n)) => {
                config.ingest_skip_validation = n.as_i64().is_some_and(|v| v > 0);
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                return Err(StoreError::open(format!(
                    "invalid ingest_skip_validation: {other}"
                )))
            }
        }

        Ok(config)
    }

    /// Checks that the configuration can open a store.
    pub fn validate(&self) -> StoreResult<()> {
        if self.map_size_bytes == 0 {
            return Err(StoreError::open("map_size_bytes must be positive"));
        }
        if self.ingester_threads == 0 {
            return Err(StoreError::open("ingester_threads must be positive"));
        }
        if i32::try_from(self.ingester_threads).is_err() {
            return Err(StoreError::open("ingester_threads is out of range"));
        }
        if self.max_readers == 0 {
            return Err(StoreError::open("max_readers must be positive"));
        }
        Ok(())
    }

    /// Sets the database map size.
    #[must_use]
    pub const fn map_size_bytes(mut self, size: u64) -> Self {
        self.map_size_bytes = size;
        self
    }

    /// Sets the number of ingester threads.
    #[must_use]
    pub const fn ingester_threads(mut self, count: usize) -> Self {
        self.ingester_threads = count;
        self
    }

    /// Sets whether ids and signatures are verified on ingest.
    #[must_use]
    pub const fn ingest_skip_validation(mut self, value: bool) -> Self {
        self.ingest_skip_validation = value;
        self
    }

    /// Sets the reader slot count.
    #[must_use]
    pub const fn max_readers(mut self, count: usize) -> Self {
        self.max_readers = count;
        self
    }

    /// Sets the per-query result cap.
    #[must_use]
    pub const fn query_result_cap(mut self, cap: usize) -> Self {
        self.query_result_cap = cap;
        self
    }

    /// Sets whether `begin()` reuses a per-thread snapshot.
    #[must_use]
    pub const fn thread_snapshot_cache(mut self, value: bool) -> Self {
        self.thread_snapshot_cache = value;
        self
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets how long `ingest_one_sync` waits for a note to land.
    #[must_use]
    pub const fn sync_ingest_timeout(mut self, timeout: Duration) -> Self {
        self.sync_ingest_timeout = timeout;
        self
    }

    /// Registers a callback fired when a subscription gains new keys.
    #[must_use]
    pub fn notify<F>(mut self, f: F) -> Self
    where
        F: Fn(SubscriptionId) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(f));
        self
    }

    /// Translates the configuration into engine options.
    pub(crate) fn engine_config(&self) -> nostrdb::Config {
        let map_size = usize::try_from(self.map_size_bytes).unwrap_or(usize::MAX);
        let threads = i32::try_from(self.ingester_threads).unwrap_or(i32::MAX);
        let config = nostrdb::Config::new()
            .set_mapsize(map_size)
            .set_ingester_threads(threads)
            .skip_validation(self.ingest_skip_validation);

        match &self.notify {
            Some(notify) => {
                let notify = Arc::clone(notify);
                config.set_sub_callback(move |id: u64| notify(SubscriptionId::new(id)))
            }
            None => config,
        }
    }
}
