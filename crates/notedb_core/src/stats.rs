//! Store statistics.
//!
//! Two views are offered: [`StoreStats`], cheap atomic counters bumped on
//! every operation of this layer, and [`StoreStat`], a look at the store's
//! footprint.
//!
//! ```rust,ignore
//! let counters = store.stats();
//! println!("ingested: {}", counters.ingested);
//!
//! let stat = store.stat()?;
//! println!("data: {} bytes, {} subscriptions", stat.data_bytes, stat.subscriptions);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters.
///
/// All counters are atomic and can be read while operations are in progress.
/// Values only ever increase. They are diagnostic; nothing depends on them.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Events handed to the engine by `ingest_one`.
    ingested: AtomicU64,
    /// Bytes of event JSON handed to the engine by `ingest_one`.
    ingested_bytes: AtomicU64,
    /// Events refused before or by the engine.
    ingest_rejected: AtomicU64,
    /// Batch lines handed to the engine.
    batch_lines: AtomicU64,
    /// Read transactions begun.
    transactions_started: AtomicU64,
    /// `begin()` calls that failed.
    transactions_failed: AtomicU64,
    /// Filter queries executed.
    queries: AtomicU64,
    /// Text searches executed.
    text_searches: AtomicU64,
}

impl StoreStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_ingest(&self, bytes: u64) {
        self.ingested.fetch_add(1, Ordering::Relaxed);
        self.ingested_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.ingest_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_lines(&self, lines: u64) {
        self.batch_lines.fetch_add(lines, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_failure(&self) {
        self.transactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_text_search(&self) {
        self.text_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of events accepted for ingestion.
    pub fn ingested(&self) -> u64 {
        self.ingested.load(Ordering::Relaxed)
    }

    /// Returns the bytes of event JSON accepted for ingestion.
    pub fn ingested_bytes(&self) -> u64 {
        self.ingested_bytes.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ingested: self.ingested(),
            ingested_bytes: self.ingested_bytes(),
            ingest_rejected: self.ingest_rejected.load(Ordering::Relaxed),
            batch_lines: self.batch_lines.load(Ordering::Relaxed),
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            transactions_failed: self.transactions_failed.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            text_searches: self.text_searches.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Events accepted by `ingest_one`.
    pub ingested: u64,
    /// Bytes of event JSON accepted by `ingest_one`.
    pub ingested_bytes: u64,
    /// Events refused before or by the engine.
    pub ingest_rejected: u64,
    /// Batch lines handed to the engine.
    pub batch_lines: u64,
    /// Read transactions begun.
    pub transactions_started: u64,
    /// `begin()` calls that failed.
    pub transactions_failed: u64,
    /// Filter queries executed.
    pub queries: u64,
    /// Text searches executed.
    pub text_searches: u64,
}

/// Footprint of an open store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StoreStat {
    /// Size of the engine's data file in bytes.
    pub data_bytes: u64,
    /// Live subscriptions.
    pub subscriptions: usize,
    /// Read transactions currently open.
    pub open_transactions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = StoreStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn ingest_counts_events_and_bytes() {
        let stats = StoreStats::new();
        stats.record_ingest(100);
        stats.record_ingest(50);
        stats.record_rejected();

        let snap = stats.snapshot();
        assert_eq!(snap.ingested, 2);
        assert_eq!(snap.ingested_bytes, 150);
        assert_eq!(snap.ingest_rejected, 1);
    }

    #[test]
    fn batch_lines_do_not_touch_ingest_counters() {
        let stats = StoreStats::new();
        stats.record_batch_lines(3);
        stats.record_batch_lines(2);

        let snap = stats.snapshot();
        assert_eq!(snap.batch_lines, 5);
        assert_eq!(snap.ingested, 0);
        assert_eq!(snap.ingested_bytes, 0);
    }
}
