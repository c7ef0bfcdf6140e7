//! Stress helpers.
//!
//! These drive a store from several threads at once: writers hand events
//! to the engine's ingester threads while readers open transactions and
//! query.

use crate::events::NoteBuilder;
use nostr::Keys;
use notedb_core::{Store, DEFAULT_RETRY_BACKOFF};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Events each writer thread ingests.
    pub events_per_writer: usize,
    /// Number of ingesting threads.
    pub writers: usize,
    /// Number of querying threads.
    pub readers: usize,
    /// Retry attempts for each reader `begin`.
    pub retry_attempts: u32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            events_per_writer: 500,
            writers: 2,
            readers: 4,
            retry_attempts: 20,
        }
    }
}

/// Ingests and queries concurrently until every writer is done.
///
/// Reader operations that fail only with transient errors after their
/// retries count as failed; any other error panics.
pub fn concurrent_ingest_and_query(store: &Store, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let writers_left = AtomicUsize::new(config.writers);
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..config.writers {
            scope.spawn(|| {
                let keys = Keys::generate();
                for i in 0..config.events_per_writer {
                    let json = NoteBuilder::text(&format!("stress note {i}"))
                        .keys(&keys)
                        .json();
                    match store.ingest_one(&json, None) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
                writers_left.fetch_sub(1, Ordering::AcqRel);
            });
        }

        for _ in 0..config.readers {
            scope.spawn(|| {
                while writers_left.load(Ordering::Acquire) > 0 {
                    match store.begin_with_retry(config.retry_attempts, DEFAULT_RETRY_BACKOFF) {
                        Ok(txn) => {
                            txn.query(r#"{"kinds":[1],"limit":20}"#)
                                .expect("Query failed under load");
                            txn.end();
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) if e.is_transient() => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => panic!("Unexpected error under load: {e}"),
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
