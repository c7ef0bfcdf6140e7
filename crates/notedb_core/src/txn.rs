//! Read transactions.
//!
//! A [`Transaction`] leases an engine read transaction: a consistent
//! snapshot of everything the engine had committed when it began. The lease
//! holds one of `max_readers` reader slots until the transaction ends.
//!
//! `begin()` never blocks. While the store is closing, or when every reader
//! slot is taken, or when the engine refuses a new read transaction, it fails
//! with a transient error and the caller decides whether to retry;
//! [`Store::begin_with_retry`] does so on a fixed schedule.
//!
//! [`Store::begin_with_retry`]: crate::Store::begin_with_retry

use crate::error::{StoreError, StoreResult};
use crate::note::NoteRef;
use crate::store::Shared;
use crate::types::{NoteId, NoteKey};
use nostrdb::Ndb;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The retry delay doubles once every this many attempts.
pub const BACKOFF_DOUBLING_INTERVAL: u32 = 50;

/// Upper bound on a single retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_millis(512);

/// Attempts used by convenience lookups that open their own transaction.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Initial delay used by convenience lookups that open their own transaction.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Returns the delay before retry attempt `attempt + 1`:
/// `min(initial * 2^(attempt / 50), 512 ms)`.
#[must_use]
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let doublings = attempt / BACKOFF_DOUBLING_INTERVAL;
    let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
    initial.saturating_mul(factor).min(MAX_BACKOFF)
}

/// An engine read transaction and the engine handle it reads from.
///
/// Field order matters: the transaction is dropped before the handle.
pub(crate) struct Lease {
    txn: nostrdb::Transaction,
    ndb: Ndb,
}

impl Lease {
    fn new(ndb: Ndb) -> StoreResult<Self> {
        let txn = nostrdb::Transaction::new(&ndb).map_err(|e| {
            debug!(error = %e, "engine refused a read transaction");
            StoreError::Busy
        })?;
        Ok(Self { txn, ndb })
    }
}

struct CachedLease {
    store_id: u64,
    open: Arc<AtomicBool>,
    lease: Rc<Lease>,
}

thread_local! {
    static LEASE_CACHE: RefCell<Vec<CachedLease>> = const { RefCell::new(Vec::new()) };
}

/// Drops every snapshot cached for the calling thread.
///
/// Only matters for stores opened with `thread_snapshot_cache`: the next
/// `begin()` on this thread sees everything committed so far.
pub fn invalidate_thread_cache() {
    LEASE_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Drops the calling thread's cached snapshot of one store.
pub(crate) fn forget_store(store_id: u64) {
    LEASE_CACHE.with(|cache| cache.borrow_mut().retain(|entry| entry.store_id != store_id));
}

fn cached_lease(shared: &Shared, ndb: Ndb) -> StoreResult<Rc<Lease>> {
    LEASE_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        cache.retain(|entry| entry.open.load(Ordering::Acquire));

        if let Some(entry) = cache.iter().find(|entry| entry.store_id == shared.id) {
            return Ok(Rc::clone(&entry.lease));
        }

        let lease = Rc::new(Lease::new(ndb)?);
        cache.push(CachedLease {
            store_id: shared.id,
            open: Arc::clone(&shared.open),
            lease: Rc::clone(&lease),
        });
        Ok(lease)
    })
}

/// Opens a transaction without waiting.
pub(crate) fn begin(shared: &Shared) -> StoreResult<Transaction<'_>> {
    let result = lease(shared);
    match &result {
        Ok(_) => shared.stats.record_transaction_start(),
        Err(_) => shared.stats.record_transaction_failure(),
    }
    result
}

fn lease(shared: &Shared) -> StoreResult<Transaction<'_>> {
    let _gate = shared.gate.try_read().ok_or(StoreError::Busy)?;
    let ndb = shared.engine()?;

    let max = shared.config.max_readers;
    if shared.readers.fetch_add(1, Ordering::AcqRel) >= max {
        shared.readers.fetch_sub(1, Ordering::AcqRel);
        return Err(StoreError::ReadersFull { max });
    }

    let lease = if shared.config.thread_snapshot_cache {
        cached_lease(shared, ndb)
    } else {
        Lease::new(ndb).map(Rc::new)
    };

    match lease {
        Ok(lease) => Ok(Transaction { shared, lease }),
        Err(e) => {
            shared.readers.fetch_sub(1, Ordering::AcqRel);
            Err(e)
        }
    }
}

/// Opens a transaction, retrying transient failures.
///
/// Makes at most `max_attempts` attempts (at least one), sleeping
/// [`backoff_delay`] between them, and returns the last error.
pub(crate) fn begin_with_retry(
    shared: &Shared,
    max_attempts: u32,
    initial_backoff: Duration,
) -> StoreResult<Transaction<'_>> {
    let attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match begin(shared) {
            Ok(txn) => return Ok(txn),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let delay = backoff_delay(initial_backoff, attempt);
                debug!(attempt, ?delay, error = %e, "transaction busy, retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A read-only lease on a consistent snapshot of the store.
///
/// Owned by the thread that opened it (it is neither `Send` nor `Sync`).
/// Every [`NoteRef`] obtained through it borrows it, so the borrow checker
/// guarantees no record view outlives the lease. Ending is explicit with
/// [`Transaction::end`] or implicit on drop.
pub struct Transaction<'s> {
    shared: &'s Shared,
    lease: Rc<Lease>,
}

impl<'s> Transaction<'s> {
    /// Resolves a note by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for key 0 and for keys this
    /// transaction's snapshot does not contain.
    pub fn note_by_key(&self, key: NoteKey) -> StoreResult<NoteRef<'_>> {
        if key.as_u64() == 0 {
            return Err(StoreError::NotFound);
        }
        self.lease
            .ndb
            .get_note_by_key(&self.lease.txn, key.into())
            .map(|note| NoteRef::new(key, note))
            .map_err(|_| StoreError::NotFound)
    }

    /// Resolves a note by id, returning its key as well.
    pub fn note_by_id(&self, id: &NoteId) -> StoreResult<(NoteKey, NoteRef<'_>)> {
        let key: NoteKey = self
            .lease
            .ndb
            .get_notekey_by_id(&self.lease.txn, id.as_bytes())
            .map_err(|_| StoreError::NotFound)?
            .into();
        Ok((key, self.note_by_key(key)?))
    }

    /// Returns the relays a visible note was seen on.
    ///
    /// Empty for unknown keys and for notes ingested without a relay.
    #[must_use]
    pub fn note_relays(&self, key: NoteKey) -> Vec<String> {
        match self.note_by_key(key) {
            Ok(note) => note
                .engine_note()
                .relays(&self.lease.txn)
                .map(|relay| relay.to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Ends the transaction, releasing its reader slot.
    pub fn end(self) {}

    pub(crate) fn shared(&self) -> &'s Shared {
        self.shared
    }

    pub(crate) fn ndb(&self) -> &Ndb {
        &self.lease.ndb
    }

    pub(crate) fn engine_txn(&self) -> &nostrdb::Transaction {
        &self.lease.txn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.shared.readers.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("store", &self.shared.id)
            .field("shared_lease", &(Rc::strong_count(&self.lease) > 1))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Store};
    use std::sync::mpsc;
    use tempfile::tempdir;

    #[test]
    fn backoff_doubles_every_fifty_attempts() {
        let d = Duration::from_millis(10);
        assert_eq!(backoff_delay(d, 0), d);
        assert_eq!(backoff_delay(d, 49), d);
        assert_eq!(backoff_delay(d, 50), Duration::from_millis(20));
        assert_eq!(backoff_delay(d, 100), Duration::from_millis(40));
        assert_eq!(backoff_delay(d, 149), Duration::from_millis(40));
    }

    #[test]
    fn backoff_is_capped() {
        let d = Duration::from_millis(10);
        assert_eq!(backoff_delay(d, 300), MAX_BACKOFF);
        assert_eq!(backoff_delay(d, u32::MAX), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::from_secs(2), 0), MAX_BACKOFF);
    }

    #[test]
    fn retry_bound_sums_schedule() {
        let d = Duration::from_millis(10);
        let bound: Duration = (0..120).map(|i| backoff_delay(d, i)).sum();
        // 50 × 10 + 50 × 20 + 20 × 40
        assert_eq!(bound, Duration::from_millis(2300));
    }

    #[test]
    fn begin_is_busy_while_store_gate_is_held() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Config::default()).unwrap();
        let shared = store.shared();

        let gate = shared.gate.write();
        let err = begin(shared).unwrap_err();
        assert!(matches!(err, StoreError::Busy));
        assert!(err.is_transient());
        drop(gate);

        begin(shared).unwrap().end();
        assert_eq!(store.stats().transactions_failed, 1);
    }

    #[test]
    fn retry_outlasts_a_briefly_held_gate() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Config::default()).unwrap();
        let shared = store.shared();

        std::thread::scope(|scope| {
            let (held_tx, held_rx) = mpsc::channel();
            scope.spawn(move || {
                let gate = shared.gate.write();
                held_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(30));
                drop(gate);
            });
            held_rx.recv().unwrap();

            assert!(matches!(begin(shared), Err(StoreError::Busy)));
            let txn = begin_with_retry(shared, 20, Duration::from_millis(5)).unwrap();
            txn.end();
        });
    }

    #[test]
    fn reader_slots_are_bounded() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Config::new().max_readers(1)).unwrap();

        let first = store.begin().unwrap();
        assert!(matches!(
            store.begin(),
            Err(StoreError::ReadersFull { max: 1 })
        ));
        first.end();
        store.begin().unwrap().end();
    }

    #[test]
    fn cached_leases_of_closed_stores_are_pruned() {
        let config = Config::new().thread_snapshot_cache(true);
        let first_dir = tempdir().unwrap();
        let second_dir = tempdir().unwrap();
        let first = Store::open(first_dir.path(), config.clone()).unwrap();
        let second = Store::open(second_dir.path(), config).unwrap();

        first.begin().unwrap().end();
        second.begin().unwrap().end();
        assert_eq!(LEASE_CACHE.with(|c| c.borrow().len()), 2);

        let first_open = Arc::clone(&first.shared().open);
        std::thread::scope(|scope| {
            scope.spawn(|| first.close().unwrap());
        });
        assert!(!first_open.load(Ordering::Acquire));
        // closed on another thread, so this thread still holds the entry
        assert_eq!(LEASE_CACHE.with(|c| c.borrow().len()), 2);

        second.begin().unwrap().end();
        let ids: Vec<u64> = LEASE_CACHE.with(|c| c.borrow().iter().map(|e| e.store_id).collect());
        assert_eq!(ids, vec![second.shared().id]);

        second.close().unwrap();
        assert_eq!(LEASE_CACHE.with(|c| c.borrow().len()), 0);
    }
}
