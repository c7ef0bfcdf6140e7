//! Transaction leases, retries and snapshot visibility.

use notedb_core::{backoff_delay, invalidate_thread_cache, Store, StoreError};
use notedb_testkit::{test_config, NoteBuilder, TestStore};
use std::thread;
use std::time::{Duration, Instant};

const TEXT_NOTES: &str = r#"{"kinds":[1]}"#;

#[test]
fn readers_full_when_slots_are_taken() {
    let store = TestStore::with_config(test_config().max_readers(2));
    let a = store.begin().unwrap();

    thread::scope(|scope| {
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let worker: &Store = &store;
        scope.spawn(move || {
            let b = worker.begin().unwrap();
            held_tx.send(()).unwrap();
            done_rx.recv().unwrap();
            b.end();
        });
        held_rx.recv().unwrap();

        assert!(matches!(store.begin(), Err(StoreError::ReadersFull { max: 2 })));
        a.end();
        store.begin().unwrap().end();
        done_tx.send(()).unwrap();
    });
    assert_eq!(store.stats().transactions_failed, 1);
}

#[test]
fn retry_gives_up_after_max_attempts() {
    let store = TestStore::with_config(test_config().max_readers(1));
    let held = store.begin().unwrap();

    let initial = Duration::from_millis(5);
    let attempts = 4;
    let started = Instant::now();
    let err = store.begin_with_retry(attempts, initial).unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, StoreError::ReadersFull { .. }));
    assert!(err.is_transient());
    // Three sleeps between four attempts.
    let slept: Duration = (0..attempts - 1).map(|i| backoff_delay(initial, i)).sum();
    assert!(elapsed >= slept);
    assert!(elapsed < slept + Duration::from_secs(2));
    assert_eq!(store.stats().transactions_failed, u64::from(attempts));

    held.end();
    store.begin_with_retry(attempts, initial).unwrap().end();
}

#[test]
fn retry_succeeds_once_a_slot_frees_up() {
    let store = TestStore::with_config(test_config().max_readers(1));
    let shared: Store = (*store).clone();

    thread::scope(|scope| {
        let (tx, rx) = std::sync::mpsc::channel();
        scope.spawn(move || {
            let held = shared.begin().unwrap();
            tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(30));
            held.end();
        });
        rx.recv().unwrap();
        let txn = store.begin_with_retry(100, Duration::from_millis(5)).unwrap();
        txn.end();
    });
}

#[test]
fn zero_attempts_still_tries_once() {
    let store = TestStore::new();
    store.begin_with_retry(0, Duration::from_millis(1)).unwrap().end();
}

#[test]
fn open_transaction_keeps_its_snapshot() {
    let store = TestStore::new();
    store.put(&NoteBuilder::text("before").json());

    let txn = store.begin().unwrap();
    let later = store.put_on_worker(&NoteBuilder::text("after").json());
    assert_eq!(txn.query(TEXT_NOTES).unwrap().len(), 1);
    assert!(txn.note_by_key(later).unwrap_err().is_not_found());
    txn.end();

    let txn = store.begin().unwrap();
    assert_eq!(txn.note_by_key(later).unwrap().content(), "after");
}

#[test]
fn thread_cache_holds_snapshot_until_invalidated() {
    let store = TestStore::with_config(test_config().thread_snapshot_cache(true));
    store.put(&NoteBuilder::text("one").json());
    store.begin().unwrap().end();

    store.put_on_worker(&NoteBuilder::text("two").json());
    let txn = store.begin().unwrap();
    assert_eq!(txn.query(TEXT_NOTES).unwrap().len(), 1);
    txn.end();

    invalidate_thread_cache();
    let txn = store.begin().unwrap();
    assert_eq!(txn.query(TEXT_NOTES).unwrap().len(), 2);
}

#[test]
fn ingest_from_another_thread_visible_after_invalidate() {
    let store = TestStore::with_config(test_config().thread_snapshot_cache(true));
    store.begin().unwrap().end();

    let writer: Store = (*store).clone();
    thread::spawn(move || {
        writer
            .ingest_one_sync(&NoteBuilder::text("from another thread").json(), None)
            .unwrap();
    })
    .join()
    .unwrap();

    let txn = store.begin().unwrap();
    assert!(txn.text_search("another", None).unwrap().is_empty());
    txn.end();

    store.invalidate_thread_cache();
    let txn = store.begin().unwrap();
    assert_eq!(txn.text_search("another", None).unwrap().len(), 1);
}

#[test]
fn closing_one_store_leaves_another_stores_cache_alone() {
    let a = TestStore::with_config(test_config().thread_snapshot_cache(true));
    let b = TestStore::with_config(test_config().thread_snapshot_cache(true));
    b.put(&NoteBuilder::text("in b").json());
    a.begin().unwrap().end();
    b.begin().unwrap().end();

    a.close().unwrap();
    let txn = b.begin().unwrap();
    assert_eq!(txn.query(TEXT_NOTES).unwrap().len(), 1);
}

#[test]
fn record_views_end_with_transaction() {
    let store = TestStore::new();
    let key = store.put(&NoteBuilder::text("scoped").json());

    let txn = store.begin().unwrap();
    let content = txn.note_by_key(key).unwrap().content().to_string();
    txn.end();
    assert_eq!(content, "scoped");
}

#[test]
fn begin_after_close_is_closed_not_busy() {
    let store = TestStore::new();
    store.close().unwrap();
    let err = store.begin_with_retry(3, Duration::from_millis(1)).unwrap_err();
    assert!(matches!(err, StoreError::Closed));
    assert!(!err.is_transient());
}
