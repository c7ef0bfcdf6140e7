//! Ingestion paths end to end.

use notedb_core::{NoteId, Store, StoreError};
use notedb_testkit::{strip_tags, test_config, NoteBuilder, TestStore};
use serde_json::Value;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(10);

fn count(store: &Store, filter: &str) -> usize {
    let txn = store.begin_with_retry(10, Duration::from_millis(5)).unwrap();
    let n = txn.query(filter).unwrap().len();
    txn.end();
    n
}

/// Waits for the engine's writer to store `expected` matches of `filter`.
fn wait_for_count(store: &Store, filter: &str, expected: usize) -> usize {
    let deadline = Instant::now() + WAIT;
    loop {
        let n = count(store, filter);
        if n >= expected || Instant::now() > deadline {
            return n;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn short_timeout_store() -> TestStore {
    TestStore::with_config(test_config().sync_ingest_timeout(Duration::from_millis(300)))
}

#[test]
fn ingest_one_becomes_visible_with_its_relay() {
    let store = TestStore::new();
    let note = NoteBuilder::text("async").sign();
    store.ingest_one(&note.json, Some("wss://relay.one")).unwrap();
    assert_eq!(wait_for_count(&store, r#"{"kinds":[1]}"#, 1), 1);

    let txn = store.begin().unwrap();
    let notes = txn.query(r#"{"kinds":[1]}"#).unwrap();
    let json: Value = serde_json::from_str(&notes[0]).unwrap();
    assert_eq!(json["id"], note.id.as_str());

    let (key, _) = txn.note_by_id(&NoteId::from_hex(&note.id).unwrap()).unwrap();
    assert_eq!(txn.note_relays(key), vec!["wss://relay.one"]);
}

#[test]
fn relay_survives_reopen() {
    let store = TestStore::new();
    let note = NoteBuilder::text("from a relay").sign();
    let key = store.ingest_one_sync(&note.json, Some("wss://relay.two")).unwrap();

    let store = store.reopen();
    let txn = store.begin().unwrap();
    assert_eq!(txn.note_relays(key), vec!["wss://relay.two"]);
    let (found, _) = txn.note_by_id(&NoteId::from_hex(&note.id).unwrap()).unwrap();
    assert_eq!(found, key);
}

#[test]
fn client_ingest_has_no_relay() {
    let store = TestStore::new();
    let key = store.put(&NoteBuilder::text("local").json());
    let txn = store.begin().unwrap();
    assert!(txn.note_relays(key).is_empty());
}

#[test]
fn ingest_one_repairs_missing_tags() {
    let store = TestStore::new();
    let json = strip_tags(&NoteBuilder::text("no tags").json());
    store.ingest_one_sync(&json, None).unwrap();
    assert_eq!(count(&store, r#"{"kinds":[1]}"#), 1);
    assert_eq!(store.ingest_count(), 1);
    assert!(store.ingest_bytes() > json.len() as u64);
}

#[test]
fn ingest_one_rejects_unparseable_json() {
    let store = TestStore::new();
    let err = store.ingest_one(r#"{"kind":1,"content":"hi"}"#, None).unwrap_err();
    assert!(matches!(err, StoreError::Ingest { .. }));
    assert_eq!(store.stats().ingest_rejected, 1);
    assert_eq!(store.ingest_count(), 0);
}

#[test]
fn bad_signature_fails_sync_ingest_and_store_carries_on() {
    let store = short_timeout_store();
    let err = store
        .ingest_one_sync(&NoteBuilder::text("forged").bad_sig_json(), None)
        .unwrap_err();
    assert!(matches!(err, StoreError::Ingest { .. }));
    assert!(store.is_open());
    assert_eq!(store.stats().ingest_rejected, 1);

    let key = store.ingest_one_sync(&NoteBuilder::text("honest").json(), None).unwrap();
    let txn = store.begin().unwrap();
    assert_eq!(txn.note_by_key(key).unwrap().content(), "honest");
    assert_eq!(txn.query(r#"{"kinds":[1]}"#).unwrap().len(), 1);
}

#[test]
fn skip_validation_stores_bad_signatures() {
    let store = TestStore::with_config(test_config().ingest_skip_validation(true));
    let json = NoteBuilder::text("unchecked").bad_sig_json();
    let key = store.ingest_one_sync(&json, None).unwrap();

    let txn = store.begin().unwrap();
    assert_eq!(txn.note_by_key(key).unwrap().content(), "unchecked");
}

#[test]
fn batch_counts_lines_without_touching_ingest_counters() {
    let store = TestStore::new();
    let good_a = NoteBuilder::text("a").json();
    let good_b = NoteBuilder::text("b").json();
    let no_tags = strip_tags(&NoteBuilder::text("c").json());
    let batch = format!("{good_a}\n\n{no_tags}\n{good_b}\n");

    assert_eq!(store.ingest_batch(batch.as_bytes()).unwrap(), 3);
    let stats = store.stats();
    assert_eq!(stats.batch_lines, 3);
    assert_eq!(stats.ingested, 0);
    assert_eq!(stats.ingested_bytes, 0);
    assert_eq!(store.ingest_count(), 0);

    // Batches are not repaired: the tag-less line never lands.
    assert_eq!(wait_for_count(&store, r#"{"kinds":[1]}"#, 2), 2);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(count(&store, r#"{"kinds":[1]}"#), 2);
}

#[test]
fn batch_must_be_utf8() {
    let store = TestStore::new();
    let err = store.ingest_batch(&[0xff, 0xfe, b'\n']).unwrap_err();
    assert!(matches!(err, StoreError::Ingest { .. }));
    assert_eq!(store.stats().batch_lines, 0);
}

#[test]
fn duplicates_keep_their_key() {
    let store = TestStore::new();
    let json = NoteBuilder::text("once").json();
    let first = store.put(&json);
    for _ in 0..2 {
        assert_eq!(store.put(&json), first);
    }
    assert_eq!(count(&store, r#"{"kinds":[1]}"#), 1);
    assert_eq!(store.ingest_count(), 3);
}

#[test]
fn notes_survive_reopen_with_same_keys() {
    let store = TestStore::new();
    let first = NoteBuilder::text("first").created_at(10).sign();
    let second = NoteBuilder::metadata(r#"{"name":"carol"}"#).created_at(20).sign();
    let k1 = store.put(&first.json);
    store.put(&second.json);

    let store = store.reopen();
    let txn = store.begin().unwrap();
    {
        let (key, note) = txn.note_by_id(&NoteId::from_hex(&first.id).unwrap()).unwrap();
        assert_eq!(key, k1);
        assert_eq!(note.content(), "first");
    }

    let author = notedb_core::Pubkey::from_hex(&second.pubkey).unwrap();
    assert!(txn.get_profile_by_pubkey(&author).unwrap().contains("carol"));
    txn.end();

    let k3 = store.put(&NoteBuilder::text("third").json());
    assert!(k3 > k1);
}

#[test]
fn closed_store_refuses_work() {
    let store = TestStore::new();
    store.close().unwrap();
    assert!(matches!(store.ingest_batch(b"{}"), Err(StoreError::Closed)));
    assert!(matches!(
        store.ingest_one(&NoteBuilder::text("late").json(), None),
        Err(StoreError::Closed)
    ));
    assert!(matches!(store.subscribe("{}"), Err(StoreError::Closed)));
    assert!(matches!(store.stat(), Err(StoreError::Closed)));
}
