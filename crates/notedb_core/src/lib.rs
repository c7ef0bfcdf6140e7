//! # notedb core
//!
//! A local store for Nostr events on top of the nostrdb engine.
//!
//! This crate provides:
//! - Ingestion of event JSON, one at a time or as newline-delimited batches,
//!   handed to the engine's validating ingester threads
//! - Snapshot read transactions with non-blocking `begin` and a bounded
//!   retry schedule
//! - Zero-copy [`NoteRef`] views whose lifetime is tied to the transaction
//! - NIP-01 filter queries, full-text search and profile lookup
//! - Live subscriptions drained by polling
//! - Reaction and zap tallies, reply threading and expiration checks
//!
//! ## Example
//!
//! ```rust
//! use notedb_core::{Config, Store};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = Store::open(dir.path(), Config::default()).unwrap();
//! let txn = store.begin().unwrap();
//! assert!(txn.query(r#"{"kinds":[1],"limit":10}"#).unwrap().is_empty());
//! txn.end();
//! store.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregate;
mod config;
mod dir;
mod error;
mod filter;
mod ingest;
mod note;
mod query;
mod slot;
mod stats;
mod store;
mod subscription;
mod thread;
mod txn;
mod types;
mod zap;

pub use aggregate::{
    is_expired, is_expired_at, note_expiration, ReactionBreakdown, AGGREGATE_SCAN_LIMIT,
    DEFAULT_REACTION,
};
pub use config::{Config, NotifyFn};
pub use error::{StoreError, StoreResult};
pub use filter::{Filter, TagFilter, TagValue, MAX_FILTERS};
pub use ingest::normalize_event_json;
pub use note::{tags_json, Event, NoteRef, TagElem, TagRef, MAX_TAG_ELEMENTS_SERIALIZED};
pub use query::{SearchConfig, SearchOrder, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
pub use slot::StoreSlot;
pub use stats::{StatsSnapshot, StoreStat};
pub use store::Store;
pub use thread::{nip10_thread, nip10_thread_full, thread_refs_from_tags, ThreadRefs};
pub use txn::{
    backoff_delay, invalidate_thread_cache, Transaction, BACKOFF_DOUBLING_INTERVAL,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF, MAX_BACKOFF,
};
pub use types::{
    NoteId, NoteKey, Pubkey, SubscriptionId, KIND_CONTACTS, KIND_DM, KIND_LONG_FORM,
    KIND_METADATA, KIND_REACTION, KIND_REPOST, KIND_TEXT, KIND_ZAP,
};
pub use zap::{bolt11_amount_msat, zap_amount_msat, ZapStats};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
