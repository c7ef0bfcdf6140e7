//! Live subscriptions.
//!
//! A subscription is a set of filters registered with the engine. As notes
//! are stored the engine matches them against each subscription and queues
//! the keys of those that match; callers drain the queue with
//! [`Store::poll`]. Nothing is pushed to the caller except the optional
//! notify callback, which only says "poll me".
//!
//! Filters with multi-letter tag constraints are registered without them and
//! checked again when polled.

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::store::Store;
use crate::types::{NoteKey, SubscriptionId};
use nostrdb::Ndb;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The filters of every live subscription, by id.
pub(crate) struct Subscriptions {
    live: Mutex<HashMap<SubscriptionId, Vec<Filter>>>,
}

impl Subscriptions {
    pub(crate) fn new() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, ndb: &Ndb, filters: Vec<Filter>) -> StoreResult<SubscriptionId> {
        let engine_filters = filters
            .iter()
            .map(Filter::to_engine)
            .collect::<StoreResult<Vec<_>>>()?;
        let sub = ndb
            .subscribe(&engine_filters)
            .map_err(|e| StoreError::query(format!("subscribe failed: {e}")))?;

        let id = SubscriptionId::new(sub.id());
        self.live.lock().insert(id, filters);
        debug!(%id, "subscribed");
        Ok(id)
    }

    fn filters(&self, id: SubscriptionId) -> Option<Vec<Filter>> {
        self.live.lock().get(&id).cloned()
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        self.live.lock().remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().len()
    }

    /// Unsubscribes everything from `ndb`. Used by close.
    pub(crate) fn release_all(&self, mut ndb: Ndb) {
        let ids: Vec<SubscriptionId> = self.live.lock().drain().map(|(id, _)| id).collect();
        for id in ids {
            if let Err(e) = ndb.unsubscribe(id.into()) {
                warn!(%id, error = %e, "engine unsubscribe failed during close");
            }
        }
    }
}

impl Store {
    /// Registers a live subscription for a filter object or array.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the filter is malformed and
    /// [`StoreError::Closed`] after close.
    pub fn subscribe(&self, filter_json: &str) -> StoreResult<SubscriptionId> {
        self.ensure_open()?;
        let filters = Filter::parse_many(filter_json)?;
        let ndb = self.ndb()?;
        self.shared().subscriptions.register(&ndb, filters)
    }

    /// Drains up to `capacity` matched keys, oldest first.
    ///
    /// Never blocks. An empty result means nothing new yet; unknown ids
    /// and a closed store also return nothing.
    #[must_use]
    pub fn poll(&self, id: SubscriptionId, capacity: usize) -> Vec<NoteKey> {
        let Some(filters) = self.shared().subscriptions.filters(id) else {
            return Vec::new();
        };
        let Ok(ndb) = self.ndb() else {
            return Vec::new();
        };

        let max = u32::try_from(capacity).unwrap_or(u32::MAX);
        let keys: Vec<NoteKey> = ndb
            .poll_for_notes(id.into(), max)
            .into_iter()
            .map(NoteKey::from)
            .collect();

        if keys.is_empty() || !filters.iter().any(Filter::needs_post_filter) {
            return keys;
        }
        match self.begin_default() {
            Ok(txn) => keys
                .into_iter()
                .filter(|key| {
                    txn.note_by_key(*key)
                        .is_ok_and(|note| filters.iter().any(|f| f.matches(&note)))
                })
                .collect(),
            Err(e) => {
                warn!(%id, error = %e, "cannot recheck polled keys, returning them unchecked");
                keys
            }
        }
    }

    /// Removes a subscription. Returns false if it did not exist.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if !self.shared().subscriptions.remove(id) {
            return false;
        }
        if let Ok(mut ndb) = self.ndb() {
            if let Err(e) = ndb.unsubscribe(id.into()) {
                warn!(%id, error = %e, "engine unsubscribe failed");
            }
        }
        debug!(%id, "unsubscribed");
        true
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.shared().subscriptions.len()
    }

    /// Clears the calling thread's snapshot cache. See
    /// [`crate::invalidate_thread_cache`].
    pub fn invalidate_thread_cache(&self) {
        crate::txn::invalidate_thread_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::tempdir;

    #[test]
    fn ids_are_nonzero_and_distinct() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Config::default()).unwrap();

        let a = store.subscribe(r#"{"kinds":[1]}"#).unwrap();
        let b = store.subscribe(r#"[{"kinds":[7]},{"kinds":[9735]}]"#).unwrap();
        assert_ne!(a.as_u64(), 0);
        assert_ne!(a, b);
        assert_eq!(store.subscription_count(), 2);
    }

    #[test]
    fn malformed_filter_is_query_error() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Config::default()).unwrap();

        assert!(matches!(
            store.subscribe(r#"{"kinds":"1"}"#),
            Err(StoreError::Query { .. })
        ));
        assert!(matches!(
            store.subscribe(r##"{"#e":["short"]}"##),
            Err(StoreError::Query { .. })
        ));
        assert_eq!(store.subscription_count(), 0);
    }

    #[test]
    fn unsubscribe_releases() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Config::default()).unwrap();

        let id = store.subscribe(r#"{"kinds":[1]}"#).unwrap();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        assert!(store.poll(id, 10).is_empty());
        assert_eq!(store.subscription_count(), 0);
    }

    #[test]
    fn close_drops_subscriptions() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), Config::default()).unwrap();
        let id = store.subscribe(r#"{"kinds":[1]}"#).unwrap();

        store.close().unwrap();
        assert_eq!(store.subscription_count(), 0);
        assert!(store.poll(id, 10).is_empty());
        assert!(matches!(store.subscribe("{}"), Err(StoreError::Closed)));
    }
}
