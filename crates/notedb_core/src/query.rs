//! Filter and text queries.
//!
//! Filters are answered by the engine's indexes. Multi-letter tag
//! constraints, which the engine does not index, are checked here against
//! each candidate. Results of a filter array are merged newest first.

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::note::NoteRef;
use crate::store::Store;
use crate::txn::Transaction;
use crate::types::{NoteId, NoteKey, Pubkey, KIND_LONG_FORM, KIND_METADATA, KIND_TEXT};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// Default number of text search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 128;

/// Largest accepted text search limit.
pub const MAX_SEARCH_LIMIT: usize = 1024;

/// Result order for text search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchOrder {
    /// Newest first.
    #[default]
    Descending,
    /// Oldest first.
    Ascending,
}

/// Text search options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximum number of results.
    pub limit: usize,
    /// Result order by `created_at`.
    pub order: SearchOrder,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            order: SearchOrder::Descending,
        }
    }
}

#[derive(Deserialize)]
struct SearchOptions {
    limit: Option<i64>,
    order: Option<String>,
}

impl SearchConfig {
    /// Parses `{"limit": n, "order": "asc" | "desc"}`.
    ///
    /// Missing keys and `None` keep the defaults. A limit outside
    /// `1..=1024` falls back to the default; an order other than `"asc"`
    /// means newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] for malformed JSON.
    pub fn from_json(json: Option<&str>) -> StoreResult<Self> {
        let mut config = Self::default();
        let Some(json) = json.filter(|j| !j.trim().is_empty()) else {
            return Ok(config);
        };

        let options: SearchOptions = serde_json::from_str(json)
            .map_err(|e| StoreError::query(format!("invalid search config: {e}")))?;

        if let Some(limit) = options
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .filter(|l| (1..=MAX_SEARCH_LIMIT).contains(l))
        {
            config.limit = limit;
        }
        if options.order.as_deref() == Some("asc") {
            config.order = SearchOrder::Ascending;
        }
        Ok(config)
    }
}

fn engine_max(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Orders newest first, breaking ties by key.
fn newest_first(a: &NoteRef<'_>, b: &NoteRef<'_>) -> std::cmp::Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| b.key().cmp(&a.key()))
}

impl Transaction<'_> {
    /// Runs a filter object, or an array of up to 16 filters, and returns
    /// the matching notes as event JSON, newest first.
    ///
    /// Each filter contributes at most `min(limit, query_result_cap)`
    /// notes; the union is deduplicated and capped at `query_result_cap`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] for malformed filters.
    pub fn query(&self, filter_json: &str) -> StoreResult<Vec<String>> {
        let filters = Filter::parse_many(filter_json)?;
        self.query_notes(&filters)?
            .iter()
            .map(NoteRef::to_json)
            .collect()
    }

    /// Runs parsed filters and returns zero-copy views, newest first.
    pub fn query_notes(&self, filters: &[Filter]) -> StoreResult<Vec<NoteRef<'_>>> {
        self.shared().stats.record_query();
        let cap = self.shared().config.query_result_cap;

        let mut seen: HashSet<NoteKey> = HashSet::new();
        let mut hits: Vec<NoteRef<'_>> = Vec::new();
        for filter in filters {
            let limit = filter.limit.map_or(cap, |limit| limit.min(cap));
            if limit == 0 {
                continue;
            }
            for note in self.run_filter(filter, limit, cap)? {
                if seen.insert(note.key()) {
                    hits.push(note);
                }
            }
        }

        hits.sort_by(newest_first);
        hits.truncate(cap);
        debug!(filters = filters.len(), hits = hits.len(), "query");
        Ok(hits)
    }

    /// Runs one filter with its own bound instead of `query_result_cap`.
    /// The filter's `limit`, if smaller, still applies.
    pub(crate) fn scan_notes(&self, filter: &Filter, max: usize) -> StoreResult<Vec<NoteRef<'_>>> {
        self.shared().stats.record_query();
        let limit = filter.limit.map_or(max, |limit| limit.min(max));
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.run_filter(filter, limit, max)
    }

    /// Asks the engine for up to `limit` matches of one filter.
    fn run_filter(&self, filter: &Filter, limit: usize, cap: usize) -> StoreResult<Vec<NoteRef<'_>>> {
        let post_filter = filter.needs_post_filter();
        let engine_filter = filter.to_engine()?;
        let fetch = if post_filter { cap } else { limit };

        let results = self
            .ndb()
            .query(self.engine_txn(), &[engine_filter], engine_max(fetch))
            .map_err(|e| StoreError::query(format!("engine query failed: {e}")))?;

        let mut notes: Vec<NoteRef<'_>> = results
            .into_iter()
            .map(|result| NoteRef::new(result.note_key.into(), result.note))
            .filter(|note| !post_filter || filter.matches(note))
            .collect();
        notes.sort_by(newest_first);
        notes.truncate(limit);
        Ok(notes)
    }

    /// Full-text search over text notes and long-form articles.
    ///
    /// Matching is the engine's: every word of `query` must appear in the
    /// content. `config_json` is parsed by [`SearchConfig::from_json`].
    pub fn text_search(&self, query: &str, config_json: Option<&str>) -> StoreResult<Vec<String>> {
        let config = SearchConfig::from_json(config_json)?;
        self.search_notes(query, &config)?
            .iter()
            .map(NoteRef::to_json)
            .collect()
    }

    /// Like [`Transaction::text_search`], returning zero-copy views.
    pub fn search_notes(&self, query: &str, config: &SearchConfig) -> StoreResult<Vec<NoteRef<'_>>> {
        self.shared().stats.record_text_search();
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let filter = nostrdb::Filter::new()
            .search(query)
            .kinds([u64::from(KIND_TEXT), u64::from(KIND_LONG_FORM)])
            .limit(MAX_SEARCH_LIMIT as u64)
            .build();
        let results = self
            .ndb()
            .query(self.engine_txn(), &[filter], engine_max(MAX_SEARCH_LIMIT))
            .map_err(|e| StoreError::query(format!("engine search failed: {e}")))?;

        let mut notes: Vec<NoteRef<'_>> = results
            .into_iter()
            .map(|result| NoteRef::new(result.note_key.into(), result.note))
            .collect();
        notes.sort_by(newest_first);
        if config.order == SearchOrder::Ascending {
            notes.reverse();
        }
        notes.truncate(config.limit);
        Ok(notes)
    }

    /// Returns a note as event JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no visible note has this id.
    pub fn get_by_id(&self, id: &NoteId) -> StoreResult<String> {
        let (_, note) = self.note_by_id(id)?;
        note.to_json()
    }

    /// Returns the newest profile (kind 0) note of `pubkey` as event JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the author has no visible
    /// profile.
    pub fn get_profile_by_pubkey(&self, pubkey: &Pubkey) -> StoreResult<String> {
        self.profile_by_pubkey(pubkey)?.to_json()
    }

    /// Returns the newest profile note of `pubkey`.
    pub fn profile_by_pubkey(&self, pubkey: &Pubkey) -> StoreResult<NoteRef<'_>> {
        let filter = Filter {
            authors: Some(vec![*pubkey]),
            kinds: Some(vec![KIND_METADATA]),
            limit: Some(1),
            ..Filter::default()
        };
        self.run_filter(&filter, 1, 1)?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound)
    }

    /// Searches profile names and returns matching authors, best first.
    ///
    /// A `limit` of 0 returns nothing.
    pub fn search_profile(&self, query: &str, limit: usize) -> StoreResult<Vec<Pubkey>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        let found = self
            .ndb()
            .search_profile(self.engine_txn(), query, limit)
            .map_err(|e| StoreError::query(format!("profile search failed: {e}")))?;
        Ok(found.into_iter().map(|pk| Pubkey(*pk)).collect())
    }
}

impl Store {
    /// Returns the note with `key` as event JSON, in its own transaction.
    pub fn get_note_json_by_key(&self, key: NoteKey) -> StoreResult<String> {
        let txn = self.begin_default()?;
        let json = txn.note_by_key(key)?.to_json();
        txn.end();
        json
    }

    /// Returns the note with the given hex id as event JSON, in its own
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if `id_hex` is not 64 hex characters
    /// and [`StoreError::NotFound`] if no such note is stored.
    pub fn get_note_by_id_hex(&self, id_hex: &str) -> StoreResult<String> {
        let id = NoteId::from_hex(id_hex)
            .ok_or_else(|| StoreError::query(format!("invalid note id: {id_hex}")))?;
        let txn = self.begin_default()?;
        let json = txn.get_by_id(&id);
        txn.end();
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_config_defaults_and_bounds() {
        assert_eq!(SearchConfig::from_json(None).unwrap(), SearchConfig::default());
        assert_eq!(SearchConfig::from_json(Some("")).unwrap(), SearchConfig::default());

        let config = SearchConfig::from_json(Some(r#"{"limit":5,"order":"asc"}"#)).unwrap();
        assert_eq!(config.limit, 5);
        assert_eq!(config.order, SearchOrder::Ascending);

        for limit in ["0", "-3", "1025"] {
            let json = format!(r#"{{"limit":{limit}}}"#);
            assert_eq!(SearchConfig::from_json(Some(&json)).unwrap().limit, DEFAULT_SEARCH_LIMIT);
        }
        assert!(matches!(
            SearchConfig::from_json(Some("{nope")),
            Err(StoreError::Query { .. })
        ));
    }

    #[test]
    fn unknown_order_means_newest_first() {
        let config = SearchConfig::from_json(Some(r#"{"order":"sideways"}"#)).unwrap();
        assert_eq!(config.order, SearchOrder::Descending);
    }

    #[test]
    fn engine_max_saturates() {
        assert_eq!(engine_max(10), 10);
        assert_eq!(engine_max(usize::MAX), i32::MAX);
    }
}
