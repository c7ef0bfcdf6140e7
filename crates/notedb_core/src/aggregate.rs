//! Reaction tallies, follow lists and expiration checks.
//!
//! Everything here is built on transactions and filter queries; nothing
//! reaches into the engine directly.

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::note::NoteRef;
use crate::store::Store;
use crate::types::{NoteId, NoteKey, Pubkey, KIND_CONTACTS, KIND_REACTION};
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reaction content treated as a like when a reaction's content is empty.
pub const DEFAULT_REACTION: &str = "+";

/// Most notes a single tally looks at.
pub const AGGREGATE_SCAN_LIMIT: usize = 10_000;

/// Reactions to one note, grouped by content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReactionBreakdown {
    /// Count per reaction content.
    pub counts: HashMap<String, usize>,
    /// Reacting pubkeys as hex, one entry per reaction, if requested.
    pub reactors: Vec<String>,
}

impl ReactionBreakdown {
    /// Returns the total number of reactions.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

pub(crate) fn parse_id(id_hex: &str) -> StoreResult<NoteId> {
    NoteId::from_hex(id_hex).ok_or_else(|| StoreError::query(format!("invalid note id: {id_hex}")))
}

pub(crate) fn parse_pubkey(pubkey_hex: &str) -> StoreResult<Pubkey> {
    Pubkey::from_hex(pubkey_hex)
        .ok_or_else(|| StoreError::query(format!("invalid pubkey: {pubkey_hex}")))
}

pub(crate) fn filter(value: &serde_json::Value) -> StoreResult<Filter> {
    Filter::parse(&value.to_string())
}

pub(crate) fn parse_ids(event_ids_hex: &[&str]) -> StoreResult<Vec<String>> {
    event_ids_hex
        .iter()
        .map(|id| parse_id(id).map(|id| id.to_hex()))
        .collect()
}

impl Store {
    /// Counts reactions (kind 7) whose `e` tags reference `event_id_hex`.
    pub fn count_reactions(&self, event_id_hex: &str) -> StoreResult<usize> {
        let id = parse_id(event_id_hex)?;
        let filter = filter(&json!({ "kinds": [KIND_REACTION], "#e": [id.to_hex()] }))?;

        let txn = self.begin_default()?;
        let count = txn.scan_notes(&filter, AGGREGATE_SCAN_LIMIT)?.len();
        txn.end();
        Ok(count)
    }

    /// Returns true if `user_pubkey_hex` reacted to `event_id_hex`.
    pub fn user_has_reacted(&self, event_id_hex: &str, user_pubkey_hex: &str) -> StoreResult<bool> {
        let id = parse_id(event_id_hex)?;
        let user = parse_pubkey(user_pubkey_hex)?;
        let filter = filter(&json!({
            "kinds": [KIND_REACTION],
            "#e": [id.to_hex()],
            "authors": [user.to_hex()],
            "limit": 1,
        }))?;

        let txn = self.begin_default()?;
        let reacted = !txn.query_notes(&[filter])?.is_empty();
        txn.end();
        Ok(reacted)
    }

    /// Groups the reactions to `event_id_hex` by content.
    ///
    /// Empty content counts as [`DEFAULT_REACTION`]. With
    /// `collect_reactors`, the author of every reaction is listed, repeats
    /// included.
    pub fn reaction_breakdown(
        &self,
        event_id_hex: &str,
        collect_reactors: bool,
    ) -> StoreResult<ReactionBreakdown> {
        let id = parse_id(event_id_hex)?;
        let filter = filter(&json!({ "kinds": [KIND_REACTION], "#e": [id.to_hex()] }))?;

        let txn = self.begin_default()?;
        let mut breakdown = ReactionBreakdown::default();
        for note in txn.scan_notes(&filter, AGGREGATE_SCAN_LIMIT)? {
            let content = match note.content() {
                "" => DEFAULT_REACTION,
                other => other,
            };
            *breakdown.counts.entry(content.to_string()).or_insert(0) += 1;
            if collect_reactors {
                breakdown.reactors.push(note.author().to_hex());
            }
        }
        txn.end();
        Ok(breakdown)
    }

    /// Counts reactions to several notes with a single query.
    ///
    /// A reaction is credited to the note named by its last `e` tag. Every
    /// requested id appears in the result, with zero if it has none.
    pub fn count_reactions_batch(&self, event_ids_hex: &[&str]) -> StoreResult<HashMap<String, usize>> {
        let ids = parse_ids(event_ids_hex)?;
        let mut counts: HashMap<String, usize> = ids.iter().map(|id| (id.clone(), 0)).collect();
        if ids.is_empty() {
            return Ok(counts);
        }

        let filter = filter(&json!({ "kinds": [KIND_REACTION], "#e": ids }))?;
        let txn = self.begin_default()?;
        for note in txn.scan_notes(&filter, AGGREGATE_SCAN_LIMIT)? {
            let Some(target) = note.last_tag_value("e") else {
                continue;
            };
            if let Some(count) = counts.get_mut(&*target.to_json_str()) {
                *count += 1;
            }
        }
        txn.end();
        Ok(counts)
    }

    /// Returns which of `event_ids_hex` `user_pubkey_hex` reacted to, with a
    /// single query.
    ///
    /// A reaction is credited to the note named by its last `e` tag. Ids
    /// without a reaction from the user are absent from the result.
    pub fn user_has_reacted_batch(
        &self,
        event_ids_hex: &[&str],
        user_pubkey_hex: &str,
    ) -> StoreResult<HashSet<String>> {
        let ids = parse_ids(event_ids_hex)?;
        let user = parse_pubkey(user_pubkey_hex)?;
        let mut reacted = HashSet::new();
        if ids.is_empty() {
            return Ok(reacted);
        }

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let filter = filter(&json!({
            "kinds": [KIND_REACTION],
            "#e": ids,
            "authors": [user.to_hex()],
        }))?;
        let txn = self.begin_default()?;
        for note in txn.scan_notes(&filter, AGGREGATE_SCAN_LIMIT)? {
            if let Some(target) = note.last_tag_value("e") {
                let target = target.to_json_str();
                if wanted.contains(&*target) {
                    reacted.insert(target.into_owned());
                }
            }
        }
        txn.end();
        Ok(reacted)
    }

    /// Returns the `p` tags of the newest contact list (kind 3) of
    /// `user_pubkey_hex`, in order and without repeats.
    pub fn followed_pubkeys(&self, user_pubkey_hex: &str) -> StoreResult<Vec<String>> {
        let user = parse_pubkey(user_pubkey_hex)?;
        let filter = filter(&json!({
            "kinds": [KIND_CONTACTS],
            "authors": [user.to_hex()],
            "limit": 1,
        }))?;

        let txn = self.begin_default()?;
        let mut follows: Vec<String> = Vec::new();
        if let Some(contacts) = txn.scan_notes(&filter, 1)?.first() {
            for tag in contacts.tags().filter(|t| t.name() == Some("p")) {
                if let Some(pubkey) = tag.get(1).map(|e| e.to_json_str().into_owned()) {
                    if !follows.contains(&pubkey) {
                        follows.push(pubkey);
                    }
                }
            }
        }
        txn.end();
        Ok(follows)
    }

    /// Searches profile names, returning up to `limit` authors as hex.
    pub fn search_profile(&self, query: &str, limit: usize) -> StoreResult<Vec<String>> {
        let txn = self.begin_default()?;
        let found = txn.search_profile(query, limit)?;
        txn.end();
        Ok(found.iter().map(Pubkey::to_hex).collect())
    }

    /// Returns true if the note with `key` carries an expiration in the
    /// past. Unknown keys are not expired.
    pub fn is_event_expired_by_key(&self, key: NoteKey) -> StoreResult<bool> {
        let txn = self.begin_default()?;
        let expired = match txn.note_by_key(key) {
            Ok(note) => is_expired(&note),
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };
        txn.end();
        Ok(expired)
    }
}

/// Returns the timestamp of the note's first `expiration` tag, or 0 if it
/// has none or the value is not an integer.
#[must_use]
pub fn note_expiration(note: &NoteRef<'_>) -> u64 {
    note.tags()
        .find(|tag| tag.name() == Some("expiration"))
        .and_then(|tag| tag.get(1))
        .and_then(|value| value.as_str()?.trim().parse().ok())
        .unwrap_or(0)
}

/// Returns true if the note expired before `now` (unix seconds).
#[must_use]
pub fn is_expired_at(note: &NoteRef<'_>, now: u64) -> bool {
    let expiration = note_expiration(note);
    expiration != 0 && expiration < now
}

/// Returns true if the note has already expired.
#[must_use]
pub fn is_expired(note: &NoteRef<'_>) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    is_expired_at(note, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn breakdown_total_sums_counts() {
        let mut breakdown = ReactionBreakdown::default();
        breakdown.counts.insert("+".into(), 2);
        breakdown.counts.insert("🔥".into(), 1);
        assert_eq!(breakdown.total(), 3);
    }

    #[test]
    fn invalid_hex_is_query_error() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), crate::Config::default()).unwrap();
        let target = "11".repeat(32);

        assert!(matches!(store.count_reactions("zz"), Err(StoreError::Query { .. })));
        assert!(matches!(
            store.user_has_reacted(&target, "abc"),
            Err(StoreError::Query { .. })
        ));
        assert!(matches!(
            store.user_has_reacted_batch(&[target.as_str(), "nope"], &target),
            Err(StoreError::Query { .. })
        ));
    }

    #[test]
    fn empty_batches_skip_the_store() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), crate::Config::default()).unwrap();
        let user = "22".repeat(32);

        assert!(store.count_reactions_batch(&[]).unwrap().is_empty());
        assert!(store.user_has_reacted_batch(&[], &user).unwrap().is_empty());
        assert_eq!(store.stats().transactions_started, 0);
    }

    #[test]
    fn unknown_key_is_not_expired() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path(), crate::Config::default()).unwrap();
        assert!(!store.is_event_expired_by_key(NoteKey::new(999)).unwrap());
    }
}
