//! Event ingestion.
//!
//! Events are handed to the engine, whose ingester threads verify them and
//! whose writer stores them. Submission returns as soon as the engine has
//! queued the event; it becomes visible to transactions begun after the
//! writer commits it.

use crate::error::{StoreError, StoreResult};
use crate::note::Event;
use crate::store::Store;
use crate::types::{NoteId, NoteKey};
use nostrdb::{IngestMetadata, Ndb};
use std::borrow::Cow;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TAGS_SPLICE: &str = "\"tags\":[],";

/// Delay between lookups while `ingest_one_sync` waits for the writer.
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Inserts an empty `"tags"` member into event JSON that lacks one.
///
/// This is a textual splice, not a parse: find `"kind"`, find the next
/// comma after it, and insert `"tags":[],` right after that comma. The
/// input is returned unchanged if it already has a `"tags"` member or has
/// no `"kind"` followed by a comma. A `"tags"` string that is not followed
/// by a colon, such as a content value, does not count as a member.
///
/// ```
/// use notedb_core::normalize_event_json;
///
/// assert_eq!(
///     normalize_event_json(r#"{"kind":1,"content":"hi"}"#),
///     r#"{"kind":1,"tags":[],"content":"hi"}"#
/// );
/// ```
#[must_use]
pub fn normalize_event_json(json: &str) -> Cow<'_, str> {
    if has_tags_member(json) {
        return Cow::Borrowed(json);
    }
    let Some(kind_at) = json.find("\"kind\"") else {
        return Cow::Borrowed(json);
    };
    let Some(comma) = json[kind_at..].find(',') else {
        return Cow::Borrowed(json);
    };

    let split = kind_at + comma + 1;
    let mut out = String::with_capacity(json.len() + TAGS_SPLICE.len());
    out.push_str(&json[..split]);
    out.push_str(TAGS_SPLICE);
    out.push_str(&json[split..]);
    Cow::Owned(out)
}

/// True if `"tags"` appears as a member name: followed, after optional
/// whitespace, by a colon.
fn has_tags_member(json: &str) -> bool {
    const KEY: &str = "\"tags\"";
    json.match_indices(KEY)
        .any(|(at, _)| json[at + KEY.len()..].trim_start().starts_with(':'))
}

/// Hands one event to the engine, tagged with the relay it came from.
fn submit(ndb: &Ndb, event_json: &str, source: Option<&str>) -> StoreResult<()> {
    let result = match source {
        Some(relay) => ndb.process_event_with(
            &format!("[\"EVENT\",\"notedb\",{event_json}]"),
            IngestMetadata::new().client(false).relay(relay),
        ),
        None => ndb.process_client_event(&format!("[\"EVENT\",{event_json}]")),
    };
    result.map_err(|e| StoreError::ingest(format!("engine refused event: {e}")))
}

/// Looks the id up in a fresh engine snapshot.
fn stored_key(ndb: &Ndb, id: &NoteId) -> Option<NoteKey> {
    let txn = nostrdb::Transaction::new(ndb).ok()?;
    ndb.get_notekey_by_id(&txn, id.as_bytes()).ok().map(NoteKey::from)
}

impl Store {
    /// Hands newline-delimited event JSON to the engine without repairing
    /// it.
    ///
    /// Returns the number of lines handed over. Blank lines are skipped.
    /// Lines the engine later fails to verify are dropped on its ingester
    /// threads and never become visible. The ingest counters of
    /// [`Store::ingest_count`] are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Ingest`] if the buffer is not UTF-8 or if the
    /// engine refused any line outright, and [`StoreError::Closed`] after
    /// close.
    pub fn ingest_batch(&self, ldjson: &[u8]) -> StoreResult<usize> {
        self.ensure_open()?;
        let text = std::str::from_utf8(ldjson)
            .map_err(|e| StoreError::ingest(format!("batch is not UTF-8: {e}")))?;
        let ndb = self.ndb()?;

        let mut handed = 0;
        let mut refused = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match submit(&ndb, line, None) {
                Ok(()) => handed += 1,
                Err(e) => {
                    self.shared().stats.record_rejected();
                    warn!(line = line_no + 1, error = %e, "batch line refused");
                    refused.push(line_no + 1);
                }
            }
        }
        self.shared().stats.record_batch_lines(handed as u64);
        debug!(lines = handed, refused = refused.len(), "handed ingest batch to engine");

        if refused.is_empty() {
            Ok(handed)
        } else {
            Err(StoreError::ingest(format!(
                "engine refused {} of {} lines (first: line {})",
                refused.len(),
                handed + refused.len(),
                refused[0]
            )))
        }
    }

    /// Repairs, checks and submits a single event.
    ///
    /// `source` is the relay the event came from, if any; it is stored with
    /// the note. Returns once the engine has queued the event, not once it
    /// is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Ingest`] if the repaired JSON does not parse
    /// as an event or the engine refuses it.
    pub fn ingest_one(&self, event_json: &str, source: Option<&str>) -> StoreResult<()> {
        self.ensure_open()?;
        let json = normalize_event_json(event_json);
        self.parse_event(&json)?;
        self.submit_counted(&json, source)
    }

    /// Like [`Store::ingest_one`], but waits until the note is stored. The
    /// note is visible to any transaction begun after this returns.
    ///
    /// Returns the note's key, or the existing key if it was a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Ingest`] if the event is malformed, or if it is
    /// not stored within the configured `sync_ingest_timeout`, which is how
    /// an event failing id or signature verification shows up.
    pub fn ingest_one_sync(&self, event_json: &str, source: Option<&str>) -> StoreResult<NoteKey> {
        self.ensure_open()?;
        let json = normalize_event_json(event_json);
        let event = self.parse_event(&json)?;
        let id = event.note_id().ok_or_else(|| {
            self.shared().stats.record_rejected();
            StoreError::ingest("event id is not 64 hex characters")
        })?;

        self.submit_counted(&json, source)?;

        let ndb = self.ndb()?;
        let timeout = self.config().sync_ingest_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(key) = stored_key(&ndb, &id) {
                return Ok(key);
            }
            if Instant::now() >= deadline {
                self.shared().stats.record_rejected();
                warn!(%id, ?timeout, "event not stored before deadline");
                return Err(StoreError::ingest(format!(
                    "event {id} was not stored within {timeout:?}"
                )));
            }
            thread::sleep(SYNC_POLL_INTERVAL);
        }
    }

    /// Returns the number of events accepted by [`Store::ingest_one`] and
    /// [`Store::ingest_one_sync`].
    #[must_use]
    pub fn ingest_count(&self) -> u64 {
        self.shared().stats.ingested()
    }

    /// Returns the bytes of event JSON accepted by [`Store::ingest_one`] and
    /// [`Store::ingest_one_sync`].
    #[must_use]
    pub fn ingest_bytes(&self) -> u64 {
        self.shared().stats.ingested_bytes()
    }

    fn submit_counted(&self, json: &str, source: Option<&str>) -> StoreResult<()> {
        let ndb = self.ndb()?;
        submit(&ndb, json, source).inspect_err(|e| {
            self.shared().stats.record_rejected();
            debug!(error = %e, "engine refused event");
        })?;
        self.shared().stats.record_ingest(json.len() as u64);
        Ok(())
    }

    fn parse_event(&self, json: &str) -> StoreResult<Event> {
        Event::from_json(json).inspect_err(|e| {
            self.shared().stats.record_rejected();
            debug!(error = %e, "event JSON rejected");
        })
    }
}
