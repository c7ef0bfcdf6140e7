//! Event JSON as exchanged with relays.

use crate::error::{StoreError, StoreResult};
use crate::types::NoteId;
use serde::{Deserialize, Serialize};

/// A signed Nostr event in its JSON form.
///
/// `tags` is required: the store rejects events without it. Use
/// [`crate::normalize_event_json`] to repair JSON that omits the member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 64 hex characters.
    pub id: String,
    /// 64 hex characters.
    pub pubkey: String,
    /// Unix seconds.
    pub created_at: u64,
    /// Event kind.
    pub kind: u32,
    /// Ordered tags, each an ordered list of strings.
    pub tags: Vec<Vec<String>>,
    /// UTF-8 content.
    pub content: String,
    /// 128 hex characters.
    pub sig: String,
}

impl Event {
    /// Parses event JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Ingest`] if the JSON is malformed or a field is
    /// missing or of the wrong type.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::ingest(format!("invalid event: {e}")))
    }

    /// Serializes the event to JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string(self).map_err(|e| StoreError::ingest(e.to_string()))
    }

    /// Returns the declared id, if it is 64 hex characters.
    #[must_use]
    pub fn note_id(&self) -> Option<NoteId> {
        NoteId::from_hex(&self.id)
    }
}
