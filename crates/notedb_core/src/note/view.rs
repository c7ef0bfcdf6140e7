//! Zero-copy note views.

use crate::error::{StoreError, StoreResult};
use crate::types::{NoteId, NoteKey, Pubkey};
use nostrdb::{NdbStr, NdbStrVariant};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Tags longer than this are serialized as an empty array by [`tags_json`].
pub const MAX_TAG_ELEMENTS_SERIALIZED: usize = 100;

/// A note borrowed from a transaction's snapshot.
///
/// The lifetime ties the view to the [`crate::Transaction`] it came from.
/// Ending the transaction consumes it, so a `NoteRef` cannot outlive it:
///
/// ```compile_fail
/// # use notedb_core::{Config, Store, NoteKey};
/// # let dir = tempfile::tempdir().unwrap();
/// # let store = Store::open(dir.path(), Config::default()).unwrap();
/// let txn = store.begin().unwrap();
/// let note = txn.note_by_key(NoteKey::new(1)).unwrap();
/// txn.end();
/// println!("{}", note.content());
/// ```
pub struct NoteRef<'a> {
    key: NoteKey,
    note: nostrdb::Note<'a>,
}

impl<'a> NoteRef<'a> {
    pub(crate) fn new(key: NoteKey, note: nostrdb::Note<'a>) -> Self {
        Self { key, note }
    }

    pub(crate) fn engine_note(&self) -> &nostrdb::Note<'a> {
        &self.note
    }

    /// Returns the note's key.
    #[must_use]
    pub fn key(&self) -> NoteKey {
        self.key
    }

    /// Returns the raw 32-byte id.
    #[must_use]
    pub fn id(&self) -> &'a [u8; 32] {
        self.note.id()
    }

    /// Returns the id as a [`NoteId`].
    #[must_use]
    pub fn note_id(&self) -> NoteId {
        NoteId(*self.id())
    }

    /// Returns the raw 32-byte author key.
    #[must_use]
    pub fn pubkey(&self) -> &'a [u8; 32] {
        self.note.pubkey()
    }

    /// Returns the author as a [`Pubkey`].
    #[must_use]
    pub fn author(&self) -> Pubkey {
        Pubkey(*self.pubkey())
    }

    /// Returns the raw 64-byte signature.
    #[must_use]
    pub fn sig(&self) -> &'a [u8; 64] {
        self.note.sig()
    }

    /// Returns the creation time in unix seconds.
    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.note.created_at()
    }

    /// Returns the event kind.
    #[must_use]
    pub fn kind(&self) -> u32 {
        self.note.kind()
    }

    /// Returns the content.
    #[must_use]
    pub fn content(&self) -> &'a str {
        self.note.content()
    }

    /// Returns the content length in bytes.
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.content().len()
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.note.tags().count() as usize
    }

    /// Iterates over the tags in order.
    pub fn tags(&self) -> impl Iterator<Item = TagRef<'a>> + '_ {
        self.note.tags().into_iter().map(|tag| TagRef { tag })
    }

    /// Iterates over the values of `t` tags.
    pub fn hashtags(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.tags()
            .filter(|tag| tag.name() == Some("t"))
            .filter_map(|tag| tag.get(1).and_then(|elem| elem.as_str()))
    }

    /// Returns the value of the last tag named `name`.
    ///
    /// For a reaction, `last_tag_value("e")` is the note reacted to.
    #[must_use]
    pub fn last_tag_value(&self, name: &str) -> Option<TagElem<'a>> {
        self.tags()
            .filter(|tag| tag.name() == Some(name))
            .filter_map(|tag| tag.get(1))
            .last()
    }

    /// Returns the value of the first tag named `name`.
    #[must_use]
    pub fn first_tag_value(&self, name: &str) -> Option<TagElem<'a>> {
        self.tags()
            .filter(|tag| tag.name() == Some(name))
            .find_map(|tag| tag.get(1))
    }

    /// Serializes the note as event JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        #[derive(Serialize)]
        struct NoteJson<'a> {
            id: String,
            pubkey: String,
            created_at: u64,
            kind: u32,
            tags: Vec<Vec<Cow<'a, str>>>,
            content: &'a str,
            sig: String,
        }

        let json = NoteJson {
            id: hex::encode(self.id()),
            pubkey: hex::encode(self.pubkey()),
            created_at: self.created_at(),
            kind: self.kind(),
            tags: self
                .tags()
                .map(|tag| tag.elems().map(|elem| elem.to_json_str()).collect())
                .collect(),
            content: self.content(),
            sig: hex::encode(self.sig()),
        };
        serde_json::to_string(&json).map_err(|e| StoreError::query(e.to_string()))
    }
}

impl fmt::Debug for NoteRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteRef")
            .field("key", &self.key)
            .field("id", &hex::encode(self.id()))
            .field("kind", &self.kind())
            .field("created_at", &self.created_at())
            .finish_non_exhaustive()
    }
}

/// Serializes a note's tags as a JSON array of arrays.
///
/// Strings are emitted as JSON strings and packed ids as 64 lowercase hex
/// characters. A tag with more than [`MAX_TAG_ELEMENTS_SERIALIZED`] elements
/// is emitted as `[]`.
#[must_use]
pub fn tags_json(note: &NoteRef<'_>) -> String {
    let tags = note
        .tags()
        .map(|tag| {
            if tag.len() > MAX_TAG_ELEMENTS_SERIALIZED {
                return Value::Array(Vec::new());
            }
            Value::Array(
                tag.elems()
                    .map(|elem| Value::String(elem.to_json_str().into_owned()))
                    .collect(),
            )
        })
        .collect();
    Value::Array(tags).to_string()
}

/// One tag: an ordered list of elements.
pub struct TagRef<'a> {
    tag: nostrdb::Tag<'a>,
}

impl<'a> TagRef<'a> {
    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tag.count() as usize
    }

    /// Returns true if the tag has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tag.count() == 0
    }

    /// Iterates over the elements.
    pub fn elems(&self) -> impl Iterator<Item = TagElem<'a>> + '_ {
        (0..self.tag.count()).filter_map(move |i| self.tag.get(i).map(TagElem::from))
    }

    /// Returns the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<TagElem<'a>> {
        let index = u16::try_from(index).ok()?;
        self.tag.get(index).map(TagElem::from)
    }

    /// Returns the first element if it is a string.
    #[must_use]
    pub fn name(&self) -> Option<&'a str> {
        self.get(0).and_then(|elem| elem.as_str())
    }
}

impl fmt::Debug for TagRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.elems()).finish()
    }
}

/// A single tag element.
///
/// The engine packs 64-character lowercase hex values into 32 raw bytes;
/// everything else stays a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagElem<'a> {
    /// A UTF-8 string.
    Str(&'a str),
    /// A packed 32-byte id.
    Id(&'a [u8; 32]),
}

impl<'a> TagElem<'a> {
    /// Returns the string, if this is a string element.
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Id(_) => None,
        }
    }

    /// Returns the packed id, if this is an id element.
    #[must_use]
    pub fn as_id(&self) -> Option<&'a [u8; 32]> {
        match self {
            Self::Id(id) => Some(id),
            Self::Str(_) => None,
        }
    }

    /// Returns the element as it appears in event JSON.
    #[must_use]
    pub fn to_json_str(&self) -> Cow<'a, str> {
        match self {
            Self::Str(s) => Cow::Borrowed(s),
            Self::Id(id) => Cow::Owned(hex::encode(id)),
        }
    }

    /// Returns the element as 32 raw bytes, decoding hex strings.
    #[must_use]
    pub fn to_id(&self) -> Option<[u8; 32]> {
        match self {
            Self::Id(id) => Some(**id),
            Self::Str(s) => NoteId::from_hex(s).map(|id| id.0),
        }
    }
}

impl<'a> From<NdbStr<'a>> for TagElem<'a> {
    fn from(elem: NdbStr<'a>) -> Self {
        match elem.variant() {
            NdbStrVariant::Id(id) => Self::Id(id),
            NdbStrVariant::Str(s) => Self::Str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_elements_render_as_lowercase_hex() {
        let raw = [0x5c; 32];
        let elem = TagElem::Id(&raw);
        assert_eq!(elem.to_json_str(), "5c".repeat(32));
        assert_eq!(elem.as_id(), Some(&raw));
        assert!(elem.as_str().is_none());
    }

    #[test]
    fn string_elements_borrow() {
        let elem = TagElem::Str("nostr");
        assert!(matches!(elem.to_json_str(), Cow::Borrowed("nostr")));
        assert_eq!(elem.as_str(), Some("nostr"));
        assert!(elem.as_id().is_none());
    }

    #[test]
    fn to_id_decodes_hex_strings() {
        let hex = "ab".repeat(32);
        assert_eq!(TagElem::Str(&hex).to_id(), Some([0xab; 32]));
        assert_eq!(TagElem::Str("not hex").to_id(), None);
        assert_eq!(TagElem::Id(&[7; 32]).to_id(), Some([7; 32]));
    }
}
