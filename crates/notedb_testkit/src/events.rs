//! Event construction for tests.
//!
//! Events are signed with real keys, so they pass the engine's id and
//! signature checks. [`NoteBuilder::bad_sig_json`] produces one that does
//! not.

use nostr::prelude::{EventBuilder, JsonUtil, Keys, Kind, Tag, TagKind, Timestamp};
use notedb_core::{
    KIND_CONTACTS, KIND_LONG_FORM, KIND_METADATA, KIND_REACTION, KIND_TEXT, KIND_ZAP,
};
use std::borrow::Cow;

/// Returns the hex pubkey of fresh random keys.
pub fn random_pubkey() -> String {
    Keys::generate().public_key().to_hex()
}

/// Builds signed events.
///
/// Defaults to fresh keys, the current time and no tags.
#[derive(Debug, Clone)]
pub struct NoteBuilder {
    keys: Keys,
    created_at: Option<u64>,
    kind: u32,
    tags: Vec<Vec<String>>,
    content: String,
}

/// A signed event as JSON plus the fields tests usually need.
#[derive(Debug, Clone)]
pub struct SignedNote {
    /// Event id as hex.
    pub id: String,
    /// Author as hex.
    pub pubkey: String,
    /// Event JSON.
    pub json: String,
}

impl NoteBuilder {
    /// Starts an event of `kind`.
    pub fn new(kind: u32) -> Self {
        Self {
            keys: Keys::generate(),
            created_at: None,
            kind,
            tags: Vec::new(),
            content: String::new(),
        }
    }

    /// A text note.
    pub fn text(content: &str) -> Self {
        Self::new(KIND_TEXT).content(content)
    }

    /// A long-form article.
    pub fn article(content: &str) -> Self {
        Self::new(KIND_LONG_FORM).content(content)
    }

    /// A reaction to `target_id` (hex).
    pub fn reaction(target_id: &str, content: &str) -> Self {
        Self::new(KIND_REACTION).content(content).tag(&["e", target_id])
    }

    /// A profile with metadata JSON as content.
    pub fn metadata(metadata_json: &str) -> Self {
        Self::new(KIND_METADATA).content(metadata_json)
    }

    /// A contact list following `pubkeys` (hex).
    pub fn contacts(pubkeys: &[&str]) -> Self {
        pubkeys
            .iter()
            .fold(Self::new(KIND_CONTACTS), |b, pk| b.tag(&["p", pk]))
    }

    /// A zap receipt for `target_id` carrying `bolt11` and, if given, the
    /// zap request JSON as its `description`.
    pub fn zap_receipt(target_id: &str, bolt11: &str, request_json: Option<&str>) -> Self {
        let builder = Self::new(KIND_ZAP)
            .tag(&["e", target_id])
            .tag(&["bolt11", bolt11]);
        match request_json {
            Some(request) => builder.tag(&["description", request]),
            None => builder,
        }
    }

    /// Signs with `keys`.
    pub fn keys(mut self, keys: &Keys) -> Self {
        self.keys = keys.clone();
        self
    }

    /// Sets `created_at`.
    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the content.
    pub fn content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    /// Appends a tag.
    pub fn tag(mut self, elems: &[&str]) -> Self {
        self.tags.push(elems.iter().map(|e| (*e).to_string()).collect());
        self
    }

    /// Appends an `expiration` tag.
    pub fn expires_at(self, timestamp: u64) -> Self {
        self.tag(&["expiration", &timestamp.to_string()])
    }

    /// Signs the event.
    pub fn sign(self) -> SignedNote {
        let kind = u16::try_from(self.kind).expect("Kind out of range");
        let mut builder = EventBuilder::new(Kind::from(kind), self.content);
        for tag in self.tags {
            let mut elems = tag.into_iter();
            let name = elems.next().expect("Tags need a name");
            builder = builder.tag(Tag::custom(
                TagKind::Custom(Cow::Owned(name)),
                elems.collect::<Vec<String>>(),
            ));
        }
        if let Some(created_at) = self.created_at {
            builder = builder.custom_created_at(Timestamp::from(created_at));
        }
        let event = builder.sign_with_keys(&self.keys).expect("Failed to sign event");
        SignedNote {
            id: event.id.to_hex(),
            pubkey: event.pubkey.to_hex(),
            json: event.as_json(),
        }
    }

    /// Signs the event and returns its JSON.
    pub fn json(self) -> String {
        self.sign().json
    }

    /// Returns event JSON whose id is right but whose signature is not.
    pub fn bad_sig_json(self) -> String {
        let json = self.json();
        let mut value: serde_json::Value = serde_json::from_str(&json).expect("Invalid event JSON");
        let sig = value["sig"].as_str().expect("Event has no sig").to_string();
        let flipped = if sig.starts_with('0') { "1" } else { "0" };
        value["sig"] = serde_json::Value::String(format!("{flipped}{}", &sig[1..]));
        value.to_string()
    }
}

/// Removes the `tags` member from event JSON, as some relays send it.
pub fn strip_tags(event_json: &str) -> String {
    let mut value: serde_json::Value =
        serde_json::from_str(event_json).expect("Invalid event JSON");
    if let Some(object) = value.as_object_mut() {
        object.remove("tags");
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notedb_core::Event;

    #[test]
    fn signed_events_parse() {
        let note = NoteBuilder::text("hello").created_at(42).sign();
        let event = Event::from_json(&note.json).unwrap();
        assert_eq!(event.id, note.id);
        assert_eq!(event.pubkey, note.pubkey);
        assert_eq!(event.created_at, 42);
        assert_eq!(event.sig.len(), 128);
    }

    #[test]
    fn reaction_references_target() {
        let target = NoteBuilder::text("post").sign();
        let json = NoteBuilder::reaction(&target.id, "🔥").json();
        let event = Event::from_json(&json).unwrap();
        assert_eq!(event.kind, KIND_REACTION);
        assert_eq!(event.tags, vec![vec!["e".to_string(), target.id]]);
    }

    #[test]
    fn same_keys_same_author() {
        let keys = Keys::generate();
        let a = NoteBuilder::text("a").keys(&keys).sign();
        let b = NoteBuilder::text("b").keys(&keys).sign();
        assert_eq!(a.pubkey, b.pubkey);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn bad_sig_keeps_id() {
        let builder = NoteBuilder::text("x").created_at(7).keys(&Keys::generate());
        let good = Event::from_json(&builder.clone().json()).unwrap();
        let bad = Event::from_json(&builder.bad_sig_json()).unwrap();
        assert_eq!(good.id, bad.id);
        assert_ne!(good.sig, bad.sig);
    }

    #[test]
    fn strip_tags_removes_member() {
        let json = strip_tags(&NoteBuilder::text("x").tag(&["t", "y"]).json());
        assert!(!json.contains("\"tags\""));
    }
}
