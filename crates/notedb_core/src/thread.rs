//! Reply threading from `e` tags.
//!
//! A reply names its thread root and its direct parent with `e` tags. Tags
//! carrying a `root` or `reply` marker in their fourth element win. Without
//! markers, the first `e` tag is the root and, when there are several, the
//! last is the parent.

use crate::note::NoteRef;
use serde::Serialize;

/// The thread position of a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadRefs {
    /// Id of the thread root, as hex.
    pub root: Option<String>,
    /// Id of the note replied to, as hex.
    pub reply: Option<String>,
    /// Relay hint of the root tag.
    pub root_relay: Option<String>,
    /// Relay hint of the reply tag.
    pub reply_relay: Option<String>,
}

impl ThreadRefs {
    /// Returns true if the note names neither a root nor a parent.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.root.is_none() && self.reply.is_none()
    }
}

/// An `e` tag reduced to what threading needs.
struct EventRef<'t> {
    id: &'t str,
    relay: Option<&'t str>,
    marker: Option<&'t str>,
}

impl<'t> EventRef<'t> {
    fn from_tag(tag: &'t [String]) -> Option<Self> {
        match tag.first().map(String::as_str) {
            Some("e" | "E") => {}
            _ => return None,
        }
        let id = tag.get(1)?;
        if id.len() != 64 {
            return None;
        }
        let nonempty = |i: usize| tag.get(i).map(String::as_str).filter(|s| !s.is_empty());
        Some(Self {
            id,
            relay: nonempty(2),
            marker: nonempty(3),
        })
    }
}

/// Extracts thread refs from tags given as strings.
#[must_use]
pub fn thread_refs_from_tags(tags: &[Vec<String>]) -> ThreadRefs {
    let refs: Vec<EventRef<'_>> = tags.iter().filter_map(|t| EventRef::from_tag(t)).collect();

    let mut root = None;
    let mut reply = None;
    for r in &refs {
        match r.marker {
            Some("root") => root = Some(r),
            Some("reply") => reply = Some(r),
            _ => {}
        }
    }
    if root.is_none() {
        root = refs.first();
    }
    if reply.is_none() && refs.len() >= 2 {
        reply = refs.last();
    }

    ThreadRefs {
        root: root.map(|r| r.id.to_string()),
        reply: reply.map(|r| r.id.to_string()),
        root_relay: root.and_then(|r| r.relay).map(str::to_string),
        reply_relay: reply.and_then(|r| r.relay).map(str::to_string),
    }
}

/// Returns the root and parent ids of `note`, without relay hints.
#[must_use]
pub fn nip10_thread(note: &NoteRef<'_>) -> ThreadRefs {
    ThreadRefs {
        root_relay: None,
        reply_relay: None,
        ..nip10_thread_full(note)
    }
}

/// Returns the root and parent of `note` with their relay hints.
#[must_use]
pub fn nip10_thread_full(note: &NoteRef<'_>) -> ThreadRefs {
    let tags: Vec<Vec<String>> = note
        .tags()
        .filter(|tag| matches!(tag.name(), Some("e" | "E")))
        .map(|tag| tag.elems().map(|e| e.to_json_str().into_owned()).collect())
        .collect();
    thread_refs_from_tags(&tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: &str) -> String {
        byte.repeat(32)
    }

    fn tag(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn markers_win_over_position() {
        let (a, b, c) = (id("aa"), id("bb"), id("cc"));
        let tags = vec![
            tag(&["e", &a, "", "mention"]),
            tag(&["e", &b, "wss://root.example", "root"]),
            tag(&["e", &c, "wss://reply.example", "reply"]),
            tag(&["p", &a]),
        ];
        let refs = thread_refs_from_tags(&tags);
        assert_eq!(refs.root.as_deref(), Some(b.as_str()));
        assert_eq!(refs.reply.as_deref(), Some(c.as_str()));
        assert_eq!(refs.root_relay.as_deref(), Some("wss://root.example"));
        assert_eq!(refs.reply_relay.as_deref(), Some("wss://reply.example"));
    }

    #[test]
    fn positional_fallback() {
        let (a, b, c) = (id("aa"), id("bb"), id("cc"));
        let refs = thread_refs_from_tags(&[tag(&["e", &a]), tag(&["e", &b]), tag(&["e", &c])]);
        assert_eq!(refs.root.as_deref(), Some(a.as_str()));
        assert_eq!(refs.reply.as_deref(), Some(c.as_str()));
    }

    #[test]
    fn single_unmarked_tag_is_root_only() {
        let a = id("aa");
        let refs = thread_refs_from_tags(&[tag(&["e", &a, "wss://r.example"])]);
        assert_eq!(refs.root.as_deref(), Some(a.as_str()));
        assert_eq!(refs.root_relay.as_deref(), Some("wss://r.example"));
        assert!(refs.reply.is_none());
    }

    #[test]
    fn reply_marker_alone_keeps_first_tag_as_root() {
        let (a, b) = (id("aa"), id("bb"));
        let refs = thread_refs_from_tags(&[tag(&["e", &a]), tag(&["e", &b, "", "reply"])]);
        assert_eq!(refs.root.as_deref(), Some(a.as_str()));
        assert_eq!(refs.reply.as_deref(), Some(b.as_str()));
        assert!(refs.reply_relay.is_none());
    }

    #[test]
    fn last_marker_wins_and_uppercase_counts() {
        let (a, b) = (id("aa"), id("bb"));
        let refs = thread_refs_from_tags(&[
            tag(&["E", &a, "", "root"]),
            tag(&["e", &b, "", "root"]),
        ]);
        assert_eq!(refs.root.as_deref(), Some(b.as_str()));
    }

    #[test]
    fn short_ids_and_other_tags_are_ignored() {
        let refs = thread_refs_from_tags(&[
            tag(&["e", "abc"]),
            tag(&["q", &id("aa")]),
            tag(&["e"]),
        ]);
        assert!(refs.is_top_level());
        assert_eq!(refs, ThreadRefs::default());
    }
}
