//! Property-based test generators using proptest.
//!
//! [`event_strategy`] yields well-formed but unsigned events, for code that
//! only looks at the JSON. [`signed_note_strategy`] yields events the engine
//! accepts.

use crate::events::{NoteBuilder, SignedNote};
use notedb_core::Event;
use proptest::prelude::*;

/// Strategy for 64-character lowercase hex strings.
pub fn hex32_strategy() -> impl Strategy<Value = String> {
    prop::array::uniform32(any::<u8>()).prop_map(hex::encode)
}

/// Strategy for event content, including punctuation, quotes and
/// non-ASCII text.
pub fn content_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ,.!?\"'\\\\#éü🔥]{0,80}").expect("Invalid regex")
}

/// Strategy for a single tag: a short name followed by string or id
/// values.
pub fn tag_strategy() -> impl Strategy<Value = Vec<String>> {
    let name = prop::string::string_regex("[a-z]{1,3}").expect("Invalid regex");
    let value = prop_oneof![
        prop::string::string_regex("[a-zA-Z0-9 :/.]{0,24}").expect("Invalid regex"),
        hex32_strategy(),
    ];
    (name, prop::collection::vec(value, 0..4)).prop_map(|(name, values)| {
        let mut tag = vec![name];
        tag.extend(values);
        tag
    })
}

fn kind_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0u32), Just(1), Just(3), Just(7), 0u32..40_000]
}

/// Strategy for well-formed events. Ids and signatures are random.
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (
        hex32_strategy(),
        hex32_strategy(),
        any::<u32>(),
        kind_strategy(),
        prop::collection::vec(tag_strategy(), 0..6),
        content_strategy(),
        (hex32_strategy(), hex32_strategy()),
    )
        .prop_map(|(id, pubkey, created_at, kind, tags, content, (sig_a, sig_b))| Event {
            id,
            pubkey,
            created_at: u64::from(created_at),
            kind,
            tags,
            content,
            sig: sig_a + &sig_b,
        })
}

/// Strategy for event JSON that already has a `tags` member.
pub fn event_json_strategy() -> impl Strategy<Value = String> {
    event_strategy().prop_map(|event| event.to_json().expect("Failed to serialize event"))
}

/// Strategy for signed events. Each is signed with fresh keys.
pub fn signed_note_strategy() -> impl Strategy<Value = SignedNote> {
    (
        kind_strategy(),
        1u64..2_000_000_000,
        prop::collection::vec(tag_strategy(), 0..6),
        content_strategy(),
    )
        .prop_map(|(kind, created_at, tags, content)| {
            tags.iter()
                .fold(NoteBuilder::new(kind), |builder, tag| {
                    let elems: Vec<&str> = tag.iter().map(String::as_str).collect();
                    builder.tag(&elems)
                })
                .content(&content)
                .created_at(created_at)
                .sign()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_json_parses(json in event_json_strategy()) {
            prop_assert!(Event::from_json(&json).is_ok());
        }

        #[test]
        fn signed_notes_carry_their_id(note in signed_note_strategy()) {
            let event = Event::from_json(&note.json).unwrap();
            prop_assert_eq!(&event.id, &note.id);
            prop_assert!(event.note_id().is_some());
        }
    }
}
