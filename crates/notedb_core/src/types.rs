//! Core type definitions for notedb.

use std::fmt;

/// Engine-assigned key identifying a note.
///
/// Keys are never reused and stay stable across restarts, so they can be
/// kept instead of ids for cheap re-lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteKey(pub u64);

impl NoteKey {
    /// Creates a new note key.
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<nostrdb::NoteKey> for NoteKey {
    fn from(key: nostrdb::NoteKey) -> Self {
        Self(key.as_u64())
    }
}

impl From<NoteKey> for nostrdb::NoteKey {
    fn from(key: NoteKey) -> Self {
        nostrdb::NoteKey::new(key.0)
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note:{}", self.0)
    }
}

/// Identifier of a live engine subscription. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Creates a new subscription ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<SubscriptionId> for nostrdb::Subscription {
    fn from(id: SubscriptionId) -> Self {
        nostrdb::Subscription::new(id.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

macro_rules! hex_bytes32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Creates the value from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Parses 64 hex characters.
            ///
            /// Returns `None` for any other length or non-hex input.
            #[must_use]
            pub fn from_hex(s: &str) -> Option<Self> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes).ok()?;
                Some(Self(bytes))
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Returns the lowercase hex encoding.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }
    };
}

hex_bytes32!(
    /// The 32-byte SHA-256 id of an event.
    NoteId
);

hex_bytes32!(
    /// A 32-byte x-only public key.
    Pubkey
);

/// Kind of profile metadata notes.
pub const KIND_METADATA: u32 = 0;
/// Kind of short text notes.
pub const KIND_TEXT: u32 = 1;
/// Kind of contact lists.
pub const KIND_CONTACTS: u32 = 3;
/// Kind of encrypted direct messages.
pub const KIND_DM: u32 = 4;
/// Kind of reposts.
pub const KIND_REPOST: u32 = 6;
/// Kind of reactions.
pub const KIND_REACTION: u32 = 7;
/// Kind of zap receipts.
pub const KIND_ZAP: u32 = 9735;
/// Kind of long-form articles.
pub const KIND_LONG_FORM: u32 = 30023;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_key_converts_both_ways() {
        let key = NoteKey::new(42);
        let engine: nostrdb::NoteKey = key.into();
        assert_eq!(engine.as_u64(), 42);
        assert_eq!(NoteKey::from(engine), key);
        assert_eq!(key.to_string(), "note:42");
    }

    #[test]
    fn hex_roundtrip() {
        let hex = "ab".repeat(32);
        let id = NoteId::from_hex(&hex).unwrap();
        assert_eq!(id.as_bytes(), &[0xab; 32]);
        assert_eq!(id.to_hex(), hex);
    }

    #[test]
    fn hex_rejects_bad_input() {
        assert!(Pubkey::from_hex("abcd").is_none());
        assert!(Pubkey::from_hex(&"zz".repeat(32)).is_none());
        assert!(Pubkey::from_hex(&"00".repeat(33)).is_none());
    }
}
