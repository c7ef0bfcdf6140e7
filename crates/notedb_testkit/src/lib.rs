//! # notedb testkit
//!
//! Test utilities for notedb.
//!
//! This crate provides:
//! - Temporary stores that clean up after themselves
//! - A builder for signed events the engine accepts
//! - Property-based test generators using proptest
//! - Concurrent ingest and read stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notedb_testkit::prelude::*;
//!
//! #[test]
//! fn finds_reaction() {
//!     with_temp_store(|store| {
//!         let note = NoteBuilder::text("gm").sign();
//!         store.ingest_one_sync(&NoteBuilder::reaction(&note.id, "+").json(), None).unwrap();
//!         assert_eq!(store.count_reactions(&note.id).unwrap(), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod events;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::events::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use nostr::Keys;
}

pub use events::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;

/// Signing keys, for events that share an author.
pub use nostr::Keys;
