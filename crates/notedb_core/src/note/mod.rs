//! Notes: parsed event JSON and views over engine records.
//!
//! Ingest checks [`Event`] JSON before handing it to the engine. Readers get
//! a [`NoteRef`] that borrows the record straight out of the transaction's
//! snapshot, so nothing is copied until a caller asks for JSON.

mod event;
mod view;

pub use event::Event;
pub use view::{tags_json, NoteRef, TagElem, TagRef, MAX_TAG_ELEMENTS_SERIALIZED};
