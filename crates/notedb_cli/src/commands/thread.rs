//! Thread command implementation.

use super::open_store;
use notedb_core::{nip10_thread_full, NoteId, ThreadRefs, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use std::path::Path;

fn line(label: &str, id: Option<&str>, relay: Option<&str>) -> String {
    match (id, relay) {
        (Some(id), Some(relay)) => format!("{label}: {id} ({relay})"),
        (Some(id), None) => format!("{label}: {id}"),
        (None, _) => format!("{label}: -"),
    }
}

/// Renders thread refs as two lines.
pub fn render(refs: &ThreadRefs) -> String {
    format!(
        "{}\n{}",
        line("Root ", refs.root.as_deref(), refs.root_relay.as_deref()),
        line("Reply", refs.reply.as_deref(), refs.reply_relay.as_deref()),
    )
}

/// Runs the thread command.
pub fn run(path: &Path, options: Option<&str>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let note_id = NoteId::from_hex(id).ok_or("Note id must be 64 hex characters")?;
    let store = open_store(path, options)?;
    let txn = store.begin_with_retry(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF)?;
    let refs = {
        let (_, note) = txn.note_by_id(&note_id)?;
        nip10_thread_full(&note)
    };
    txn.end();
    store.close()?;

    println!("{}", render(&refs));
    Ok(())
}
