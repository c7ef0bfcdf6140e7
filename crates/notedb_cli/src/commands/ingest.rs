//! Ingest command implementation.

use super::open_store;
use notedb_core::{NoteId, Store, StoreError, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const STORED_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Outcome of an ingest run.
#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    /// Lines handed to the store.
    pub submitted: usize,
    /// Lines refused before reaching the engine.
    pub refused: usize,
    /// Distinct event ids submitted.
    pub distinct: usize,
    /// Distinct ids found in the store afterwards.
    pub stored: usize,
    /// Whether every distinct id was found before the timeout.
    pub completed: bool,
}

impl IngestSummary {
    /// Distinct ids that never showed up: failed verification, or still
    /// queued when the timeout ran out.
    pub fn missing(&self) -> usize {
        self.distinct - self.stored
    }
}

/// Runs the ingest command.
pub fn run(
    path: &Path,
    options: Option<&str>,
    file: Option<&Path>,
    repair: bool,
    timeout_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = match file {
        Some(file) => fs::read(file)?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let store = open_store(path, options)?;
    let summary = load(&store, &input, repair, Duration::from_secs(timeout_secs))?;
    store.close()?;

    println!("Submitted: {}", summary.submitted);
    println!("Refused:   {}", summary.refused);
    println!("Stored:    {} of {}", summary.stored, summary.distinct);
    println!("Missing:   {}", summary.missing());
    if !summary.completed {
        warn!(missing = summary.missing(), "some events were not stored");
    }
    Ok(())
}

/// Returns the declared id of an event line, if it has one.
fn line_id(line: &str) -> Option<NoteId> {
    let value: Value = serde_json::from_str(line).ok()?;
    NoteId::from_hex(value.get("id")?.as_str()?)
}

/// Submits `input` and waits up to `timeout` for its events to be stored.
pub fn load(
    store: &Store,
    input: &[u8],
    repair: bool,
    timeout: Duration,
) -> Result<IngestSummary, Box<dyn std::error::Error>> {
    let text = std::str::from_utf8(input)?;
    let mut summary = IngestSummary::default();
    let mut pending: HashSet<NoteId> = HashSet::new();

    if repair {
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match store.ingest_one(line, None) {
                Ok(()) => {
                    summary.submitted += 1;
                    pending.extend(line_id(line));
                }
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "refused event");
                    summary.refused += 1;
                }
            }
        }
    } else {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let before = store.stats().batch_lines;
        match store.ingest_batch(input) {
            Ok(handed) => summary.submitted = handed,
            Err(e @ StoreError::Ingest { .. }) => {
                warn!(error = %e, "batch partly refused");
                let handed = usize::try_from(store.stats().batch_lines - before).unwrap_or(usize::MAX);
                summary.submitted = handed;
                summary.refused = lines.len().saturating_sub(handed);
            }
            Err(e) => return Err(e.into()),
        }
        pending.extend(lines.iter().filter_map(|line| line_id(line)));
    }

    summary.distinct = pending.len();
    let deadline = Instant::now() + timeout;
    loop {
        let txn = store.begin_with_retry(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF)?;
        pending.retain(|id| txn.note_by_id(id).is_err());
        txn.end();
        if pending.is_empty() || Instant::now() >= deadline {
            break;
        }
        thread::sleep(STORED_POLL_INTERVAL);
    }

    summary.stored = summary.distinct - pending.len();
    summary.completed = pending.is_empty();
    Ok(summary)
}
