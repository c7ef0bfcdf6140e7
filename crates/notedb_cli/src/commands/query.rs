//! Query command implementation.

use super::open_store;
use notedb_core::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use std::path::Path;

/// Runs the query command, printing one event per line.
pub fn run(path: &Path, options: Option<&str>, filter: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, options)?;
    let txn = store.begin_with_retry(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF)?;
    for event in txn.query(filter)? {
        println!("{event}");
    }
    txn.end();
    store.close()?;
    Ok(())
}
