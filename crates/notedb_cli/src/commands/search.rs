//! Search command implementation.

use super::open_store;
use notedb_core::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use serde_json::json;
use std::path::Path;

/// Builds the search options JSON from CLI flags.
pub fn search_options(limit: Option<usize>, ascending: bool) -> String {
    let order = if ascending { "asc" } else { "desc" };
    let mut options = json!({ "order": order });
    if let Some(limit) = limit {
        options["limit"] = json!(limit);
    }
    options.to_string()
}

/// Runs the search command, printing one event per line.
pub fn run(
    path: &Path,
    options: Option<&str>,
    query: &str,
    limit: Option<usize>,
    ascending: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, options)?;
    let txn = store.begin_with_retry(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF)?;
    let config = search_options(limit, ascending);
    for event in txn.text_search(query, Some(&config))? {
        println!("{event}");
    }
    txn.end();
    store.close()?;
    Ok(())
}
