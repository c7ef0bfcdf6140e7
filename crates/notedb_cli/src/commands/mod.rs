//! CLI command implementations.

pub mod ingest;
pub mod query;
pub mod reactions;
pub mod search;
pub mod stat;
pub mod thread;
pub mod zaps;

use notedb_core::{Config, Store};
use std::path::Path;

/// Opens the store at `path` with optional JSON options.
pub fn open_store(path: &Path, options: Option<&str>) -> Result<Store, Box<dyn std::error::Error>> {
    let config = Config::from_options_json(options.unwrap_or(""))?;
    Ok(Store::open(path, config)?)
}
