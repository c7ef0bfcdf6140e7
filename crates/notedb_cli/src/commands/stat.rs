//! Stat command implementation.

use super::open_store;
use notedb_core::{StatsSnapshot, Store, StoreStat};
use serde::Serialize;
use std::path::Path;

/// Store census plus counters for this process.
#[derive(Debug, Serialize)]
pub struct StatReport {
    /// Store path.
    pub path: String,
    /// Data file size, subscriptions and open transactions.
    pub stat: StoreStat,
    /// Operation counters since open.
    pub counters: StatsSnapshot,
}

/// Collects a report for an open store.
pub fn report(store: &Store) -> Result<StatReport, Box<dyn std::error::Error>> {
    Ok(StatReport {
        path: store.path().display().to_string(),
        stat: store.stat()?,
        counters: store.stats(),
    })
}

/// Runs the stat command.
pub fn run(path: &Path, options: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, options)?;
    let result = report(&store)?;
    store.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn print_text_output(result: &StatReport) {
    println!("Store: {}", result.path);
    println!();
    println!("Data bytes:     {}", result.stat.data_bytes);
    println!("Subscriptions:  {}", result.stat.subscriptions);
    println!("Transactions:   {}", result.stat.open_transactions);
    println!();
    println!("Ingested:       {}", result.counters.ingested);
    println!("Rejected:       {}", result.counters.ingest_rejected);
    println!("Batch lines:    {}", result.counters.batch_lines);
    println!("Queries:        {}", result.counters.queries);
}
