//! Zaps command implementation.

use super::open_store;
use notedb_core::ZapStats;
use std::path::Path;

/// Formats millisatoshis as whole sats, keeping any remainder.
pub fn format_sats(msat: u64) -> String {
    match msat % 1000 {
        0 => format!("{} sats", msat / 1000),
        rest => format!("{}.{rest:03} sats", msat / 1000),
    }
}

/// Runs the zaps command.
pub fn run(path: &Path, options: Option<&str>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, options)?;
    let ZapStats { count, total_msat } = store.zap_stats(id)?;
    store.close()?;

    println!("Zaps:  {count}");
    println!("Total: {}", format_sats(total_msat));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sats_keep_millisat_remainder() {
        assert_eq!(format_sats(21_000), "21 sats");
        assert_eq!(format_sats(1_005), "1.005 sats");
        assert_eq!(format_sats(0), "0 sats");
    }
}
