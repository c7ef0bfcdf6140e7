//! Zap receipt (kind 9735) tallies.
//!
//! A receipt's amount is read from its `bolt11` invoice. Receipts whose
//! invoice carries no amount fall back to the `amount` tag of the zap
//! request embedded in the `description` tag.

use crate::aggregate::{filter, parse_id, parse_ids, AGGREGATE_SCAN_LIMIT};
use crate::error::StoreResult;
use crate::note::NoteRef;
use crate::store::Store;
use crate::types::KIND_ZAP;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Millisatoshis in one bitcoin.
const MSAT_PER_BTC: u64 = 100_000_000_000;

/// Zap receipts for one note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZapStats {
    /// Number of receipts.
    pub count: usize,
    /// Sum of receipt amounts in millisatoshis.
    pub total_msat: u64,
}

impl ZapStats {
    fn add(&mut self, msat: u64) {
        self.count += 1;
        self.total_msat = self.total_msat.saturating_add(msat);
    }
}

/// Returns the amount of a BOLT11 invoice in millisatoshis, or 0 if it has
/// none or cannot be read.
///
/// Only the human-readable part is looked at: `ln`, the currency prefix,
/// then an optional amount with an `m`, `u`, `n` or `p` multiplier.
/// Pico-bitcoin amounts round up to the next millisatoshi.
///
/// ```
/// use notedb_core::bolt11_amount_msat;
///
/// assert_eq!(bolt11_amount_msat("lnbc2500u1pvjluez"), 250_000_000);
/// assert_eq!(bolt11_amount_msat("lnbc1pvjluez"), 0);
/// ```
#[must_use]
pub fn bolt11_amount_msat(invoice: &str) -> u64 {
    let invoice = invoice.trim().to_ascii_lowercase();
    let Some(hrp) = invoice.rfind('1').map(|sep| &invoice[..sep]) else {
        return 0;
    };
    let Some(rest) = hrp.strip_prefix("ln") else {
        return 0;
    };
    let amount = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let digits_end = amount
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(amount.len());
    let Ok(value) = amount[..digits_end].parse::<u64>() else {
        return 0;
    };

    let msat = match &amount[digits_end..] {
        "" => value.checked_mul(MSAT_PER_BTC),
        "m" => value.checked_mul(100_000_000),
        "u" => value.checked_mul(100_000),
        "n" => value.checked_mul(100),
        "p" => Some(value.div_ceil(10)),
        _ => None,
    };
    msat.unwrap_or(0)
}

/// Returns the `amount` tag of a zap request given as event JSON, or 0.
fn request_amount_msat(request_json: &str) -> u64 {
    let Ok(request) = serde_json::from_str::<Value>(request_json) else {
        return 0;
    };
    request["tags"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .find(|tag| tag.first().and_then(Value::as_str) == Some("amount"))
        .and_then(|tag| tag.get(1)?.as_str()?.trim().parse().ok())
        .unwrap_or(0)
}

/// Returns the amount a zap receipt paid, in millisatoshis, or 0 if it
/// cannot be determined.
#[must_use]
pub fn zap_amount_msat(receipt: &NoteRef<'_>) -> u64 {
    let from_invoice = receipt
        .first_tag_value("bolt11")
        .and_then(|v| v.as_str())
        .map_or(0, bolt11_amount_msat);
    if from_invoice > 0 {
        return from_invoice;
    }
    receipt
        .first_tag_value("description")
        .and_then(|v| v.as_str())
        .map_or(0, request_amount_msat)
}

impl Store {
    /// Counts zap receipts whose `e` tags reference `event_id_hex`.
    pub fn count_zaps(&self, event_id_hex: &str) -> StoreResult<usize> {
        Ok(self.zap_stats(event_id_hex)?.count)
    }

    /// Counts and sums the zap receipts for `event_id_hex`.
    pub fn zap_stats(&self, event_id_hex: &str) -> StoreResult<ZapStats> {
        let id = parse_id(event_id_hex)?;
        let filter = filter(&json!({ "kinds": [KIND_ZAP], "#e": [id.to_hex()] }))?;

        let txn = self.begin_default()?;
        let mut stats = ZapStats::default();
        for receipt in txn.scan_notes(&filter, AGGREGATE_SCAN_LIMIT)? {
            stats.add(zap_amount_msat(&receipt));
        }
        txn.end();
        Ok(stats)
    }

    /// Zap stats for several notes with a single query.
    ///
    /// A receipt is credited to the note named by its last `e` tag. Notes
    /// without receipts are absent from the result.
    pub fn zap_stats_batch(&self, event_ids_hex: &[&str]) -> StoreResult<HashMap<String, ZapStats>> {
        let ids = parse_ids(event_ids_hex)?;
        let mut stats: HashMap<String, ZapStats> = HashMap::new();
        if ids.is_empty() {
            return Ok(stats);
        }

        let filter = filter(&json!({ "kinds": [KIND_ZAP], "#e": &ids }))?;
        let txn = self.begin_default()?;
        for receipt in txn.scan_notes(&filter, AGGREGATE_SCAN_LIMIT)? {
            let Some(target) = receipt.last_tag_value("e") else {
                continue;
            };
            let target = target.to_json_str();
            if ids.iter().any(|id| *id == *target) {
                stats
                    .entry(target.into_owned())
                    .or_default()
                    .add(zap_amount_msat(&receipt));
            }
        }
        txn.end();
        Ok(stats)
    }
}
