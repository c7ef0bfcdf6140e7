//! Reactions command implementation.

use super::open_store;
use notedb_core::ReactionBreakdown;
use std::path::Path;

/// Returns `(content, count)` pairs, most frequent first.
pub fn ranked(breakdown: &ReactionBreakdown) -> Vec<(&str, usize)> {
    let mut ranked: Vec<(&str, usize)> = breakdown
        .counts
        .iter()
        .map(|(content, count)| (content.as_str(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

/// Runs the reactions command.
pub fn run(
    path: &Path,
    options: Option<&str>,
    id: &str,
    show_reactors: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, options)?;
    let breakdown = store.reaction_breakdown(id, show_reactors)?;
    store.close()?;

    println!("Reactions: {}", breakdown.total());
    for (content, count) in ranked(&breakdown) {
        println!("  {content}  {count}");
    }
    if show_reactors {
        println!();
        for reactor in &breakdown.reactors {
            println!("  {reactor}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_frequent_first() {
        let mut breakdown = ReactionBreakdown::default();
        breakdown.counts.insert("+".into(), 2);
        breakdown.counts.insert("🔥".into(), 5);
        breakdown.counts.insert("-".into(), 2);
        assert_eq!(ranked(&breakdown), vec![("🔥", 5), ("+", 2), ("-", 2)]);
    }
}
