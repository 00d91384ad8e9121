use anyhow::{Context, Result};
use std::sync::Arc;

use hindsight::config::Config;
use hindsight::selector::SelectionCache;

/// Run one refresh cycle in the foreground and print the winner
pub async fn refresh(config: Config, no_backup: bool) -> Result<()> {
    let scheduler = super::build_scheduler(&config, Arc::new(SelectionCache::new()), !no_backup)?;

    println!(
        "Fetching {} candidates (this is rate limited and may take a while)...",
        config.candidates.len()
    );

    let selection = scheduler
        .trigger_refresh()
        .await
        .context("Refresh cycle failed")?;

    let outcome = &selection.outcome;
    println!();
    println!("Selected: {}", selection.candidate.description);
    println!("  Id: {}", selection.candidate.id());
    println!(
        "  {} -> {} ({} -> {})",
        outcome.old_value,
        outcome.new_value,
        outcome.old_time.format("%Y-%m-%d"),
        outcome.new_time.format("%Y-%m-%d"),
    );
    if let Some(percent) = outcome.percent_change() {
        println!("  Change: {percent:+.1}%");
    }
    println!("  Selected At: {}", selection.selected_at);
    if !no_backup {
        println!("  Backup: {}", config.backup.path.display());
    }

    Ok(())
}
