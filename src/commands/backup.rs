use anyhow::{Context, Result};
use chrono::{Local, Utc};

use hindsight::config::Config;

/// Print the selection stored in the backup file
pub async fn show_backup(config: &Config, json: bool) -> Result<()> {
    let store = config.backup_store();

    let Some(selection) = store
        .load()
        .await
        .with_context(|| format!("Failed to read backup: {}", store.path().display()))?
    else {
        println!("No backup at {}", store.path().display());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&selection)?);
        return Ok(());
    }

    let schedule = config.refresh_schedule()?;
    let next = schedule.next_load_time(selection.selected_at);
    let stale = schedule.is_stale(selection.selected_at, Utc::now());

    println!("Backup: {}", store.path().display());
    println!("{:-<40}", "");
    println!("Candidate: {}", selection.candidate.id());
    println!("Description: {}", selection.candidate.description);
    println!(
        "Values: {} ({}) -> {} ({})",
        selection.outcome.old_value,
        selection.outcome.old_time.format("%Y-%m-%d"),
        selection.outcome.new_value,
        selection.outcome.new_time.format("%Y-%m-%d"),
    );
    if let Some(percent) = selection.outcome.percent_change() {
        println!("Change: {percent:+.1}%");
    }
    println!("Selected At: {}", selection.selected_at);
    println!("Next Load: {next}");
    println!("Stale: {}", if stale { "yes" } else { "no" });

    Ok(())
}

/// Print when the next refresh is due
///
/// Measured from the backed-up selection when there is a readable one,
/// otherwise from now.
pub async fn next_refresh(config: &Config) -> Result<()> {
    let schedule = config.refresh_schedule()?;
    let store = config.backup_store();

    let base = match store.load().await {
        Ok(Some(selection)) => selection.selected_at,
        Ok(None) => Utc::now(),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable backup");
            Utc::now()
        }
    };

    let next = schedule.next_load_time(base);
    let wait = (next - Utc::now()).num_minutes().max(0);

    println!("Timezone: {}", schedule.timezone);
    println!("Measured From: {base}");
    println!("Next Refresh: {next} ({})", next.with_timezone(&Local));
    println!("In: {}h {}m", wait / 60, wait % 60);

    Ok(())
}
