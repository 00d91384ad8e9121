pub mod backup;
pub mod refresh;
pub mod serve;

// Re-export command functions for convenience
pub use backup::{next_refresh, show_backup};
pub use refresh::refresh;
pub use serve::{serve, ServeParams};

use anyhow::{Context, Result};
use std::sync::Arc;

use hindsight::config::Config;
use hindsight::fetcher::{BatchFetcher, QuandlSource};
use hindsight::scheduler::RefreshScheduler;
use hindsight::selector::SelectionCache;

/// Build a scheduler over the Quandl source from validated configuration
fn build_scheduler(
    config: &Config,
    cache: Arc<SelectionCache>,
    with_backup: bool,
) -> Result<RefreshScheduler<QuandlSource>> {
    config.validate().context("Invalid configuration")?;

    let source = config
        .quandl_source()
        .context("Failed to create Quandl client")?;
    let fetcher = BatchFetcher::new(source, config.rate_limiter());
    let schedule = config.refresh_schedule()?;

    let scheduler = RefreshScheduler::new(
        config.candidates.clone(),
        fetcher,
        config.ranker(),
        cache,
        schedule,
    );

    Ok(if with_backup {
        scheduler.with_backup(config.backup_store())
    } else {
        scheduler
    })
}
