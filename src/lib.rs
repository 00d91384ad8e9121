//! hindsight - daily hindsight selection service
//!
//! Once a day the service fetches a year of history for every configured
//! candidate, ranks them by how much their value grew, picks one of the top
//! performers at random and serves it to readers until the next day.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`limiter`] - Multi-window sliding rate limiter for outbound calls
//! - [`fetcher`] - Data source trait, batch fetching and the Quandl client
//! - [`selector`] - Ranking and the published selection cache
//! - [`scheduler`] - Daily refresh boundaries and the refresh loop
//! - [`storage`] - Backup of the last selection across restarts
//! - [`server`] - HTTP reader surface
//! - [`metrics`] - Prometheus metrics
//! - [`models`] - Core data structures and types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hindsight::config::Config;
//! use hindsight::fetcher::BatchFetcher;
//! use hindsight::scheduler::RefreshScheduler;
//! use hindsight::selector::SelectionCache;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     config.validate()?;
//!
//!     let fetcher = BatchFetcher::new(config.quandl_source()?, config.rate_limiter());
//!     let scheduler = RefreshScheduler::new(
//!         config.candidates.clone(),
//!         fetcher,
//!         config.ranker(),
//!         Arc::new(SelectionCache::new()),
//!         config.refresh_schedule()?,
//!     );
//!     let selection = scheduler.trigger_refresh().await?;
//!     println!("{}", selection.candidate.description);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod selector;
pub mod server;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::fetcher::{BatchFetcher, SeriesSource};
    pub use crate::limiter::{RateLimitSpec, RateLimiter};
    pub use crate::models::{Candidate, FetchOutcome, Selection};
    pub use crate::scheduler::{RefreshSchedule, RefreshScheduler};
    pub use crate::selector::{Ranker, SelectionCache};
    pub use crate::storage::BackupStore;
}

// Direct re-exports for convenience
pub use models::{Candidate, FetchOutcome, Selection};
