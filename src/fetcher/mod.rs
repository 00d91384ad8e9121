//! Batch fetching of the candidate list
//!
//! [`BatchFetcher`] walks the whole candidate list through a
//! [`RateLimiter`], calling a [`SeriesSource`] once per candidate. A failing
//! candidate is logged and skipped; it never aborts the batch.

pub mod error;
pub mod quandl;

pub use error::FetchError;
pub use quandl::QuandlSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::limiter::RateLimiter;
use crate::models::{Candidate, FetchOutcome};

/// External data source returning two observations per candidate
///
/// Implementations must be safe to call repeatedly and should return the
/// same observations for the same `as_of`.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn fetch(
        &self,
        candidate: &Candidate,
        as_of: DateTime<Utc>,
    ) -> Result<FetchOutcome, FetchError>;

    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: SeriesSource + ?Sized> SeriesSource for Arc<S> {
    async fn fetch(
        &self,
        candidate: &Candidate,
        as_of: DateTime<Utc>,
    ) -> Result<FetchOutcome, FetchError> {
        (**self).fetch(candidate, as_of).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// A candidate together with its fetched observations
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedCandidate {
    pub candidate: Candidate,
    pub outcome: FetchOutcome,
}

/// Result of one batch pass
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Candidates fetched successfully, in list order
    pub successes: Vec<FetchedCandidate>,

    /// Candidates whose fetch failed, with the error message
    pub failures: Vec<(Candidate, String)>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successes.is_empty()
    }
}

/// Drives a [`SeriesSource`] across the candidate list under rate limits
pub struct BatchFetcher<S> {
    source: S,
    limiter: RateLimiter,
}

impl<S: SeriesSource> BatchFetcher<S> {
    pub fn new(source: S, limiter: RateLimiter) -> Self {
        Self { source, limiter }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Fetch every candidate sequentially, collecting successes
    pub async fn fetch_all(&self, candidates: &[Candidate], as_of: DateTime<Utc>) -> BatchReport {
        info!(
            candidates = candidates.len(),
            source = self.source.name(),
            "Starting batch fetch"
        );

        let results = self
            .limiter
            .run_throttled(candidates, |candidate| self.source.fetch(candidate, as_of))
            .await;

        let mut report = BatchReport::default();
        for (candidate, result) in candidates.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    debug!(
                        candidate = %candidate,
                        old = outcome.old_value,
                        new = outcome.new_value,
                        "Fetched candidate"
                    );
                    crate::metrics::record_fetch(true);
                    report.successes.push(FetchedCandidate {
                        candidate: candidate.clone(),
                        outcome,
                    });
                }
                Err(e) => {
                    warn!(candidate = %candidate, error = %e, "Candidate fetch failed");
                    crate::metrics::record_fetch(false);
                    report.failures.push((candidate.clone(), e.to_string()));
                }
            }
        }

        info!(
            successes = report.successes.len(),
            failures = report.failures.len(),
            "Batch fetch complete"
        );

        report
    }
}
