//! Common test utilities

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hindsight::fetcher::{FetchError, SeriesSource};
use hindsight::models::{Candidate, FetchOutcome, Selection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source serving fixed `(old, new)` values per key; unknown keys fail
pub struct StubSource {
    values: HashMap<String, (f64, f64)>,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn new(values: &[(&str, f64, f64)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(key, old, new)| (key.to_string(), (*old, *new)))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// A source where every fetch fails
    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self::new(&[])
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeriesSource for StubSource {
    async fn fetch(
        &self,
        candidate: &Candidate,
        _as_of: DateTime<Utc>,
    ) -> Result<FetchOutcome, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.values.get(&candidate.key) {
            Some(&(old, new)) => Ok(outcome(old, new)),
            None => Err(FetchError::Status(503)),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Outcome spanning calendar 2016
pub fn outcome(old_value: f64, new_value: f64) -> FetchOutcome {
    FetchOutcome {
        old_value,
        new_value,
        old_time: Utc.with_ymd_and_hms(2016, 1, 4, 0, 0, 0).unwrap(),
        new_time: Utc.with_ymd_and_hms(2016, 12, 30, 0, 0, 0).unwrap(),
    }
}

/// Candidates under the `TEST` source, described as "Test <key>"
pub fn candidates(keys: &[&str]) -> Vec<Candidate> {
    keys.iter()
        .map(|k| Candidate::new("TEST", *k, format!("Test {k}")))
        .collect()
}

/// Selection of `key` made at `selected_at`
#[allow(dead_code)]
pub fn selection(key: &str, selected_at: DateTime<Utc>) -> Selection {
    Selection::new(
        Candidate::new("TEST", key, format!("Test {key}")),
        outcome(10.0, 25.0),
        selected_at,
    )
}
