//! Sliding-window rate limiting for bulk fetch passes
//!
//! A [`RateLimiter`] holds any number of independent [`RateLimitSpec`]s
//! (e.g. "5 calls per minute" and "300 calls per day") and drives a sequence
//! of actions so that, at the moment each action starts, every window is
//! below its cap.
//!
//! Waiting is done by polling: when any window is saturated the driving task
//! sleeps for the poll interval (one second by default) and re-evaluates all
//! specs. This trades wake-up latency for a limiter with no timers or wakers
//! of its own. There is no upper bound on the wait.
//!
//! # Example
//!
//! ```no_run
//! use hindsight::limiter::{RateLimitSpec, RateLimiter};
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(vec![
//!     RateLimitSpec::per_minute(5),
//!     RateLimitSpec::per_day(300),
//! ]);
//!
//! let keys = vec!["AAPL", "MSFT", "IBM"];
//! let lengths = limiter.run_throttled(&keys, |k| async move { k.len() }).await;
//! assert_eq!(lengths, vec![4, 4, 3]);
//! # }
//! ```
//!
//! # Limitations
//!
//! The limiter is meant to be driven by a single sequential task and holds
//! no locks. A spec with `max_calls == 0` never admits a call and blocks
//! forever; configuration validation is expected to reject it.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default re-evaluation interval while a window is saturated
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Rate Limit Spec
// ============================================================================

/// At most `max_calls` calls within any trailing `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitSpec {
    /// Length of the trailing window
    #[serde(rename = "window_secs", with = "duration_secs")]
    pub window: Duration,

    /// Maximum calls permitted inside the window
    pub max_calls: u32,
}

impl RateLimitSpec {
    pub fn new(window: Duration, max_calls: u32) -> Self {
        Self { window, max_calls }
    }

    pub fn per_second(max_calls: u32) -> Self {
        Self::new(Duration::from_secs(1), max_calls)
    }

    pub fn per_minute(max_calls: u32) -> Self {
        Self::new(Duration::from_secs(60), max_calls)
    }

    pub fn per_day(max_calls: u32) -> Self {
        Self::new(Duration::from_secs(24 * 3600), max_calls)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// ============================================================================
// Call Log
// ============================================================================

/// Timestamps of the calls made during one throttled pass
///
/// Entries are never evicted; anything older than a window simply stops
/// being counted for that window. The log lives only as long as one pass.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Vec<Instant>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            calls: Vec::with_capacity(capacity),
        }
    }

    /// Append a call made at `at`
    pub fn record(&mut self, at: Instant) {
        self.calls.push(at);
    }

    /// Number of logged calls no older than `window` as of `now`
    pub fn count_within(&self, now: Instant, window: Duration) -> usize {
        self.calls
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) <= window)
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instant> {
        self.calls.iter()
    }
}

// ============================================================================
// Rate Limiter
// ============================================================================

/// Polling limiter enforcing several sliding windows at once
#[derive(Debug, Clone)]
pub struct RateLimiter {
    specs: Vec<RateLimitSpec>,
    poll_interval: Duration,
}

impl RateLimiter {
    /// Create a limiter with the default one second poll interval
    pub fn new(specs: Vec<RateLimitSpec>) -> Self {
        Self {
            specs,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// A limiter with no specs; never waits
    pub fn unlimited() -> Self {
        Self::new(Vec::new())
    }

    /// Set how often saturated windows are re-evaluated
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn specs(&self) -> &[RateLimitSpec] {
        &self.specs
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether a call starting at `now` keeps every window under its cap
    pub fn admits(&self, log: &CallLog, now: Instant) -> bool {
        self.specs
            .iter()
            .all(|spec| log.count_within(now, spec.window) < spec.max_calls as usize)
    }

    /// Suspend until every spec admits one more call
    ///
    /// Returns how long the caller was held back.
    pub async fn wait_for_slot(&self, log: &CallLog) -> Duration {
        let started = Instant::now();
        while !self.admits(log, Instant::now()) {
            tokio::time::sleep(self.poll_interval).await;
        }
        started.elapsed()
    }

    /// Run `action` once per item, in order, honoring every spec
    ///
    /// Each call is logged with the time it finished. Results are returned
    /// in item order.
    pub async fn run_throttled<'a, T, R, F, Fut>(&self, items: &'a [T], mut action: F) -> Vec<R>
    where
        F: FnMut(&'a T) -> Fut,
        Fut: Future<Output = R>,
    {
        let mut log = CallLog::with_capacity(items.len());
        let mut results = Vec::with_capacity(items.len());
        let mut throttled = Duration::ZERO;

        for item in items {
            let waited = self.wait_for_slot(&log).await;
            if !waited.is_zero() {
                debug!(
                    waited_ms = waited.as_millis() as u64,
                    calls = log.len(),
                    "Rate limit window saturated, resumed"
                );
                throttled += waited;
            }

            results.push(action(item).await);
            log.record(Instant::now());
        }

        crate::metrics::record_throttle_wait(throttled);
        debug!(
            calls = log.len(),
            throttled_secs = throttled.as_secs(),
            "Throttled pass complete"
        );

        results
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(vec![RateLimitSpec::per_minute(5), RateLimitSpec::per_day(300)])
    }
}

// ============================================================================
// Tests
// ============================================================================
