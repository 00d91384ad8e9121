//! Refresh trigger
//!
//! [`RefreshScheduler`] owns one refresh cycle (fetch every candidate,
//! rank, pick, publish, back up) and the timer that repeats it. On startup
//! it restores the last selection from the backup when that selection is
//! still current, and otherwise refreshes synchronously before serving.
//!
//! Cycles are serialized: a trigger that arrives while a cycle is running
//! waits for it to finish and then runs its own.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hindsight::fetcher::{BatchFetcher, QuandlSource};
//! use hindsight::limiter::RateLimiter;
//! use hindsight::scheduler::{RefreshSchedule, RefreshScheduler};
//! use hindsight::selector::{Ranker, SelectionCache};
//! use hindsight::storage::BackupStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = QuandlSource::new("api-key", Default::default())?;
//! let fetcher = BatchFetcher::new(source, RateLimiter::default());
//! let cache = Arc::new(SelectionCache::new());
//!
//! let scheduler = Arc::new(
//!     RefreshScheduler::new(vec![], fetcher, Ranker::default(), cache, RefreshSchedule::default())
//!         .with_backup(BackupStore::new("cache")),
//! );
//! let startup = scheduler.initialize().await;
//! let handle = scheduler.clone().spawn(startup.selected_at());
//! // ... serve ...
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::error::{SchedulerError, SchedulerResult};
use super::schedule::RefreshSchedule;
use crate::fetcher::{BatchFetcher, SeriesSource};
use crate::models::{Candidate, Selection};
use crate::selector::{CacheStatus, Ranker, SelectionCache};
use crate::storage::BackupStore;

// ============================================================================
// Events and State
// ============================================================================

/// Events emitted by the refresh scheduler
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// A still-current selection was restored from the backup
    Restored { selection: Selection },

    /// A cycle published a new selection
    CycleCompleted {
        selection: Selection,
        successes: usize,
        failures: usize,
    },

    /// A cycle ended without publishing; the previous selection stays
    CycleFailed { kind: &'static str, reason: String },
}

/// Whether a cycle is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// How the startup sequence obtained its first selection
#[derive(Debug, Clone)]
pub enum StartupOutcome {
    /// The backup held a selection that is still current
    Restored(Selection),

    /// A synchronous refresh produced the selection
    Refreshed(Selection),

    /// No selection is available; readers get "not yet available"
    Unavailable(String),
}

impl StartupOutcome {
    /// Time of the selection in effect, if any
    pub fn selected_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Restored(s) | Self::Refreshed(s) => Some(s.selected_at),
            Self::Unavailable(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Restored(_) => "restored",
            Self::Refreshed(_) => "refreshed",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

// ============================================================================
// Refresh Scheduler
// ============================================================================

/// Periodic selection refresher
pub struct RefreshScheduler<S> {
    candidates: Vec<Candidate>,
    fetcher: BatchFetcher<S>,
    ranker: Ranker,
    cache: Arc<SelectionCache>,
    schedule: RefreshSchedule,
    backup: Option<BackupStore>,

    cycle_lock: Mutex<()>,
    state: RwLock<RefreshState>,
    next_refresh_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    rng: std::sync::Mutex<ChaCha8Rng>,

    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,

    event_sender: broadcast::Sender<RefreshEvent>,
}

impl<S: SeriesSource> RefreshScheduler<S> {
    /// Create a scheduler without a backup file
    pub fn new(
        candidates: Vec<Candidate>,
        fetcher: BatchFetcher<S>,
        ranker: Ranker,
        cache: Arc<SelectionCache>,
        schedule: RefreshSchedule,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(100);

        Self {
            candidates,
            fetcher,
            ranker,
            cache,
            schedule,
            backup: None,
            cycle_lock: Mutex::new(()),
            state: RwLock::new(RefreshState::Idle),
            next_refresh_at: RwLock::new(None),
            last_error: RwLock::new(None),
            rng: std::sync::Mutex::new(ChaCha8Rng::from_entropy()),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            event_sender,
        }
    }

    /// Persist every published selection to `store`
    pub fn with_backup(mut self, store: BackupStore) -> Self {
        self.backup = Some(store);
        self
    }

    /// Use a seeded generator for the final pick
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = std::sync::Mutex::new(ChaCha8Rng::seed_from_u64(seed));
        self
    }

    pub fn cache(&self) -> &Arc<SelectionCache> {
        &self.cache
    }

    pub fn schedule(&self) -> &RefreshSchedule {
        &self.schedule
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Subscribe to refresh events
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.event_sender.subscribe()
    }

    /// Run one refresh cycle now
    ///
    /// Waits for any cycle already in progress. On error the published
    /// selection is left as it was.
    pub async fn trigger_refresh(&self) -> SchedulerResult<Selection> {
        let _cycle = self.cycle_lock.lock().await;
        *self.state.write().await = RefreshState::Refreshing;

        let started = std::time::Instant::now();
        let result = self.run_cycle().await;
        let elapsed = started.elapsed();

        *self.state.write().await = RefreshState::Idle;
        crate::metrics::observe_cycle_duration(elapsed);

        // Events go out only after the status reflects this cycle
        match result {
            Ok(report) => {
                let selection = report.selection;
                self.cycles_completed.fetch_add(1, Ordering::Relaxed);
                *self.last_error.write().await = None;
                crate::metrics::record_cycle("success");
                crate::metrics::set_last_refresh(selection.selected_at.timestamp());
                info!(
                    candidate = %selection.candidate,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Refresh cycle completed"
                );
                let _ = self.event_sender.send(RefreshEvent::CycleCompleted {
                    selection: selection.clone(),
                    successes: report.successes,
                    failures: report.failures,
                });
                Ok(selection)
            }
            Err(e) => {
                self.cycles_failed.fetch_add(1, Ordering::Relaxed);
                *self.last_error.write().await = Some(e.to_string());
                crate::metrics::record_cycle(e.kind());
                error!(error = %e, elapsed_secs = elapsed.as_secs_f64(), "Refresh cycle failed");
                let _ = self.event_sender.send(RefreshEvent::CycleFailed {
                    kind: e.kind(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> SchedulerResult<CycleReport> {
        let as_of = Utc::now();
        info!(candidates = self.candidates.len(), "Starting refresh cycle");

        let report = self.fetcher.fetch_all(&self.candidates, as_of).await;
        if report.is_empty() {
            return Err(SchedulerError::NoSuccessfulFetches {
                attempted: report.attempted(),
            });
        }

        let successes = report.successes.len();
        let failures = report.failures.len();

        let winner = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.ranker.select(report.successes, &mut *rng)
        };
        let Some(winner) = winner else {
            return Err(SchedulerError::NoEligibleOutcome { successes });
        };

        let selection = Selection::new(winner.entry.candidate, winner.entry.outcome, as_of);
        debug!(candidate = %selection.candidate, score = winner.score, "Picked selection");

        self.cache.publish(selection.clone()).await;

        if let Some(backup) = &self.backup {
            if let Err(e) = backup.save(&selection).await {
                warn!(path = %backup.path().display(), error = %e, "Failed to write backup");
            }
        }

        Ok(CycleReport {
            selection,
            successes,
            failures,
        })
    }

    /// Establish the first selection before serving
    ///
    /// Restores from the backup when it holds a selection whose next load
    /// time has not yet passed; otherwise refreshes synchronously.
    pub async fn initialize(&self) -> StartupOutcome {
        if let Some(restored) = self.restore().await {
            return StartupOutcome::Restored(restored);
        }

        match self.trigger_refresh().await {
            Ok(selection) => StartupOutcome::Refreshed(selection),
            Err(e) => StartupOutcome::Unavailable(e.to_string()),
        }
    }

    async fn restore(&self) -> Option<Selection> {
        let store = self.backup.as_ref()?;

        let selection = match store.load().await {
            Ok(Some(selection)) => selection,
            Ok(None) => {
                info!(path = %store.path().display(), "No backup found, loading synchronously");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Backup unreadable, loading synchronously");
                return None;
            }
        };

        if let Err(e) = selection.outcome.validate() {
            warn!(error = %e, "Backup holds an unusable outcome, loading synchronously");
            return None;
        }

        let now = Utc::now();
        if self.schedule.is_stale(selection.selected_at, now) {
            info!(
                selected_at = %selection.selected_at,
                "Backup is past its refresh time, loading synchronously"
            );
            return None;
        }

        info!(
            candidate = %selection.candidate,
            selected_at = %selection.selected_at,
            "Restored selection from backup"
        );
        self.cache.publish(selection.clone()).await;
        let _ = self.event_sender.send(RefreshEvent::Restored {
            selection: selection.clone(),
        });
        Some(selection)
    }

    /// Current scheduler status
    pub async fn status(&self) -> RefreshStatus {
        RefreshStatus {
            state: *self.state.read().await,
            candidates: self.candidates.len(),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            last_error: self.last_error.read().await.clone(),
            next_refresh_at: *self.next_refresh_at.read().await,
            timezone: self.schedule.timezone.to_string(),
            cache: self.cache.status().await,
        }
    }
}

impl<S: SeriesSource + 'static> RefreshScheduler<S> {
    /// Start the timer loop in the background
    ///
    /// The first cycle runs at the next load time of `last_selected_at` (or
    /// of now when there is no selection), then every `period`.
    pub fn spawn(self: Arc<Self>, last_selected_at: Option<DateTime<Utc>>) -> SchedulerHandle {
        let first_at = self
            .schedule
            .next_load_time(last_selected_at.unwrap_or_else(Utc::now));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            self.run(first_at, shutdown_rx).await;
        });

        SchedulerHandle { task, shutdown }
    }

    async fn run(&self, first_at: DateTime<Utc>, mut shutdown: watch::Receiver<bool>) {
        *self.next_refresh_at.write().await = Some(first_at);
        let delay = RefreshSchedule::delay_until(first_at, Utc::now());
        info!(next_refresh = %first_at, delay_secs = delay.as_secs(), "Refresh timer armed");

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.changed() => {
                info!("Refresh timer stopped before first cycle");
                return;
            }
        }
        // The period runs from the firing instant, not from the end of the cycle
        let fired_at = Instant::now();
        self.fire().await;

        if self.schedule.realign_daily {
            loop {
                let next = self.schedule.next_load_time(Utc::now());
                *self.next_refresh_at.write().await = Some(next);
                info!(next_refresh = %next, "Refresh timer realigned");

                tokio::select! {
                    _ = sleep(RefreshSchedule::delay_until(next, Utc::now())) => self.fire().await,
                    _ = shutdown.changed() => break,
                }
            }
        } else {
            let period = self.schedule.period;
            let mut next_tick = fired_at + period;
            let mut ticker = interval_at(next_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let next = wall_clock_at(next_tick);
                *self.next_refresh_at.write().await = Some(next);
                info!(next_refresh = %next, "Refresh timer armed");

                tokio::select! {
                    _ = ticker.tick() => {
                        next_tick = Instant::now() + period;
                        self.fire().await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }

        info!("Refresh timer stopped");
    }

    async fn fire(&self) {
        // Failures are already logged and counted by trigger_refresh
        let _ = self.trigger_refresh().await;
    }
}

/// Wall-clock time at which the monotonic instant `at` is reached
fn wall_clock_at(at: Instant) -> DateTime<Utc> {
    let remaining = at.saturating_duration_since(Instant::now());
    Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero())
}

/// What one successful cycle produced
struct CycleReport {
    selection: Selection,
    successes: usize,
    failures: usize,
}

// ============================================================================
// Handle and Status
// ============================================================================

/// Handle to the background refresh timer
pub struct SchedulerHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Stop the timer and wait for any in-flight cycle to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Refresh task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Scheduler status information
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub state: RefreshState,
    pub candidates: usize,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_error: Option<String>,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub cache: CacheStatus,
}

impl RefreshStatus {
    /// Format as display string
    pub fn display(&self) -> String {
        let mut output = String::from("Refresh Status\n");
        output.push_str(&format!("{:-<40}\n", ""));
        output.push_str(&format!("State: {:?}\n", self.state));
        output.push_str(&format!("Candidates: {}\n", self.candidates));
        output.push_str(&format!(
            "Cycles: {} ok, {} failed\n",
            self.cycles_completed, self.cycles_failed
        ));
        if let Some(next) = self.next_refresh_at {
            output.push_str(&format!("Next Refresh: {next}\n"));
        }
        output.push_str(&format!("Timezone: {}\n", self.timezone));
        if let Some(err) = &self.last_error {
            output.push_str(&format!("Last Error: {err}\n"));
        }
        output.push_str(&format!("Has Selection: {}\n", self.cache.has_selection));
        output
    }
}

// ============================================================================
// Tests
// ============================================================================
