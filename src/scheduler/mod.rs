//! Daily refresh scheduling
//!
//! # Overview
//!
//! A refresh cycle fetches every candidate under the rate limits, ranks the
//! outcomes, picks one of the top entries at random and publishes it to the
//! [`SelectionCache`](crate::selector::SelectionCache). Cycles run once a
//! day, at a fixed offset after local midnight.
//!
//! ```text
//!   startup ──► backup current? ──yes──► publish restored selection
//!                     │ no
//!                     ▼
//!               refresh cycle (blocking)
//!                     │
//!                     ▼
//!   sleep until next load time ──► refresh ──► every 24h ──► refresh ...
//! ```
//!
//! # Modules
//!
//! - [`schedule`] - Next load time computation and the refresh calendar
//! - [`trigger`] - The refresh cycle, startup restore and the timer loop
//! - [`error`] - Scheduler error type

pub mod error;
pub mod schedule;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use schedule::{
    next_load_time, RefreshSchedule, RefreshTimezone, DEFAULT_DAY_OFFSET_MINUTES, DEFAULT_PERIOD,
};
pub use trigger::{
    RefreshEvent, RefreshScheduler, RefreshState, RefreshStatus, SchedulerHandle, StartupOutcome,
};
