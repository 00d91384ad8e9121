// Core data structures for the hindsight selector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One fetchable item from the configured candidate list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub source: String, // Data source / database code (e.g., "WIKI")
    pub key: String,    // Dataset code within the source (e.g., "AAPL")
    pub description: String,
}

impl Candidate {
    pub fn new(
        source: impl Into<String>,
        key: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
            description: description.into(),
        }
    }

    /// Qualified identifier: {source}/{key}
    pub fn id(&self) -> String {
        format!("{}/{}", self.source, self.key)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.key)
    }
}

/// Two observations of a candidate's value, `old` strictly preceding `new`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub old_value: f64,
    pub new_value: f64,
    pub old_time: DateTime<Utc>,
    pub new_time: DateTime<Utc>,
}

impl FetchOutcome {
    /// Check the outcome can be ranked
    ///
    /// The old value must be a positive finite number (it is the divisor of the
    /// score), the new value finite, and the old observation strictly earlier.
    pub fn validate(&self) -> Result<(), InvalidOutcome> {
        if !self.old_value.is_finite() || self.old_value <= 0.0 {
            return Err(InvalidOutcome::NonPositiveBase(self.old_value));
        }
        if !self.new_value.is_finite() {
            return Err(InvalidOutcome::NonFiniteValue(self.new_value));
        }
        if self.old_time >= self.new_time {
            return Err(InvalidOutcome::TimesOutOfOrder {
                old: self.old_time,
                new: self.new_time,
            });
        }
        Ok(())
    }

    /// Ratio of the newer observation to the older one
    ///
    /// Returns `None` for outcomes that fail [`FetchOutcome::validate`].
    pub fn score(&self) -> Option<f64> {
        self.validate().ok().map(|()| self.new_value / self.old_value)
    }

    /// Relative change in percent: 100 * (new - old) / old
    pub fn percent_change(&self) -> Option<f64> {
        self.score().map(|s| (s - 1.0) * 100.0)
    }
}

/// Why a fetch outcome was excluded from ranking
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidOutcome {
    #[error("old value {0} is not a positive number")]
    NonPositiveBase(f64),

    #[error("new value {0} is not finite")]
    NonFiniteValue(f64),

    #[error("old observation {old} does not precede new observation {new}")]
    TimesOutOfOrder {
        old: DateTime<Utc>,
        new: DateTime<Utc>,
    },
}

/// The published winner of a refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub candidate: Candidate,
    pub outcome: FetchOutcome,
    /// Wall-clock time the cycle that produced this selection started
    pub selected_at: DateTime<Utc>,
}

impl Selection {
    pub fn new(candidate: Candidate, outcome: FetchOutcome, selected_at: DateTime<Utc>) -> Self {
        Self {
            candidate,
            outcome,
            selected_at,
        }
    }

    pub fn score(&self) -> Option<f64> {
        self.outcome.score()
    }
}
