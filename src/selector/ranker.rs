//! Score ordering and randomized top-K pick

use rand::Rng;
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::fetcher::FetchedCandidate;

/// Default number of top-ranked entries eligible to win
pub const DEFAULT_TOP_K: usize = 20;

/// A fetched candidate with its computed score
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub entry: FetchedCandidate,
    pub score: f64,
}

/// Orders fetched candidates by `new / old` and picks among the best K
///
/// Picking uniformly among the top K rather than always taking the maximum
/// keeps a single outlier series from winning every day.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    top_k: usize,
}

impl Ranker {
    /// Create a ranker; `top_k` of zero is treated as one
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Drop invalid outcomes and sort the rest by descending score
    ///
    /// The sort is stable: equal scores keep their fetch order.
    pub fn rank(&self, entries: Vec<FetchedCandidate>) -> Vec<Ranked> {
        let mut ranked: Vec<Ranked> = entries
            .into_iter()
            .filter_map(|entry| match entry.outcome.validate() {
                Ok(()) => {
                    let score = entry.outcome.new_value / entry.outcome.old_value;
                    Some(Ranked { entry, score })
                }
                Err(e) => {
                    warn!(candidate = %entry.candidate, error = %e, "Excluding invalid outcome");
                    None
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        for r in &ranked {
            debug!(candidate = %r.entry.candidate, score = r.score, "Ranked");
        }

        ranked
    }

    /// Entries eligible to win: the first `min(K, len)` of a ranked list
    pub fn eligible<'a>(&self, ranked: &'a [Ranked]) -> &'a [Ranked] {
        &ranked[..self.top_k.min(ranked.len())]
    }

    /// Pick one of the eligible entries uniformly at random
    pub fn pick<'a, R: Rng + ?Sized>(
        &self,
        ranked: &'a [Ranked],
        rng: &mut R,
    ) -> Option<&'a Ranked> {
        let eligible = self.eligible(ranked);
        if eligible.is_empty() {
            return None;
        }
        eligible.get(rng.gen_range(0..eligible.len()))
    }

    /// Rank then pick in one step
    pub fn select<R: Rng + ?Sized>(
        &self,
        entries: Vec<FetchedCandidate>,
        rng: &mut R,
    ) -> Option<Ranked> {
        let ranked = self.rank(entries);
        self.pick(&ranked, rng).cloned()
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}
