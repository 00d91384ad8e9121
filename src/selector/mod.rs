//! Ranking of fetched candidates and the published selection
//!
//! - [`ranker`] - score ordering and randomized top-K pick
//! - [`cache`] - readers-writer holder of the current selection

pub mod cache;
pub mod ranker;

pub use cache::{CacheStatus, SelectionCache};
pub use ranker::{Ranked, Ranker, DEFAULT_TOP_K};
