//! Published selection shared with readers
//!
//! The cache is a readers-writer lock around one optional [`Selection`].
//! Readers get a full clone; a publish swaps the whole value under the
//! write lock, so no reader can see fields from two different cycles.
//! tokio's `RwLock` queues waiters fairly, so neither a stream of readers
//! nor repeated publishes can starve the other side.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::models::Selection;

/// Thread-safe holder of the current selection
#[derive(Debug, Default)]
pub struct SelectionCache {
    current: RwLock<Option<Selection>>,

    /// Number of publishes since creation
    generation: AtomicU64,
}

impl SelectionCache {
    /// Create an empty cache; readers see "not yet available" until the first publish
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache already holding a restored selection
    pub fn with_selection(selection: Selection) -> Self {
        Self {
            current: RwLock::new(Some(selection)),
            generation: AtomicU64::new(1),
        }
    }

    /// Snapshot of the current selection
    pub async fn current(&self) -> Option<Selection> {
        self.current.read().await.clone()
    }

    /// Replace the current selection as one unit
    pub async fn publish(&self, selection: Selection) {
        let mut guard = self.current.write().await;
        *guard = Some(selection);
        self.generation.fetch_add(1, Ordering::SeqCst);
        crate::metrics::set_selection_published(true);
    }

    /// Whether a selection has ever been published
    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Cycle time of the current selection
    pub async fn selected_at(&self) -> Option<DateTime<Utc>> {
        self.current.read().await.as_ref().map(|s| s.selected_at)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Get cache status
    pub async fn status(&self) -> CacheStatus {
        let selected_at = self.selected_at().await;
        CacheStatus {
            has_selection: selected_at.is_some(),
            selected_at,
            age_seconds: selected_at.map(|t| (Utc::now() - t).num_seconds()),
            generation: self.generation(),
        }
    }
}

/// Cache status information
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatus {
    pub has_selection: bool,
    pub selected_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<i64>,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, FetchOutcome};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn selection(key: &str, value: f64) -> Selection {
        Selection::new(
            Candidate::new("TEST", key, format!("desc {key}")),
            FetchOutcome {
                old_value: value,
                new_value: value * 2.0,
                old_time: Utc.with_ymd_and_hms(2016, 1, 4, 0, 0, 0).unwrap(),
                new_time: Utc.with_ymd_and_hms(2016, 12, 30, 0, 0, 0).unwrap(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_empty_until_published() {
        let cache = SelectionCache::new();
        assert!(cache.current().await.is_none());
        assert!(!cache.is_ready().await);
        assert_eq!(cache.generation(), 0);

        cache.publish(selection("A", 1.0)).await;
        assert!(cache.is_ready().await);
        assert_eq!(cache.current().await.unwrap().candidate.key, "A");
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn test_publish_replaces_whole_selection() {
        let cache = SelectionCache::with_selection(selection("A", 1.0));
        cache.publish(selection("B", 7.0)).await;

        let current = cache.current().await.unwrap();
        assert_eq!(current.candidate.key, "B");
        assert_eq!(current.outcome.old_value, 7.0);
        assert_eq!(cache.generation(), 2);
    }

    #[tokio::test]
    async fn test_status() {
        let cache = SelectionCache::new();
        let before = cache.status().await;
        assert!(!before.has_selection);
        assert!(before.age_seconds.is_none());

        cache.publish(selection("A", 1.0)).await;
        let after = cache.status().await;
        assert!(after.has_selection);
        assert!(after.age_seconds.unwrap() < 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_never_mix_fields() {
        let cache = Arc::new(SelectionCache::with_selection(selection("K0", 1.0)));

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 1..200u32 {
                    cache.publish(selection(&format!("K{i}"), f64::from(i) + 1.0)).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let s = cache.current().await.unwrap();
                    let i: f64 = s.candidate.key[1..].parse().unwrap();
                    assert_eq!(s.outcome.old_value, i + 1.0);
                    assert_eq!(s.candidate.description, format!("desc {}", s.candidate.key));
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
    }
}
