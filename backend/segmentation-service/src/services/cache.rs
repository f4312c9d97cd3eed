//! Segment cache keyed by cohort signature.
//!
//! Each key owns a `OnceCell`: the first caller computes, concurrent callers
//! for the same key wait on the same cell instead of re-running the pipeline.
//! Failed computations drop their slot so the next caller retries and the
//! map does not fill up with empty cells.

use crate::error::Result;
use crate::metrics;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::debug;

struct CacheSlot<V> {
    cell: OnceCell<Arc<V>>,
    created_at: Instant,
}

impl<V> CacheSlot<V> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            created_at: Instant::now(),
        }
    }

    /// Only completed entries expire; in-flight computations are never replaced
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cell.initialized() && self.created_at.elapsed() >= ttl
    }
}

pub struct SegmentCache<V> {
    enabled: bool,
    ttl: Duration,
    slots: DashMap<String, Arc<CacheSlot<V>>>,
}

impl<V> SegmentCache<V> {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        debug!(enabled, ttl_secs = ttl.as_secs(), "Initializing segment cache");
        Self {
            enabled,
            ttl,
            slots: DashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, Duration::ZERO)
    }

    /// Completed and in-flight entries
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.slots.retain(|_, slot| !slot.is_expired(ttl));
    }

    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if !self.enabled {
            return compute().await.map(Arc::new);
        }

        // Clone the slot out so no shard lock is held across the await
        let slot = {
            let mut entry = self
                .slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(CacheSlot::new()));
            if entry.is_expired(self.ttl) {
                *entry = Arc::new(CacheSlot::new());
            }
            Arc::clone(entry.value())
        };

        let hit = slot.cell.initialized();
        metrics::record_cache(hit);
        debug!(key = key, hit, "Segment cache lookup");

        let outcome = slot
            .cell
            .get_or_try_init(move || async move { compute().await.map(Arc::new) })
            .await
            .map(Arc::clone);
        if outcome.is_err() {
            // Only our own slot, and only if no later caller filled it meanwhile
            self.slots
                .remove_if(key, |_, s| Arc::ptr_eq(s, &slot) && !s.cell.initialized());
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_computes_once_per_key() {
        let cache: SegmentCache<usize> = SegmentCache::new(true, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("cohort", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache: Arc<SegmentCache<usize>> =
            Arc::new(SegmentCache::new(true, Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_compute("cohort", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(7)
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(*task.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: SegmentCache<usize> = SegmentCache::new(true, Duration::from_secs(60));

        let first = cache
            .get_or_compute("cohort", || async {
                Err(AppError::InsufficientData("one user".into()))
            })
            .await;
        assert!(first.is_err());

        let second = cache.get_or_compute("cohort", || async { Ok(1) }).await;
        assert_eq!(*second.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_keys_leave_no_slots() {
        let cache: SegmentCache<u32> = SegmentCache::new(true, Duration::ZERO);

        for i in 0..100 {
            let result = cache
                .get_or_compute(&format!("cohort-{}", i), || async {
                    Err(AppError::InsufficientData("one user".into()))
                })
                .await;
            assert!(result.is_err());
        }
        assert!(cache.is_empty());

        cache.purge_expired();
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_expired_entries_recompute() {
        let cache: SegmentCache<usize> = SegmentCache::new(true, Duration::ZERO);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_compute("cohort", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let cache: SegmentCache<usize> = SegmentCache::disabled();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_compute("cohort", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
