use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub cache_hits: Arc<AtomicU64>,
    pub cache_misses: Arc<AtomicU64>,
    // misses that produced no items and were not cached
    pub empty_results: Arc<AtomicU64>,

    pub index_rebuilds: Arc<AtomicU64>,
    pub index_rebuild_failures: Arc<AtomicU64>,
}

/// Point-in-time copy of [`Counters`], serialized by the health endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub empty_results: u64,
    pub index_rebuilds: u64,
    pub index_rebuild_failures: u64,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            index_rebuilds: self.index_rebuilds.load(Ordering::Relaxed),
            index_rebuild_failures: self.index_rebuild_failures.load(Ordering::Relaxed),
        }
    }
}
