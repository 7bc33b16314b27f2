use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

struct CacheEntry<V> {
    payload: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Process-wide cache of assembled response payloads, keyed by request
/// category.
///
/// Guarantees:
/// - Entries expire independently after `ttl`; an expired entry reads as absent.
/// - `put` always overwrites (last write wins, no merge).
/// - The lock is never held across an await. `get` clones under the read
///   lock, so payloads should be cheap handles (`Arc<..>`).
pub struct ResponseCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached payload for `key` unless it is missing or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now, self.ttl))
            .map(|e| e.payload.clone())
    }

    /// Stores `payload` under `key` with a fresh timestamp.
    pub fn put(&self, key: impl Into<String>, payload: V) {
        let entry = CacheEntry {
            payload,
            stored_at: Instant::now(),
        };
        self.entries.write().insert(key.into(), entry);
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|e| e.is_live(now, self.ttl))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries. Expiry is already enforced lazily by `get`;
    /// this only reclaims memory for keys nobody asks for anymore.
    #[instrument(skip(self), target = "cache")]
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let before = entries.len();
        entries.retain(|_, e| e.is_live(now, self.ttl));
        let removed = before - entries.len();

        if removed > 0 {
            debug!(removed, remaining = entries.len(), "expired cache entries swept");
        }
        removed
    }
}
