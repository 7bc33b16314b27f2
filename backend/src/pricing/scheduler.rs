//! Lazy, serialized rebuilds of the process-wide price index.
//!
//! Guarantees:
//! - At most one rebuild per `refresh_interval`; fresh callers return after a
//!   single snapshot read.
//! - At most one rebuild runs at a time (`rebuild` mutex, double-checked).
//! - Readers never block on a rebuild: the new index is built off to the side
//!   and swapped in as one `Arc`, so a reader sees either the previous index
//!   or the new one.
//! - A failed, timed out or cancelled rebuild publishes nothing.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::AppError;
use crate::logger::warn_if_slow;
use crate::metrics::counters::Counters;
use crate::pricing::aggregate::{AggregationPolicy, aggregate};
use crate::pricing::model::PriceIndex;
use crate::pricing::repository::SampleRepository;
use crate::time::now_utc;

/// The index together with the instant it was built.
/// `built_at == None` means no rebuild has succeeded yet.
#[derive(Clone, Debug, Default)]
pub struct PriceSnapshot {
    pub index: Arc<PriceIndex>,
    pub built_at: Option<Instant>,
}

impl PriceSnapshot {
    fn is_fresh(&self, now: Instant, interval: Duration) -> bool {
        self.built_at
            .is_some_and(|built| now.saturating_duration_since(built) < interval)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Index was young enough; nothing was queried.
    Fresh,
    /// A rebuild ran and its result was swapped in.
    Rebuilt { samples: usize, buckets: usize },
}

pub struct PriceIndexScheduler {
    samples: Arc<dyn SampleRepository>,
    policy: AggregationPolicy,
    refresh_interval: Duration,
    query_timeout: Duration,

    current: RwLock<PriceSnapshot>,
    /// Held for the whole rebuild; serializes rebuilds only.
    rebuild: Mutex<()>,

    counters: Counters,
}

impl PriceIndexScheduler {
    pub fn new(
        samples: Arc<dyn SampleRepository>,
        policy: AggregationPolicy,
        refresh_interval: Duration,
        query_timeout: Duration,
        counters: Counters,
    ) -> Self {
        Self {
            samples,
            policy,
            refresh_interval,
            query_timeout,
            current: RwLock::new(PriceSnapshot::default()),
            rebuild: Mutex::new(()),
            counters,
        }
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> PriceSnapshot {
        self.current.read().clone()
    }

    pub fn index(&self) -> Arc<PriceIndex> {
        Arc::clone(&self.current.read().index)
    }

    fn is_fresh(&self) -> bool {
        self.current
            .read()
            .is_fresh(Instant::now(), self.refresh_interval)
    }

    /// Rebuilds the index if it is older than the refresh interval.
    ///
    /// Errors are non-fatal for callers: the previous index stays in place
    /// and remains readable through [`Self::index`].
    #[instrument(skip(self), target = "pricing")]
    pub async fn refresh(&self) -> Result<RefreshOutcome, AppError> {
        if self.is_fresh() {
            return Ok(RefreshOutcome::Fresh);
        }

        let _guard = self.rebuild.lock().await;

        // A concurrent caller may have rebuilt while we waited.
        if self.is_fresh() {
            debug!("index rebuilt by a concurrent caller");
            return Ok(RefreshOutcome::Fresh);
        }

        match self.rebuild_locked().await {
            Ok(outcome) => {
                Counters::incr(&self.counters.index_rebuilds);
                Ok(outcome)
            }
            Err(e) => {
                Counters::incr(&self.counters.index_rebuild_failures);
                warn!(error = %e, "price index rebuild aborted; keeping previous index");
                Err(e)
            }
        }
    }

    async fn rebuild_locked(&self) -> Result<RefreshOutcome, AppError> {
        let started = Instant::now();
        let now = now_utc();
        let cutoff = self.policy.cutoff(now);

        let fetched = tokio::time::timeout(
            self.query_timeout,
            warn_if_slow(
                "sample_store_fetch",
                Duration::from_millis(500),
                self.samples.fetch_since(cutoff),
            ),
        )
        .await;

        let samples = match fetched {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => return Err(AppError::PriceRefresh(format!("{e:#}"))),
            Err(_) => {
                return Err(AppError::PriceRefresh(format!(
                    "sample store query exceeded {}ms",
                    self.query_timeout.as_millis()
                )));
            }
        };

        let index = aggregate(&samples, now, &self.policy);
        let buckets = index.len();

        *self.current.write() = PriceSnapshot {
            index: Arc::new(index),
            built_at: Some(Instant::now()),
        };

        info!(
            samples = samples.len(),
            buckets,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "price index rebuilt"
        );

        Ok(RefreshOutcome::Rebuilt {
            samples: samples.len(),
            buckets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, TimeDelta, Utc};
    use tokio::task::JoinSet;

    use crate::pricing::model::{PriceKey, RawPriceSample};

    const HOUR: Duration = Duration::from_secs(3_600);

    /// Returns one sample per item, all priced at the current generation
    /// (1 for the first call, 2 for the second...).
    struct MockSampleRepository {
        calls: AtomicUsize,
        items: usize,
        delay: Duration,
        fail: parking_lot::Mutex<bool>,
    }

    impl MockSampleRepository {
        fn new(items: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                items,
                delay: Duration::ZERO,
                fail: parking_lot::Mutex::new(false),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SampleRepository for MockSampleRepository {
        async fn fetch_since(&self, _cutoff: DateTime<Utc>) -> anyhow::Result<Vec<RawPriceSample>> {
            let generation = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if *self.fail.lock() {
                return Err(anyhow::anyhow!("Database Offline"));
            }

            let now = Utc::now();
            Ok((0..self.items)
                .map(|i| RawPriceSample {
                    item_id: format!("item-{i}"),
                    league: "Standard".to_string(),
                    currency: "chaos".to_string(),
                    price: generation as f64,
                    volume: 1.0,
                    stock: 1.0,
                    observed_at: now - TimeDelta::minutes(5),
                })
                .collect())
        }
    }

    fn scheduler(repo: Arc<MockSampleRepository>) -> PriceIndexScheduler {
        PriceIndexScheduler::new(
            repo,
            AggregationPolicy::default(),
            HOUR,
            Duration::from_secs(5),
            Counters::default(),
        )
    }

    fn price_of(index: &PriceIndex, item: &str) -> f64 {
        index
            .get(&PriceKey::new(item, "Standard", "chaos"))
            .unwrap()
            .price
    }

    #[tokio::test(start_paused = true)]
    async fn first_refresh_builds_the_index() {
        let repo = Arc::new(MockSampleRepository::new(3));
        let sched = scheduler(repo.clone());

        assert!(sched.snapshot().built_at.is_none());
        assert!(sched.index().is_empty());

        let outcome = sched.refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Rebuilt { samples: 3, buckets: 3 });
        assert_eq!(sched.index().len(), 3);
        assert!(sched.snapshot().built_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_within_interval_queries_once() {
        let repo = Arc::new(MockSampleRepository::new(1));
        let sched = scheduler(repo.clone());

        sched.refresh().await.unwrap();
        let second = sched.refresh().await.unwrap();

        assert_eq!(second, RefreshOutcome::Fresh);
        assert_eq!(repo.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_after_interval_rebuilds() {
        let repo = Arc::new(MockSampleRepository::new(1));
        let sched = scheduler(repo.clone());

        sched.refresh().await.unwrap();
        tokio::time::advance(HOUR + Duration::from_secs(1)).await;
        sched.refresh().await.unwrap();

        assert_eq!(repo.calls(), 2);
        assert_eq!(price_of(&sched.index(), "item-0"), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_rebuild_keeps_previous_index() {
        let repo = Arc::new(MockSampleRepository::new(2));
        let sched = scheduler(repo.clone());

        sched.refresh().await.unwrap();
        let before = sched.snapshot();

        tokio::time::advance(HOUR * 2).await;
        *repo.fail.lock() = true;

        let err = sched.refresh().await.unwrap_err();
        assert!(matches!(err, AppError::PriceRefresh(_)));
        assert!(err.to_string().contains("Database Offline"));

        let after = sched.snapshot();
        assert!(Arc::ptr_eq(&before.index, &after.index));
        assert_eq!(before.built_at, after.built_at);
        assert_eq!(sched.counters.snapshot().index_rebuild_failures, 1);

        // Still stale, so the next call retries.
        *repo.fail.lock() = false;
        sched.refresh().await.unwrap();
        assert_eq!(price_of(&sched.index(), "item-0"), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sample_store_times_out_without_publishing() {
        let mut repo = MockSampleRepository::new(1);
        repo.delay = Duration::from_secs(30);
        let repo = Arc::new(repo);
        let sched = scheduler(repo.clone());

        let err = sched.refresh().await.unwrap_err();

        assert!(err.to_string().contains("exceeded"));
        assert!(sched.index().is_empty());
        assert!(sched.snapshot().built_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_rebuild_keeps_previous_index() {
        let mut repo = MockSampleRepository::new(2);
        repo.delay = Duration::from_secs(3);
        let repo = Arc::new(repo);
        let sched = scheduler(repo.clone());

        sched.refresh().await.unwrap();
        let before = sched.snapshot();
        tokio::time::advance(HOUR * 2).await;

        // Dropped mid-query, while holding the rebuild lock.
        let dropped = tokio::time::timeout(Duration::from_secs(1), sched.refresh()).await;
        assert!(dropped.is_err());
        assert_eq!(repo.calls(), 2);

        let after = sched.snapshot();
        assert!(Arc::ptr_eq(&before.index, &after.index));
        assert_eq!(before.built_at, after.built_at);
        assert_eq!(sched.counters.snapshot().index_rebuild_failures, 0);

        // Lock was released on drop; the next caller rebuilds.
        let outcome = sched.refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Rebuilt { samples: 2, buckets: 2 });
        assert_eq!(price_of(&sched.index(), "item-0"), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_rebuild_once() {
        let mut repo = MockSampleRepository::new(50);
        repo.delay = Duration::from_millis(200);
        let repo = Arc::new(repo);
        let sched = Arc::new(scheduler(repo.clone()));

        let mut set = JoinSet::new();
        for _ in 0..16 {
            let s = Arc::clone(&sched);
            set.spawn(async move { s.refresh().await });
        }

        let mut rebuilt = 0;
        while let Some(res) = set.join_next().await {
            if let RefreshOutcome::Rebuilt { .. } = res.expect("task panicked").unwrap() {
                rebuilt += 1;
            }
        }

        assert_eq!(rebuilt, 1);
        assert_eq!(repo.calls(), 1);
        assert_eq!(sched.index().len(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn readers_never_see_a_mixed_index() {
        let mut repo = MockSampleRepository::new(200);
        repo.delay = Duration::from_millis(50);
        let repo = Arc::new(repo);
        let sched = Arc::new(scheduler(repo.clone()));
        sched.refresh().await.unwrap();

        let writer = {
            let s = Arc::clone(&sched);
            tokio::spawn(async move {
                for _ in 0..5 {
                    tokio::time::advance(HOUR * 2).await;
                    s.refresh().await.unwrap();
                }
            })
        };

        let reader = {
            let s = Arc::clone(&sched);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let index = s.index();
                    let first = price_of(&index, "item-0");
                    assert!(index.iter().all(|(_, st)| st.price == first));
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(repo.calls(), 6);
    }
}
