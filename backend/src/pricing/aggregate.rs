//! Recency-weighted aggregation of raw price samples.
//!
//! Each sample contributes `volume * exp(-age_hours / decay_hours)` of weight
//! to its (item, league, currency) bucket. The bucket price is the weighted
//! mean of sample prices; volume and stock are plain means.
//!
//! The result is a smoothing estimate that tracks recent liquid trades, not
//! an exact market price.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::pricing::model::{PriceIndex, PriceKey, PriceStats, RawPriceSample};
use crate::time::hours_between;

/// Window and decay parameters for one aggregation pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AggregationPolicy {
    /// Samples observed at or before `now - horizon` are ignored.
    pub horizon: TimeDelta,
    /// Decay constant (tau) in hours.
    pub decay_hours: f64,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            horizon: TimeDelta::hours(24),
            decay_hours: 1.0,
        }
    }
}

impl AggregationPolicy {
    /// Exclusive lower bound of the trailing window ending at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.horizon
    }
}

/// Weight of a sample of `volume` observed `age_hours` ago.
/// Future-stamped samples (negative age) count as observed now.
pub fn recency_weight(volume: f64, age_hours: f64, decay_hours: f64) -> f64 {
    volume * (-age_hours.max(0.0) / decay_hours).exp()
}

#[derive(Default)]
struct Accumulator {
    samples: u32,
    weighted_price: f64,
    weight: f64,
    volume: f64,
    stock: f64,
}

impl Accumulator {
    fn add(&mut self, sample: &RawPriceSample, weight: f64) {
        self.samples += 1;
        self.weighted_price += sample.price * weight;
        self.weight += weight;
        self.volume += sample.volume;
        self.stock += sample.stock;
    }

    /// `None` when the bucket carries no usable weight.
    fn finish(&self) -> Option<PriceStats> {
        if self.samples == 0 || !(self.weight.is_finite() && self.weight > 0.0) {
            return None;
        }

        let n = f64::from(self.samples);
        let stats = PriceStats {
            price: self.weighted_price / self.weight,
            volume: self.volume / n,
            stock: self.stock / n,
        };

        stats.price.is_finite().then_some(stats)
    }
}

/// Builds a fresh [`PriceIndex`] from `samples` as of `now`.
pub fn aggregate(
    samples: &[RawPriceSample],
    now: DateTime<Utc>,
    policy: &AggregationPolicy,
) -> PriceIndex {
    let cutoff = policy.cutoff(now);

    let mut buckets: HashMap<(&str, &str, &str), Accumulator> = HashMap::new();
    let mut out_of_window = 0usize;

    for s in samples {
        if s.observed_at <= cutoff {
            out_of_window += 1;
            continue;
        }

        let age_hours = hours_between(now, s.observed_at);
        let weight = recency_weight(s.volume, age_hours, policy.decay_hours);

        buckets
            .entry((s.item_id.as_str(), s.league.as_str(), s.currency.as_str()))
            .or_default()
            .add(s, weight);
    }

    let total = buckets.len();
    let index = PriceIndex::from_entries(buckets.into_iter().filter_map(
        |((item, league, currency), acc)| {
            acc.finish()
                .map(|stats| (PriceKey::new(item, league, currency), stats))
        },
    ));

    let dropped = total - index.len();
    if dropped > 0 || out_of_window > 0 {
        debug!(
            dropped_buckets = dropped,
            out_of_window, "aggregation skipped degenerate input"
        );
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(
        item: &str,
        price: f64,
        volume: f64,
        stock: f64,
        age: TimeDelta,
        now: DateTime<Utc>,
    ) -> RawPriceSample {
        RawPriceSample {
            item_id: item.to_string(),
            league: "Standard".to_string(),
            currency: "chaos".to_string(),
            price,
            volume,
            stock,
            observed_at: now - age,
        }
    }

    fn key(item: &str) -> PriceKey {
        PriceKey::new(item, "Standard", "chaos")
    }

    #[test]
    fn empty_input_yields_empty_index() {
        let index = aggregate(&[], Utc::now(), &AggregationPolicy::default());
        assert!(index.is_empty());
    }

    #[test]
    fn single_sample_bucket_reproduces_the_sample() {
        let now = Utc::now();
        let s = sample("a", 42.5, 7.0, 3.0, TimeDelta::hours(3), now);

        let index = aggregate(&[s], now, &AggregationPolicy::default());
        let stats = index.get(&key("a")).unwrap();

        assert!((stats.price - 42.5).abs() < 1e-9);
        assert_eq!(stats.volume, 7.0);
        assert_eq!(stats.stock, 3.0);
    }

    #[test]
    fn recent_sample_dominates_stale_high_volume_sample() {
        let now = Utc::now();
        let samples = [
            sample("a", 100.0, 10.0, 1.0, TimeDelta::minutes(30), now),
            sample("a", 90.0, 100.0, 1.0, TimeDelta::hours(5), now),
        ];

        let index = aggregate(&samples, now, &AggregationPolicy::default());
        let stats = index.get(&key("a")).unwrap();

        let w1 = 10.0 * (-0.5f64).exp();
        let w2 = 100.0 * (-5.0f64).exp();
        let expected = (w1 * 100.0 + w2 * 90.0) / (w1 + w2);

        assert!((stats.price - expected).abs() < 1e-9);
        assert!(stats.price > 90.0 && stats.price < 100.0);
        assert!((stats.price - 99.0).abs() < 0.01);
        assert_eq!(stats.volume, 55.0);
    }

    #[test]
    fn zero_weight_bucket_is_dropped() {
        let now = Utc::now();
        let samples = [
            sample("zero", 10.0, 0.0, 5.0, TimeDelta::hours(1), now),
            sample("ok", 10.0, 1.0, 5.0, TimeDelta::hours(1), now),
        ];

        let index = aggregate(&samples, now, &AggregationPolicy::default());

        assert!(index.get(&key("zero")).is_none());
        assert!(index.get(&key("ok")).is_some());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn samples_outside_window_are_excluded() {
        let now = Utc::now();
        let policy = AggregationPolicy::default();
        let samples = [
            sample("a", 1_000.0, 1_000.0, 1.0, TimeDelta::hours(24), now),
            sample("a", 10.0, 1.0, 1.0, TimeDelta::hours(23), now),
        ];

        let index = aggregate(&samples, now, &policy);
        let stats = index.get(&key("a")).unwrap();

        assert!((stats.price - 10.0).abs() < 1e-9);
        assert_eq!(stats.volume, 1.0);
    }

    #[test]
    fn buckets_are_split_by_league_and_currency() {
        let now = Utc::now();
        let mut divine = sample("a", 0.5, 1.0, 1.0, TimeDelta::hours(1), now);
        divine.currency = "divine".to_string();
        let mut hardcore = sample("a", 80.0, 1.0, 1.0, TimeDelta::hours(1), now);
        hardcore.league = "Hardcore".to_string();
        let samples = [
            sample("a", 100.0, 1.0, 1.0, TimeDelta::hours(1), now),
            divine,
            hardcore,
        ];

        let index = aggregate(&samples, now, &AggregationPolicy::default());

        assert_eq!(index.len(), 3);
        let divine = index.get(&PriceKey::new("a", "Standard", "divine")).unwrap();
        let hardcore = index.get(&PriceKey::new("a", "Hardcore", "chaos")).unwrap();
        assert!((divine.price - 0.5).abs() < 1e-12);
        assert!((hardcore.price - 80.0).abs() < 1e-9);
    }

    #[test]
    fn future_samples_are_weighted_as_current() {
        assert_eq!(recency_weight(5.0, -3.0, 1.0), 5.0);
        assert!((recency_weight(5.0, 1.0, 1.0) - 5.0 * (-1.0f64).exp()).abs() < 1e-12);
    }
}
