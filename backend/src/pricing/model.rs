use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ItemId = String;
pub type League = String;
pub type CurrencyId = String;

/// One observed trade/listing price point, as persisted by the ingestion job.
/// Read-only to this service.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPriceSample {
    pub item_id: ItemId,
    pub league: League,
    pub currency: CurrencyId,
    pub price: f64,
    pub volume: f64,
    pub stock: f64,
    pub observed_at: DateTime<Utc>,
}

/// Aggregation bucket: one (item, league, currency) combination.
///
/// Field order matters: the derived `Ord` sorts by item first, so every
/// bucket of an item forms a contiguous range in [`PriceIndex`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceKey {
    pub item_id: ItemId,
    pub league: League,
    pub currency: CurrencyId,
}

impl PriceKey {
    pub fn new(
        item_id: impl Into<ItemId>,
        league: impl Into<League>,
        currency: impl Into<CurrencyId>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            league: league.into(),
            currency: currency.into(),
        }
    }

    /// Smallest possible key for `item_id`; lower bound of its range.
    fn first_of(item_id: &str) -> Self {
        Self::new(item_id, String::new(), String::new())
    }
}

/// Derived scalars for one bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    /// Recency- and volume-weighted average price.
    pub price: f64,
    /// Mean traded volume across the bucket's samples.
    pub volume: f64,
    /// Mean available stock across the bucket's samples.
    pub stock: f64,
}

/// Per-item output shape: league -> currency -> stats.
pub type ItemPrices = BTreeMap<League, BTreeMap<CurrencyId, PriceStats>>;

/// Immutable set of aggregated buckets produced by one rebuild.
///
/// Stored flat under a composite key; an index is never edited after
/// construction, a rebuild produces a new one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceIndex {
    entries: BTreeMap<PriceKey, PriceStats>,
}

impl PriceIndex {
    pub fn from_entries(entries: impl IntoIterator<Item = (PriceKey, PriceStats)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &PriceKey) -> Option<&PriceStats> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PriceKey, &PriceStats)> {
        self.entries.iter()
    }

    /// All buckets of one item, ordered by league then currency.
    pub fn buckets_for<'a>(
        &'a self,
        item_id: &'a str,
    ) -> impl Iterator<Item = (&'a PriceKey, &'a PriceStats)> + 'a {
        self.entries
            .range(PriceKey::first_of(item_id)..)
            .take_while(move |(k, _)| k.item_id == item_id)
    }

    /// Nested view of an item's buckets, or `None` if the item has none.
    pub fn prices_for(&self, item_id: &str) -> Option<ItemPrices> {
        let mut out = ItemPrices::new();
        for (key, stats) in self.buckets_for(item_id) {
            out.entry(key.league.clone())
                .or_default()
                .insert(key.currency.clone(), *stats);
        }

        (!out.is_empty()).then_some(out)
    }
}
