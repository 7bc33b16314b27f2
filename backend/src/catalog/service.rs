//! Category listing with merged prices, served through the response cache.
//!
//! Flow per request:
//! 1) Cache hit -> return the stored payload unchanged.
//! 2) Miss -> fetch base items (failure fails the request).
//! 3) Opportunistic price index refresh (failure is logged, previous index used).
//! 4) Merge prices into the items.
//! 5) Cache the complete payload unless it is empty, then return it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument};

use crate::cache::ResponseCache;
use crate::catalog::merge::merge_prices;
use crate::catalog::model::{CategorySelector, Item};
use crate::catalog::repository::ItemRepository;
use crate::error::AppError;
use crate::logger::warn_if_slow;
use crate::metrics::counters::Counters;
use crate::pricing::scheduler::PriceIndexScheduler;

/// Assembled response for one category. Shared, never mutated.
pub type CatalogPayload = Arc<[Item]>;

pub struct CatalogService {
    items: Arc<dyn ItemRepository>,
    prices: Arc<PriceIndexScheduler>,
    cache: ResponseCache<CatalogPayload>,
    query_timeout: Duration,
    counters: Counters,
}

impl CatalogService {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        prices: Arc<PriceIndexScheduler>,
        cache_ttl: Duration,
        query_timeout: Duration,
        counters: Counters,
    ) -> Self {
        Self {
            items,
            prices,
            cache: ResponseCache::new(cache_ttl),
            query_timeout,
            counters,
        }
    }

    pub fn prices(&self) -> &PriceIndexScheduler {
        &self.prices
    }

    pub fn cache(&self) -> &ResponseCache<CatalogPayload> {
        &self.cache
    }

    #[instrument(skip(self), target = "catalog", fields(category = %selector))]
    pub async fn items_for_category(
        &self,
        selector: &CategorySelector,
    ) -> Result<CatalogPayload, AppError> {
        let key = selector.cache_key();

        if let Some(hit) = self.cache.get(&key) {
            Counters::incr(&self.counters.cache_hits);
            debug!(items = hit.len(), "cache hit");
            return Ok(hit);
        }
        Counters::incr(&self.counters.cache_misses);

        let items = self.fetch_items(selector).await?;

        if let Err(e) = self.prices.refresh().await {
            error!(error = %e, "price refresh failed; serving previous index");
        }
        let index = self.prices.index();

        let payload: CatalogPayload = merge_prices(items, &index).into();

        if payload.is_empty() {
            Counters::incr(&self.counters.empty_results);
            info!("no items for category; result not cached");
        } else {
            self.cache.put(key, Arc::clone(&payload));
            info!(items = payload.len(), "cache miss; payload stored");
        }

        Ok(payload)
    }

    async fn fetch_items(&self, selector: &CategorySelector) -> Result<Vec<Item>, AppError> {
        let fetched = tokio::time::timeout(
            self.query_timeout,
            warn_if_slow(
                "item_store_fetch",
                Duration::from_millis(200),
                self.items.fetch_items(selector),
            ),
        )
        .await;

        match fetched {
            Ok(Ok(items)) => Ok(items),
            Ok(Err(e)) => Err(AppError::ItemStore(format!("{e:#}"))),
            Err(_) => Err(AppError::Timeout(format!(
                "item store query for {selector} exceeded {}ms",
                self.query_timeout.as_millis()
            ))),
        }
    }
}
