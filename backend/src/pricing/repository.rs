use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::pricing::model::RawPriceSample;

#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// All samples observed strictly after `cutoff`. Transport or query
    /// failures are errors, never a silently truncated result.
    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RawPriceSample>>;
}
