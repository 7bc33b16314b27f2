use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};

use crate::db::Dialect;
use crate::pricing::model::RawPriceSample;
use crate::pricing::repository::SampleRepository;
use crate::time::from_unix_secs;

/// SQLx-backed implementation of SampleRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxSampleRepository {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlxSampleRepository {
    pub fn new(pool: AnyPool) -> Self {
        let dialect = Dialect::of(&pool);
        Self { pool, dialect }
    }
}

#[async_trait]
impl SampleRepository for SqlxSampleRepository {
    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<RawPriceSample>> {
        let sql = format!(
            r#"
SELECT item_id, league, currency_id, price, volume, stock, "timestamp"
FROM prices
WHERE "timestamp" > {};
"#,
            self.dialect.param(1)
        );

        let rows = sqlx::query(&sql)
            .bind(cutoff.timestamp())
            .fetch_all(&self.pool)
            .await
            .context("querying price samples")?;

        // Any undecodable row fails the fetch; partial windows are never returned.
        rows.iter()
            .enumerate()
            .map(|(i, r)| row_to_sample(r).with_context(|| format!("decoding price row {i}")))
            .collect()
    }
}

fn row_to_sample(r: &sqlx::any::AnyRow) -> anyhow::Result<RawPriceSample> {
    let ts: i64 = r.try_get("timestamp")?;
    let observed_at = from_unix_secs(ts).ok_or_else(|| anyhow!("timestamp out of range: {ts}"))?;

    Ok(RawPriceSample {
        item_id: r.try_get("item_id")?,
        league: r.try_get("league")?,
        currency: r.try_get("currency_id")?,
        price: finite(r.try_get("price")?, "price")?,
        volume: finite(r.try_get("volume")?, "volume")?,
        stock: finite(r.try_get("stock")?, "stock")?,
        observed_at,
    })
}

fn finite(v: f64, column: &str) -> anyhow::Result<f64> {
    if !v.is_finite() {
        return Err(anyhow!("non-finite {column}: {v}"));
    }
    Ok(v)
}
