use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::TimeDelta;

use crate::pricing::aggregate::AggregationPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// TCP port the HTTP server binds to (all interfaces).
    pub port: u16,

    /// Emit JSON logs instead of the pretty dev format.
    pub json_logs: bool,

    // =========================
    // Price index configuration
    // =========================
    /// Minimum time between two price index rebuilds.
    ///
    /// Requests arriving inside this window reuse the current index
    /// without touching the sample store.
    pub price_refresh_interval: Duration,

    /// Trailing window and recency decay used when aggregating samples.
    pub aggregation: AggregationPolicy,

    // =========================
    // Response cache configuration
    // =========================
    /// Maximum age of an assembled category payload before it is
    /// treated as absent.
    pub response_cache_ttl: Duration,

    /// Cadence of the background sweep that drops expired payloads.
    /// Expiry itself is lazy; the sweep only reclaims memory.
    pub cache_sweep_interval: Duration,

    // =========================
    // Upstream configuration
    // =========================
    /// Upper bound on a single item store or sample store query.
    pub upstream_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://item_pricing_dev.db?mode=rwc".to_string());

        let port = std::env::var("PORT")
            .map_err(|_| anyhow!("PORT env variable is required"))?
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let json_logs = std::env::var("APP_ENV").unwrap_or_default() == "production";

        let window_hours: i64 = env_or("PRICE_WINDOW_HOURS", 24)?;
        let decay_hours: f64 = env_or("PRICE_DECAY_HOURS", 1.0)?;
        if !(decay_hours.is_finite() && decay_hours > 0.0) {
            return Err(anyhow!("PRICE_DECAY_HOURS must be positive, got {decay_hours}"));
        }

        Ok(Self {
            database_url,
            port,
            json_logs,

            // Defaults mirror the hourly cadence the price feed is written at.
            price_refresh_interval: env_duration(
                "PRICE_REFRESH_INTERVAL_SECS",
                3_600,
                Duration::from_secs,
            )?,
            aggregation: AggregationPolicy {
                horizon: price_window(window_hours)?,
                decay_hours,
            },

            response_cache_ttl: env_duration("RESPONSE_CACHE_TTL_SECS", 3_600, Duration::from_secs)?,
            cache_sweep_interval: env_duration("CACHE_SWEEP_INTERVAL_SECS", 600, Duration::from_secs)?,

            upstream_timeout: env_duration("UPSTREAM_TIMEOUT_MS", 10_000, Duration::from_millis)?,
        })
    }
}

/// Reads `key` from the environment, falling back to `default` when unset.
/// A value that is present but malformed is an error.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Like [`env_or`] for a non-zero duration in the given unit.
fn env_duration(key: &str, default: u64, unit: fn(u64) -> Duration) -> anyhow::Result<Duration> {
    let d = unit(env_or(key, default)?);
    if d.is_zero() {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(d)
}

fn price_window(hours: i64) -> anyhow::Result<TimeDelta> {
    TimeDelta::try_hours(hours)
        .filter(|h| *h > TimeDelta::zero())
        .ok_or_else(|| anyhow!("PRICE_WINDOW_HOURS out of range: {hours}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        let v: u64 = env_or("ITEM_PRICING_TEST_SURELY_UNSET", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn env_or_rejects_malformed_values() {
        // SAFETY: key is unique to this test.
        unsafe { std::env::set_var("ITEM_PRICING_TEST_MALFORMED", "soon") };
        let err = env_or::<u64>("ITEM_PRICING_TEST_MALFORMED", 1).unwrap_err();
        assert!(format!("{err:#}").contains("ITEM_PRICING_TEST_MALFORMED"));
    }

    #[test]
    fn env_duration_rejects_zero() {
        // SAFETY: key is unique to this test.
        unsafe { std::env::set_var("ITEM_PRICING_TEST_ZERO_INTERVAL", "0") };
        let err = env_duration("ITEM_PRICING_TEST_ZERO_INTERVAL", 600, Duration::from_secs)
            .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn env_duration_applies_unit_to_default() {
        let d = env_duration("ITEM_PRICING_TEST_UNSET_TIMEOUT", 250, Duration::from_millis).unwrap();
        assert_eq!(d, Duration::from_millis(250));
    }

    #[test]
    fn price_window_bounds() {
        assert_eq!(price_window(24).unwrap(), TimeDelta::hours(24));
        assert!(price_window(0).is_err());
        assert!(price_window(-3).is_err());
        assert!(price_window(i64::MAX).is_err());
    }
}
