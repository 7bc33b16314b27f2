//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tokio::time::Instant;

use crate::api::AppState;
use crate::metrics::counters::CountersSnapshot;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub index: IndexHealth,
    pub cache_entries: usize,
    pub counters: CountersSnapshot,
}

#[derive(Debug, Serialize)]
pub struct IndexHealth {
    pub buckets: usize,
    /// Seconds since the last successful rebuild; `None` before the first one.
    pub age_secs: Option<u64>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.catalog.prices().snapshot();
    let age_secs = snapshot
        .built_at
        .map(|built| Instant::now().saturating_duration_since(built).as_secs());

    Json(HealthResponse {
        status: "ok",
        index: IndexHealth {
            buckets: snapshot.index.len(),
            age_secs,
        },
        cache_entries: state.catalog.cache().len(),
        counters: state.counters.snapshot(),
    })
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
