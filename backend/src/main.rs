use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use backend::{
    api::{AppState, router},
    catalog::{repository_sqlx::SqlxItemRepository, service::CatalogService},
    config::AppConfig,
    db::Db,
    logger::init_tracing,
    metrics::counters::Counters,
    pricing::{repository_sqlx::SqlxSampleRepository, scheduler::PriceIndexScheduler},
};

/// Connects the DB, runs migrations and wires repositories, the price index
/// scheduler and the catalog service.
async fn init_catalog(cfg: &AppConfig, counters: &Counters) -> anyhow::Result<Arc<CatalogService>> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let samples = Arc::new(SqlxSampleRepository::new(db.pool.clone()));
    let items = Arc::new(SqlxItemRepository::new(db.pool.clone()));

    let prices = Arc::new(PriceIndexScheduler::new(
        samples,
        cfg.aggregation,
        cfg.price_refresh_interval,
        cfg.upstream_timeout,
        counters.clone(),
    ));

    Ok(Arc::new(CatalogService::new(
        items,
        prices,
        cfg.response_cache_ttl,
        cfg.upstream_timeout,
        counters.clone(),
    )))
}

/// Builds the first index in the background so the first request does not
/// pay for it. Failure is not fatal: the next request retries.
fn start_index_warmup(catalog: Arc<CatalogService>) {
    tokio::spawn(async move {
        if let Err(e) = catalog.prices().refresh().await {
            tracing::error!(error = %e, "initial price index build failed");
        }
    });
}

/// Periodically drops expired response cache entries.
fn start_cache_sweep_loop(catalog: Arc<CatalogService>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            catalog.cache().sweep_expired();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; the environment may already be populated.
    let _ = dotenvy::dotenv();

    sqlx::any::install_default_drivers();

    let cfg = AppConfig::from_env()?;
    init_tracing(cfg.json_logs);

    tracing::info!("Starting item pricing backend...");

    let counters = Counters::default();
    let catalog = init_catalog(&cfg, &counters).await?;

    start_index_warmup(Arc::clone(&catalog));
    start_cache_sweep_loop(Arc::clone(&catalog), cfg.cache_sweep_interval);

    let app = router(AppState { catalog, counters });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
