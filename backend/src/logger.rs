use std::time::Duration;
use tokio::time::Instant;
use tracing::{Span, field};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

/// Correlation id attached to the root span of every inbound request.
#[derive(Clone, Debug)]
pub struct TraceId(String);

impl TraceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(json: bool) {
    // sqlx logs every statement at info.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    // Request spans report their latency on close.
    let layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(layer.json().flatten_event(true).with_current_span(true))
            .init();
    } else {
        registry.with(layer.compact()).init();
    }
}

/// Root span for one HTTP request. `category` is filled in by the handler
/// once the path has been parsed.
pub fn request_span(method: &str, path: &str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "request",
        method = %method,
        path = %path,
        trace_id = %trace_id.as_str(),
        category = field::Empty
    )
}

pub fn annotate_category(category: &str) {
    Span::current().record("category", field::display(category));
}

/// Awaits `fut` and warns when an upstream call took longer than `budget`.
pub async fn warn_if_slow<F, T>(op: &'static str, budget: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let started = Instant::now();
    let out = fut.await;

    let elapsed = started.elapsed();
    if elapsed > budget {
        tracing::warn!(
            op,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = budget.as_millis() as u64,
            "slow upstream call"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn slow_call_is_reported() {
        let v = warn_if_slow("sample_store_fetch", Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(250)).await;
            7
        })
        .await;

        assert_eq!(v, 7);
        assert!(logs_contain("slow upstream call"));
        assert!(logs_contain("sample_store_fetch"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn fast_call_is_silent() {
        let v = warn_if_slow("item_store_fetch", Duration::from_millis(100), async { 1 }).await;

        assert_eq!(v, 1);
        assert!(!logs_contain("slow upstream call"));
    }

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(TraceId::default().as_str(), TraceId::default().as_str());
    }
}
