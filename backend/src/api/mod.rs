//! Thin HTTP surface over [`CatalogService`].

mod error;
mod health;
mod items;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::catalog::service::CatalogService;
use crate::logger::{TraceId, request_span};
use crate::metrics::counters::Counters;

pub use error::ErrorResponse;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub counters: Counters,
}

/// Full router with CORS and per-request tracing spans.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        request_span(req.method().as_str(), req.uri().path(), &TraceId::default())
    });

    Router::new()
        .merge(items::routes())
        .merge(health::routes())
        .layer(trace)
        .layer(cors)
        .with_state(state)
}
