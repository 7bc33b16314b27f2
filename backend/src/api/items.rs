//! Catalog listing endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::api::AppState;
use crate::catalog::model::CategorySelector;
use crate::error::AppError;
use crate::logger::annotate_category;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items/{category}", get(list_category))
        .route("/items/{category}/{subcategory}", get(list_sub_category))
}

async fn list_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Response, AppError> {
    let selector = CategorySelector::from_path(&category, None)?;
    serve(&state, selector).await
}

async fn list_sub_category(
    State(state): State<AppState>,
    Path((category, subcategory)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let selector = CategorySelector::from_path(&category, Some(subcategory.as_str()))?;
    serve(&state, selector).await
}

async fn serve(state: &AppState, selector: CategorySelector) -> Result<Response, AppError> {
    annotate_category(selector.name());

    let payload = state.catalog.items_for_category(&selector).await?;
    Ok(Json(&payload[..]).into_response())
}
