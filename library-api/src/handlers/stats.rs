use crate::middleware::AdminContext;
use crate::models::CatalogStats;
use crate::startup::AppState;
use axum::{extract::State, Json};
use library_core::error::AppError;
use serde_json::json;

pub const CATALOG_STATS_KEY: &str = "stats:catalog";

pub async fn get_stats(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<serde_json::Value>, AppError> {
    let documents = match state.cache.get(CATALOG_STATS_KEY) {
        Some(cached) => cached,
        None => {
            let stats: CatalogStats = state.documents.catalog_stats().await?;
            let value =
                serde_json::to_value(stats).map_err(|e| AppError::InternalError(e.into()))?;
            state.cache.insert(CATALOG_STATS_KEY, value.clone());
            value
        }
    };

    Ok(Json(json!({
        "documents": documents,
        "usage": state.usage.snapshot(),
    })))
}
