use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

fn check_label(result: &Result<(), library_core::error::AppError>) -> String {
    match result {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    }
}

/// Pings the database, object storage, and auth provider.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (database, storage, auth) = tokio::join!(
        state.store.health_check(),
        state.storage.health_check(),
        state.auth.health_check()
    );

    let healthy = database.is_ok() && storage.is_ok() && auth.is_ok();
    if !healthy {
        tracing::warn!(
            database = %check_label(&database),
            storage = %check_label(&storage),
            auth = %check_label(&auth),
            "Health check failed"
        );
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "unhealthy" },
            "service": state.settings.service_name,
            "version": env!("CARGO_PKG_VERSION"),
            "checks": {
                "database": check_label(&database),
                "storage": check_label(&storage),
                "auth": check_label(&auth),
            }
        })),
    )
}

pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
