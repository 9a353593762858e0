use crate::usage::UsageMonitor;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

/// Route label: the matched route template, so path parameters don't explode cardinality.
fn route_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(&req);

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    let labels = [("method", method), ("path", path), ("status", status)];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    response
}

/// Feed every request into the in-memory usage counters.
pub async fn usage_middleware(
    State(monitor): State<Arc<UsageMonitor>>,
    req: Request,
    next: Next,
) -> Response {
    let route = format!("{} {}", req.method(), route_label(&req));
    let response = next.run(req).await;
    monitor.record_request(&route, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn usage_is_recorded_by_route_template() {
        let monitor = UsageMonitor::shared();
        let app = Router::new()
            .route("/api/documents/:id", get(|| async { "doc" }))
            .route_layer(from_fn_with_state(monitor.clone(), usage_middleware));

        for id in ["a", "b"] {
            app.clone()
                .oneshot(
                    axum::http::Request::builder()
                        .uri(format!("/api/documents/{}", id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.routes["GET /api/documents/:id"].requests, 2);
    }
}
