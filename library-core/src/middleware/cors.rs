use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type, X-Request-Id";
const MAX_AGE_SECONDS: &str = "86400";

/// Origins permitted to call the API from a browser.
///
/// A single `*` entry allows any origin (credentials are then not advertised).
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Arc<Self> {
        let allowed_origins = allowed_origins
            .into_iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        Arc::new(Self { allowed_origins })
    }

    fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allows_any() || self.allowed_origins.iter().any(|o| o == origin)
    }

    fn apply(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        if self.allows_any() {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        } else {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
    }
}

/// Per-request allow-list check.
///
/// Preflights from allowed origins are answered directly with 204, preflights
/// from other origins with 403. Simple requests always reach the handler; only
/// allowed origins get CORS headers on the response.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();

    let Some(origin) = origin else {
        return next.run(request).await;
    };

    let allowed = origin
        .to_str()
        .map(|o| policy.is_allowed(o))
        .unwrap_or(false);

    let is_preflight = request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    if is_preflight {
        if !allowed {
            tracing::warn!(origin = ?origin, "Rejected CORS preflight from disallowed origin");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Origin not allowed" })),
            )
                .into_response();
        }

        let mut response = StatusCode::NO_CONTENT.into_response();
        policy.apply(&origin, response.headers_mut());
        response.headers_mut().insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE_SECONDS),
        );
        return response;
    }

    let mut response = next.run(request).await;
    if allowed {
        policy.apply(&origin, response.headers_mut());
    }
    response
}
