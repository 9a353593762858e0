pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod tracing;

pub use cors::{cors_middleware, CorsPolicy};
pub use metrics::{metrics_middleware, usage_middleware};
pub use rate_limit::{
    client_ip, create_ip_rate_limiter, ip_rate_limit_middleware, spawn_prune_task, IpRateLimiter,
    WindowRateLimiter,
};
pub use security_headers::security_headers_middleware;
pub use self::tracing::{make_request_span, request_id_middleware, REQUEST_ID_HEADER};
