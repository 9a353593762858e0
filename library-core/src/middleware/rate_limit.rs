use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<WindowRateLimiter>;

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started: Instant,
    count: u32,
}

/// Fixed-window counter: at most `max_requests` per key inside each window.
/// A key's window opens on its first request and its counter resets once the window has elapsed.
#[derive(Debug)]
pub struct WindowRateLimiter {
    windows: DashMap<IpAddr, WindowState>,
    max_requests: u32,
    window: Duration,
    trusted_proxy_hops: usize,
}

impl WindowRateLimiter {
    pub fn new(max_requests: u32, window: Duration, trusted_proxy_hops: usize) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: max_requests.max(1),
            window,
            trusted_proxy_hops,
        }
    }

    /// Count a request for `key`. On rejection returns how long until the window resets.
    pub fn check_key(&self, key: &IpAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let mut entry = self.windows.entry(*key).or_insert(WindowState {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = WindowState {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            return Err(self.window.saturating_sub(elapsed));
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop keys whose window has elapsed.
    pub fn retain_recent(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, state| now.saturating_duration_since(state.started) < self.window);
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn trusted_proxy_hops(&self) -> usize {
        self.trusted_proxy_hops
    }
}

/// Create a keyed rate limiter (by IP)
pub fn create_ip_rate_limiter(
    attempts: u32,
    window_seconds: u64,
    trusted_proxy_hops: usize,
) -> IpRateLimiter {
    Arc::new(WindowRateLimiter::new(
        attempts,
        Duration::from_secs(window_seconds.max(1)),
        trusted_proxy_hops,
    ))
}

/// Client IP as seen by the nearest trusted proxy.
///
/// Each of the `trusted_proxy_hops` proxies appends the address it received the request from
/// to `X-Forwarded-For`, so the client is the entry that many positions from the right. Entries
/// further left are client-supplied and ignored. With no trusted proxies, or no usable header,
/// the peer address is used.
pub fn client_ip(request: &Request, trusted_proxy_hops: usize) -> Option<IpAddr> {
    let forwarded_ip = (trusted_proxy_hops > 0)
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
        })
        .flatten()
        .and_then(|header| {
            let hops: Vec<&str> = header.split(',').map(str::trim).collect();
            let index = hops.len().saturating_sub(trusted_proxy_hops);
            hops.get(index).and_then(|s| s.parse::<IpAddr>().ok())
        });

    forwarded_ip.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match client_ip(&request, limiter.trusted_proxy_hops()) {
        Some(ip) => match limiter.check_key(&ip) {
            Ok(()) => Ok(next.run(request).await),
            Err(wait_time) => {
                tracing::warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}

/// Periodically drop limiter state for keys whose window has elapsed.
pub fn spawn_prune_task(limiter: IpRateLimiter, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            limiter.retain_recent();
            limiter.windows.shrink_to_fit();
        }
    })
}
