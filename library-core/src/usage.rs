//! Usage statistics counters.
//!
//! Per-route request and error counts plus upload totals, kept in memory and
//! reported through the admin stats endpoint. Values reset on restart.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct RouteCounters {
    requests: AtomicU64,
    errors: AtomicU64,
}

pub struct UsageMonitor {
    started_at: DateTime<Utc>,
    routes: DashMap<String, RouteCounters>,
    uploaded_files: AtomicU64,
    uploaded_bytes: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RouteUsage {
    pub requests: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub uploaded_files: u64,
    pub uploaded_bytes: u64,
    pub routes: BTreeMap<String, RouteUsage>,
}

impl Default for UsageMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageMonitor {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            routes: DashMap::new(),
            uploaded_files: AtomicU64::new(0),
            uploaded_bytes: AtomicU64::new(0),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Count one request against `route`. 4xx and 5xx responses also count as errors.
    pub fn record_request(&self, route: &str, status: u16) {
        let counters = self.routes.entry(route.to_string()).or_default();
        counters.requests.fetch_add(1, Ordering::Relaxed);
        if status >= 400 {
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_upload(&self, bytes: u64) {
        self.uploaded_files.fetch_add(1, Ordering::Relaxed);
        self.uploaded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let routes: BTreeMap<String, RouteUsage> = self
            .routes
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    RouteUsage {
                        requests: entry.requests.load(Ordering::Relaxed),
                        errors: entry.errors.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        UsageSnapshot {
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            total_requests: routes.values().map(|r| r.requests).sum(),
            total_errors: routes.values().map(|r| r.errors).sum(),
            uploaded_files: self.uploaded_files.load(Ordering::Relaxed),
            uploaded_bytes: self.uploaded_bytes.load(Ordering::Relaxed),
            routes,
        }
    }
}
