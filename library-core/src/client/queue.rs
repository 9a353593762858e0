use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Caps the number of concurrent outbound calls.
///
/// Callers beyond the limit wait for a permit in FIFO order.
#[derive(Clone)]
pub struct RequestQueue {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl RequestQueue {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Calls currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    pub async fn run<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = self.permits.acquire().await;
        f().await
    }
}
