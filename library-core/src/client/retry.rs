//! HTTP retry utilities for calls to the backend platform.
//!
//! Provides configurable retry logic with exponential backoff. A `Retry-After`
//! header on 429/503 responses overrides the computed backoff.

use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Backoff policy for calls to the backend platform.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Ceiling for the computed exponential delay.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Adds up to 25% random delay so clients don't retry in lockstep.
    pub add_jitter: bool,
    /// Ceiling for server-provided `Retry-After` values.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt + 1`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponential =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_ms = exponential.min(self.max_backoff.as_millis() as f64) as u64;

        let jitter_ms = if self.add_jitter {
            (capped_ms as f64 * 0.25 * rand::random::<f64>()) as u64
        } else {
            0
        };

        Duration::from_millis(capped_ms + jitter_ms)
    }
}

/// Statuses worth another attempt: timeouts, throttling, and server errors.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Parse a `Retry-After` header given in seconds.
pub fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Execute an HTTP call with retry logic.
///
/// Transport errors and retryable statuses are retried until `max_retries` is
/// exhausted. The last response is returned as-is so the caller can map its
/// status; only a final transport failure yields `Err`.
///
/// ```ignore
/// let response = retry_request(&RetryConfig::default(), "list_documents", || {
///     client.get(&url).send()
/// })
/// .await?;
/// ```
pub async fn retry_request<F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        let outcome = f().await;

        let wait = match &outcome {
            Ok(response) if !is_retryable_status(response.status()) => {
                if attempt > 0 && response.status().is_success() {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "HTTP call succeeded after retry"
                    );
                }
                return outcome;
            }
            Ok(response) => {
                let status = response.status();
                let hinted = if status == StatusCode::TOO_MANY_REQUESTS
                    || status == StatusCode::SERVICE_UNAVAILABLE
                {
                    retry_after(response).map(|d| d.min(config.max_retry_after))
                } else {
                    None
                };
                let wait = hinted.unwrap_or_else(|| config.backoff_duration(attempt));

                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        status = %status,
                        "HTTP call failed after max retries"
                    );
                    return outcome;
                }

                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    status = %status,
                    backoff_ms = wait.as_millis() as u64,
                    retry_after_hint = hinted.is_some(),
                    "HTTP call returned retryable status, retrying after backoff"
                );
                wait
            }
            Err(error) => {
                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        error = %error,
                        "HTTP call failed after max retries"
                    );
                    return outcome;
                }

                let wait = config.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %error,
                    backoff_ms = wait.as_millis() as u64,
                    "HTTP call failed, retrying after backoff"
                );
                wait
            }
        };

        sleep(wait).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            add_jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_duration() {
        let config = RetryConfig {
            add_jitter: false,
            ..Default::default()
        };

        assert_eq!(config.backoff_duration(0), Duration::from_millis(100));
        assert_eq!(config.backoff_duration(1), Duration::from_millis(200));
        assert_eq!(config.backoff_duration(2), Duration::from_millis(400));
        assert_eq!(config.backoff_duration(20), Duration::from_secs(10));
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn honors_retry_after_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/documents"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/rest/v1/documents", server.uri());
        let started = Instant::now();

        let response = retry_request(&fast_config(3), "list_documents", || {
            client.get(&url).send()
        })
        .await
        .expect("request should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            started.elapsed() >= Duration::from_secs(2),
            "retry must wait for Retry-After, waited {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn stops_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();

        let response = retry_request(&fast_config(2), "health", || client.get(&url).send())
            .await
            .expect("final response is returned");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        // MockServer verifies the expected call count on drop.
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();

        let response = retry_request(&fast_config(3), "get_document", || client.get(&url).send())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn retries_transport_errors_then_gives_up() {
        let client = reqwest::Client::new();
        // Nothing listens on port 9 of localhost in the test environment.
        let result = retry_request(&fast_config(1), "unreachable", || {
            client.get("http://127.0.0.1:9/").send()
        })
        .await;

        assert!(result.is_err());
    }
}
