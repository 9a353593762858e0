//! REST client for the managed backend platform.
//!
//! Rows go through the PostgREST-style API under `/rest/v1`, auth through
//! `/auth/v1`, and objects through `/storage/v1`. Every call is bounded by the
//! request queue and retried on transient failures.

use crate::config::BackendConfig;
use crate::models::{
    ActivityLog, AdminUser, AuthSession, AuthenticatedUser, CatalogStats, Counter, Document,
    DocumentChanges, DocumentPage, DocumentQuery, DocumentStats, DocumentStatus, DocumentType,
};
use crate::services::auth::AuthProvider;
use crate::services::store::DocumentStore;
use async_trait::async_trait;
use library_core::client::{retry_request, RequestQueue, RetryConfig};
use library_core::error::AppError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use uuid::Uuid;

const DOCUMENTS: &str = "documents";
const DOCUMENT_STATS: &str = "document_stats";
const ADMIN_USERS: &str = "admin_users";
const ACTIVITY_LOGS: &str = "activity_logs";

/// Rows per request when a whole table is read for aggregation.
const SCAN_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    anon_key: Secret<String>,
    service_key: Secret<String>,
    retry: RetryConfig,
    queue: RequestQueue,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
            retry: RetryConfig {
                max_retries: config.max_retries,
                initial_backoff: config.initial_backoff,
                ..RetryConfig::default()
            },
            queue: RequestQueue::new(config.max_concurrent_requests),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn rest_url(&self, table: &str) -> String {
        self.url(&format!("rest/v1/{}", table))
    }

    /// Request carrying the service key, for row and storage access.
    pub fn service_request(&self, method: Method, url: &str) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        self.http
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key)
    }

    /// Request carrying the public key, for the auth provider.
    fn auth_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
    }

    /// Send the request produced by `build`, rebuilt on every attempt.
    pub async fn send<F>(&self, operation: &str, build: F) -> Result<Response, AppError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        self.queue
            .run(|| retry_request(&self.retry, operation, || build().send()))
            .await
            .map_err(|e| {
                tracing::error!(operation, error = %e, "Backend request failed");
                AppError::BackendError(anyhow::anyhow!("{} failed: {}", operation, e))
            })
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        operation: &str,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let url = self.rest_url(table);
        let response = self
            .send(operation, || {
                self.service_request(Method::GET, &url).query(params)
            })
            .await?;
        let response = ensure_success(response, operation).await?;
        Ok(response.json().await?)
    }

    /// Read every row of `table` in `page_size` chunks.
    ///
    /// The row API caps each response at its max-rows setting, so paging stops on the exact
    /// count from `Content-Range` rather than on a short page.
    async fn fetch_all_rows<T: DeserializeOwned>(
        &self,
        operation: &str,
        table: &str,
        select: &str,
        order: &str,
        page_size: usize,
    ) -> Result<Vec<T>, AppError> {
        let url = self.rest_url(table);
        let page_size = page_size.max(1);
        let mut rows: Vec<T> = Vec::new();

        loop {
            let params = [
                ("select", select.to_string()),
                ("order", order.to_string()),
                ("limit", page_size.to_string()),
                ("offset", rows.len().to_string()),
            ];
            let response = self
                .send(operation, || {
                    self.service_request(Method::GET, &url)
                        .query(&params)
                        .header("Prefer", "count=exact")
                })
                .await?;
            let response = ensure_success(response, operation).await?;

            let total = response
                .headers()
                .get(reqwest::header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total);

            let page: Vec<T> = response.json().await?;
            let fetched = page.len();
            rows.extend(page);

            let done = match total {
                Some(total) => fetched == 0 || rows.len() as u64 >= total,
                None => fetched < page_size,
            };
            if done {
                break;
            }
        }

        tracing::debug!(operation, table, rows = rows.len(), "Table scanned");
        Ok(rows)
    }
}

async fn ensure_success(response: Response, operation: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(operation, status = %status, body = %body, "Backend returned an error");
    Err(AppError::BackendError(anyhow::anyhow!(
        "{} failed with status {}",
        operation,
        status
    )))
}

/// Total from a `Content-Range` header such as `0-11/42` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Strip characters that carry meaning in the row API's filter grammar and
/// escape `_`, which `ilike` would otherwise treat as a single-character wildcard.
fn sanitize_filter_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%' | '"' | '\\' | ':'))
        .collect::<String>()
        .trim()
        .replace('_', "\\_")
}

fn list_params(query: &DocumentQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("select", "*".to_string()),
        ("order", "created_at.desc".to_string()),
        ("limit", query.limit.to_string()),
        ("offset", query.offset().to_string()),
    ];

    if let Some(status) = query.status {
        params.push(("status", format!("eq.{}", status.as_str())));
    }
    if let Some(category) = &query.category {
        let category = sanitize_filter_value(category);
        if !category.is_empty() {
            params.push(("category", format!("ilike.{}", category)));
        }
    }
    if let Some(document_type) = query.document_type {
        params.push(("type", format!("eq.{}", document_type.as_str())));
    }
    if let Some(search) = &query.search {
        let term = sanitize_filter_value(search);
        if !term.is_empty() {
            params.push((
                "or",
                format!(
                    "(title.ilike.*{t}*,author.ilike.*{t}*,description.ilike.*{t}*)",
                    t = term
                ),
            ));
        }
    }

    params
}

#[derive(Deserialize)]
struct CatalogRow {
    #[serde(rename = "type")]
    document_type: DocumentType,
    category: String,
    file_size: i64,
    status: DocumentStatus,
}

#[derive(Deserialize)]
struct CounterRow {
    view_count: i64,
    download_count: i64,
}

#[async_trait]
impl DocumentStore for BackendClient {
    async fn list_documents(&self, query: &DocumentQuery) -> Result<DocumentPage, AppError> {
        let url = self.rest_url(DOCUMENTS);
        let params = list_params(query);

        let response = self
            .send("list_documents", || {
                self.service_request(Method::GET, &url)
                    .query(&params)
                    .header("Prefer", "count=exact")
            })
            .await?;
        let response = ensure_success(response, "list_documents").await?;

        let total_header = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        let documents: Vec<Document> = response.json().await?;
        let total = total_header.unwrap_or(documents.len() as u64);

        Ok(DocumentPage { documents, total })
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let rows: Vec<Document> = self
            .fetch_rows(
                "get_document",
                DOCUMENTS,
                &[
                    ("select", "*".to_string()),
                    ("id", format!("eq.{}", id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_document(&self, document: &Document) -> Result<Document, AppError> {
        let url = self.rest_url(DOCUMENTS);

        let response = self
            .send("insert_document", || {
                self.service_request(Method::POST, &url)
                    .header("Prefer", "return=representation")
                    .json(document)
            })
            .await?;
        let response = ensure_success(response, "insert_document").await?;

        let rows: Vec<Document> = response.json().await?;
        rows.into_iter().next().ok_or_else(|| {
            AppError::BackendError(anyhow::anyhow!("Insert returned no row for {}", document.id))
        })
    }

    async fn update_document(
        &self,
        id: Uuid,
        changes: &DocumentChanges,
    ) -> Result<Option<Document>, AppError> {
        let url = self.rest_url(DOCUMENTS);
        let filter = [("id", format!("eq.{}", id))];

        let response = self
            .send("update_document", || {
                self.service_request(Method::PATCH, &url)
                    .query(&filter)
                    .header("Prefer", "return=representation")
                    .json(changes)
            })
            .await?;
        let response = ensure_success(response, "update_document").await?;

        let rows: Vec<Document> = response.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn increment_counter(&self, id: Uuid, counter: Counter) -> Result<(), AppError> {
        let url = self.rest_url(&format!("rpc/{}", counter.rpc_name()));
        let body = json!({ "doc_id": id });

        let response = self
            .send(counter.rpc_name(), || {
                self.service_request(Method::POST, &url).json(&body)
            })
            .await?;
        ensure_success(response, counter.rpc_name()).await?;
        Ok(())
    }

    async fn document_stats(&self, id: Uuid) -> Result<Option<DocumentStats>, AppError> {
        let rows: Vec<DocumentStats> = self
            .fetch_rows(
                "document_stats",
                DOCUMENT_STATS,
                &[
                    ("select", "*".to_string()),
                    ("document_id", format!("eq.{}", id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn catalog_stats(&self) -> Result<CatalogStats, AppError> {
        let documents: Vec<CatalogRow> = self
            .fetch_all_rows(
                "catalog_stats",
                DOCUMENTS,
                "type,category,file_size,status",
                "id.asc",
                SCAN_PAGE_SIZE,
            )
            .await?;
        let counters: Vec<CounterRow> = self
            .fetch_all_rows(
                "catalog_counters",
                DOCUMENT_STATS,
                "view_count,download_count",
                "document_id.asc",
                SCAN_PAGE_SIZE,
            )
            .await?;

        let mut stats = CatalogStats::default();
        for row in &documents {
            stats.record(row.document_type, &row.category, row.file_size, row.status);
        }
        for row in &counters {
            stats.record_counters(row.view_count, row.download_count);
        }
        Ok(stats)
    }

    async fn find_admin(&self, user_id: Uuid) -> Result<Option<AdminUser>, AppError> {
        let rows: Vec<AdminUser> = self
            .fetch_rows(
                "find_admin",
                ADMIN_USERS,
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{}", user_id)),
                    ("is_active", "eq.true".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn log_activity(&self, entry: &ActivityLog) -> Result<(), AppError> {
        let url = self.rest_url(ACTIVITY_LOGS);

        let response = self
            .send("log_activity", || {
                self.service_request(Method::POST, &url)
                    .header("Prefer", "return=minimal")
                    .json(entry)
            })
            .await?;
        ensure_success(response, "log_activity").await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let _: Vec<serde_json::Value> = self
            .fetch_rows(
                "database_health",
                DOCUMENTS,
                &[("select", "id".to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for BackendClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let url = self.url("auth/v1/token");
        let body = json!({ "email": email, "password": password });

        let response = self
            .send("sign_in", || {
                self.auth_request(Method::POST, &url)
                    .query(&[("grant_type", "password")])
                    .json(&body)
            })
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                tracing::info!(email, "Sign-in rejected by auth provider");
                Err(AppError::Unauthorized(anyhow::anyhow!(
                    "Invalid email or password"
                )))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::TooManyRequests(
                "Too many sign-in attempts. Please try again later.".to_string(),
                None,
            )),
            _ => {
                ensure_success(response, "sign_in").await?;
                Err(AppError::BackendError(anyhow::anyhow!(
                    "Unexpected sign-in response"
                )))
            }
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthenticatedUser, AppError> {
        let url = self.url("auth/v1/user");

        let response = self
            .send("get_user", || {
                self.auth_request(Method::GET, &url).bearer_auth(access_token)
            })
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")),
            ),
            _ => {
                ensure_success(response, "get_user").await?;
                Err(AppError::BackendError(anyhow::anyhow!(
                    "Unexpected user lookup response"
                )))
            }
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let url = self.url("auth/v1/logout");

        let response = self
            .send("sign_out", || {
                self.auth_request(Method::POST, &url).bearer_auth(access_token)
            })
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(()),
            _ => ensure_success(response, "sign_out").await.map(|_| ()),
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let url = self.url("auth/v1/health");
        let response = self
            .send("auth_health", || self.auth_request(Method::GET, &url))
            .await?;
        ensure_success(response, "auth_health").await?;
        Ok(())
    }
}
