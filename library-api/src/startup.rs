use crate::config::{LibraryConfig, RateLimitConfig, StorageBackend, UploadLimits};
use crate::handlers;
use crate::middleware::{require_admin, require_auth};
use crate::models::ActivityLog;
use crate::services::{
    AuthProvider, BackendClient, DocumentService, DocumentStore, LocalStorage, RemoteStorage,
    Storage,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use library_core::cache::{spawn_purge_task, TtlCache};
use library_core::error::AppError;
use library_core::middleware::{
    cors_middleware, create_ip_rate_limiter, ip_rate_limit_middleware, make_request_span,
    metrics_middleware, request_id_middleware, security_headers_middleware, spawn_prune_task,
    usage_middleware, CorsPolicy, IpRateLimiter,
};
use library_core::usage::UsageMonitor;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Settings the request path needs, separated from process-level config.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub service_name: String,
    pub uploads: UploadLimits,
    pub cache_ttl: Duration,
    pub secure_cookies: bool,
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Directory served under `/files` when storage is local.
    pub files_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            service_name: "library-api".to_string(),
            uploads: UploadLimits::default(),
            cache_ttl: Duration::from_secs(60),
            secure_cookies: false,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            rate_limit: RateLimitConfig {
                login_attempts: 5,
                login_window_seconds: 900,
                api_limit: 100,
                api_window_seconds: 60,
                trusted_proxy_hops: 1,
            },
            files_dir: None,
        }
    }
}

impl From<&LibraryConfig> for AppSettings {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            service_name: config.service_name.clone(),
            uploads: config.uploads,
            cache_ttl: config.cache.ttl,
            secure_cookies: config.security.secure_cookies,
            allowed_origins: config.security.allowed_origins.clone(),
            rate_limit: config.rate_limit.clone(),
            files_dir: (config.storage.backend == StorageBackend::Local)
                .then(|| PathBuf::from(&config.storage.local_path)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AppSettings>,
    pub store: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn Storage>,
    pub auth: Arc<dyn AuthProvider>,
    pub documents: DocumentService,
    pub cache: TtlCache<serde_json::Value>,
    pub usage: Arc<UsageMonitor>,
    pub login_rate_limiter: IpRateLimiter,
    pub api_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn Storage>,
        auth: Arc<dyn AuthProvider>,
        settings: AppSettings,
    ) -> Self {
        let limits = &settings.rate_limit;
        Self {
            documents: DocumentService::new(store.clone(), storage.clone(), settings.uploads),
            cache: TtlCache::new(settings.cache_ttl),
            usage: UsageMonitor::shared(),
            login_rate_limiter: create_ip_rate_limiter(
                limits.login_attempts,
                limits.login_window_seconds,
                limits.trusted_proxy_hops,
            ),
            api_rate_limiter: create_ip_rate_limiter(
                limits.api_limit,
                limits.api_window_seconds,
                limits.trusted_proxy_hops,
            ),
            settings: Arc::new(settings),
            store,
            storage,
            auth,
        }
    }

    /// Drop cached listings and stats after a write.
    pub fn invalidate_catalog_cache(&self) {
        let listings = self.cache.invalidate_prefix("documents:");
        let stats = self.cache.remove(handlers::stats::CATALOG_STATS_KEY).is_some();
        tracing::debug!(listings, stats, "Catalog cache invalidated");
    }

    /// Best-effort audit log write.
    pub async fn record_activity(&self, entry: ActivityLog) {
        if let Err(e) = self.store.log_activity(&entry).await {
            tracing::warn!(action = %entry.action, error = %e, "Failed to write activity log");
        }
    }

    /// Periodic cache purge and rate-limiter pruning.
    pub fn spawn_maintenance(&self, every: Duration) {
        spawn_purge_task(self.cache.clone(), every);
        spawn_prune_task(self.login_rate_limiter.clone(), every);
        spawn_prune_task(self.api_rate_limiter.clone(), every);
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/documents", get(handlers::list_documents))
        .route("/api/documents/:id", get(handlers::get_document))
        .route(
            "/api/documents/:id/download",
            post(handlers::download_document),
        )
        .route("/api/auth/logout", post(handlers::logout));

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route_layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let session_routes = Router::new()
        .route("/api/auth/session", get(handlers::session))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/documents", post(handlers::create_document))
        .route(
            "/api/documents/:id",
            put(handlers::update_document).delete(handlers::delete_document),
        )
        .route("/api/admin/documents", get(handlers::admin_list_documents))
        .route(
            "/api/admin/documents/:id",
            get(handlers::admin_get_document),
        )
        .route("/api/upload", post(handlers::upload_file))
        .route("/api/stats", get(handlers::get_stats))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let api_routes = public_routes
        .merge(login_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .route_layer(from_fn_with_state(
            state.api_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(api_routes);

    if let Some(dir) = &state.settings.files_dir {
        app = app.nest_service("/files", ServeDir::new(dir));
    }

    let cors = CorsPolicy::new(state.settings.allowed_origins.clone());
    let body_limit = state.settings.uploads.body_limit();

    app.route_layer(from_fn_with_state(state.usage.clone(), usage_middleware))
        .route_layer(from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn_with_state(cors, cors_middleware))
        .with_state(state)
}

type ServerFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

pub struct Application {
    port: u16,
    server: ServerFuture,
    state: AppState,
}

impl Application {
    pub async fn build(config: LibraryConfig) -> Result<Self, AppError> {
        let backend = BackendClient::new(&config.backend)?;

        let storage: Arc<dyn Storage> = match config.storage.backend {
            StorageBackend::Local => Arc::new(
                LocalStorage::new(&config.storage.local_path, &config.storage.public_base_url)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            "Failed to initialize local storage at {}: {}",
                            config.storage.local_path,
                            e
                        );
                        e
                    })?,
            ),
            StorageBackend::Remote => {
                Arc::new(RemoteStorage::new(backend.clone(), &config.storage.bucket))
            }
        };

        let store: Arc<dyn DocumentStore> = Arc::new(backend.clone());
        let auth: Arc<dyn AuthProvider> = Arc::new(backend);

        let state = AppState::new(store, storage, auth, AppSettings::from(&config));
        state.spawn_maintenance(config.cache.purge_interval);

        let app = build_router(state.clone());

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            storage = ?config.storage.backend,
            environment = ?config.environment,
            "Listening"
        );

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::pin(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
