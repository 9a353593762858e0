use library_core::config::{self as core_config, get_env, get_env_parsed};
use library_core::error::AppError;
use secrecy::Secret;
use std::time::Duration;

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub uploads: UploadLimits,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Managed backend platform: REST row API, object storage, and auth provider.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    /// Public key sent as `apikey` to the auth provider.
    pub anon_key: Secret<String>,
    /// Privileged key for row and storage access from the server.
    pub service_key: Secret<String>,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_concurrent_requests: usize,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub local_path: String,
    /// Base URL used to build public links to locally stored files.
    pub public_base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub api_limit: u32,
    pub api_window_seconds: u64,
    /// Reverse proxies in front of the service that append to `X-Forwarded-For`.
    pub trusted_proxy_hops: usize,
}

/// Upload ceilings in bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_document_bytes: usize,
    /// Cover ceiling on the document-create route.
    pub max_cover_bytes: usize,
    /// Cover ceiling on the standalone upload route.
    pub max_upload_cover_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: 50 * MB,
            max_cover_bytes: 5 * MB,
            max_upload_cover_bytes: 10 * MB,
        }
    }
}

impl UploadLimits {
    /// Request body limit: a document, a cover, and room for multipart framing and fields.
    pub fn body_limit(&self) -> usize {
        self.max_document_bytes + self.max_upload_cover_bytes.max(self.max_cover_bytes) + MB
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub purge_interval: Duration,
}

impl LibraryConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let environment: Environment = get_env("ENVIRONMENT", Some("dev"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let storage_backend: StorageBackend = get_env("STORAGE_BACKEND", Some("remote"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let config = LibraryConfig {
            common,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("library-api"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: std::env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            backend: BackendConfig {
                url: get_env("BACKEND_URL", Some("http://localhost:54321"), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
                anon_key: Secret::new(get_env("BACKEND_ANON_KEY", None, is_prod)?),
                service_key: Secret::new(get_env("BACKEND_SERVICE_KEY", None, is_prod)?),
                max_retries: get_env_parsed("BACKEND_MAX_RETRIES", "3", false)?,
                initial_backoff: Duration::from_millis(get_env_parsed(
                    "BACKEND_INITIAL_BACKOFF_MS",
                    "200",
                    false,
                )?),
                max_concurrent_requests: get_env_parsed("BACKEND_MAX_CONCURRENT", "16", false)?,
                request_timeout: Duration::from_secs(get_env_parsed(
                    "BACKEND_TIMEOUT_SECONDS",
                    "60",
                    false,
                )?),
            },
            storage: StorageConfig {
                backend: storage_backend,
                bucket: get_env("STORAGE_BUCKET", Some("documents"), false)?,
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), false)?,
                public_base_url: get_env(
                    "PUBLIC_BASE_URL",
                    Some("http://localhost:8080"),
                    false,
                )?
                .trim_end_matches('/')
                .to_string(),
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                secure_cookies: get_env_parsed(
                    "SECURE_COOKIES",
                    if is_prod { "true" } else { "false" },
                    false,
                )?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env_parsed("RATE_LIMIT_LOGIN_ATTEMPTS", "5", false)?,
                login_window_seconds: get_env_parsed(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    "900",
                    false,
                )?,
                api_limit: get_env_parsed("RATE_LIMIT_API_LIMIT", "100", false)?,
                api_window_seconds: get_env_parsed("RATE_LIMIT_API_WINDOW_SECONDS", "60", false)?,
                trusted_proxy_hops: get_env_parsed("RATE_LIMIT_TRUSTED_PROXY_HOPS", "1", false)?,
            },
            uploads: UploadLimits {
                max_document_bytes: get_env_parsed::<usize>("UPLOAD_MAX_DOCUMENT_MB", "50", false)?
                    * MB,
                max_cover_bytes: get_env_parsed::<usize>("UPLOAD_MAX_COVER_MB", "5", false)? * MB,
                max_upload_cover_bytes: get_env_parsed::<usize>(
                    "UPLOAD_MAX_STANDALONE_COVER_MB",
                    "10",
                    false,
                )? * MB,
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(get_env_parsed("CACHE_TTL_SECONDS", "60", false)?),
                purge_interval: Duration::from_secs(get_env_parsed(
                    "CACHE_PURGE_INTERVAL_SECONDS",
                    "300",
                    false,
                )?),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.rate_limit.login_attempts == 0 || self.rate_limit.api_limit == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Rate limits must be greater than 0"
            )));
        }

        if self.uploads.max_document_bytes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPLOAD_MAX_DOCUMENT_MB must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.storage.backend == StorageBackend::Local {
                tracing::warn!("Local file storage in production - files are not replicated");
            }
        }

        Ok(())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "remote" => Ok(StorageBackend::Remote),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}
