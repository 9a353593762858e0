use library_api::config::LibraryConfig;
use library_api::services::init_metrics;
use library_api::startup::Application;
use library_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Recorder must be installed before any metric is emitted.
    init_metrics();

    let config = match LibraryConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("library-api", "info", None);
            tracing::error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::other(format!("Configuration error: {}", e)));
        }
    };

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await
}
