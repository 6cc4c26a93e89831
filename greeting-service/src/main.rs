use greeting_service::{config::GreetingConfig, services::metrics::init_metrics, Application};
use service_core::error::AppError;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = GreetingConfig::load()?;

    let _tracing = init_tracing(
        &config.service_name,
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    )?;

    init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        storage = ?config.storage.backend,
        batch_enabled = config.batch.enabled,
        "Starting greeting service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await
}
