use std::sync::Arc;

use anyhow::Context;

use tillpoint_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();
    tillpoint_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = tillpoint_api::app::services::build_services(&config)
        .await
        .context("failed to initialize services")?;

    let app = tillpoint_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
