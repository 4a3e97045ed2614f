use anyhow::Context;

use careportal_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    careportal_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let app = careportal_api::app::build_app_from_config(&config)
        .await
        .context("failed to wire services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
