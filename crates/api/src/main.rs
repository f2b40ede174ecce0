use anyhow::Context;

use kidsbook_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    kidsbook_observability::init(config.log_format);
    config.log_warnings();

    let app = kidsbook_api::app::build_app(&config)
        .await
        .context("failed to build app")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.router).await?;
    Ok(())
}
