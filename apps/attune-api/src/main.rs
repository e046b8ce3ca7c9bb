use anyhow::{Context, Result};
use attune_api::build_router;
use attune_api::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    let filter =
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.uses_placeholder_admin_key() {
        tracing::warn!(
            target: "attune.api",
            "running with the placeholder admin key; set AT_ADMIN_KEY before exposing this service",
        );
    }

    let bind_addr = config.bind_addr;
    let app = build_router(config);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(target: "attune.api", addr = %bind_addr, "attune api listening");

    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}
