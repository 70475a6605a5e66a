use std::sync::Arc;

use anyhow::{Context, Result};
use jobservitor_api::{build_app, AppState, Config};
use jobservitor_store::RedisStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jobservitor_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load API configuration")?;
    tracing::info!("configuration loaded");

    let store = Arc::new(
        RedisStore::connect(&config.redis_uri)
            .await
            .context("failed to connect to the job store")?,
    );

    let app = build_app(AppState::new(store, config.record_ttl_seconds));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "starting scheduler API");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
