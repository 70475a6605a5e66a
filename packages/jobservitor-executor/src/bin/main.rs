use std::sync::Arc;

use anyhow::{Context, Result};
use jobservitor_executor::{Config, DockerRuntime, JobWorker, Service};
use jobservitor_store::RedisStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jobservitor_executor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load executor configuration")?;
    tracing::info!(worker_id = %config.worker_id, "configuration loaded");

    let store = Arc::new(
        RedisStore::connect(&config.redis_uri)
            .await
            .context("failed to connect to the job store")?,
    );
    let runtime = Arc::new(DockerRuntime::connect().context("failed to connect to the container runtime")?);

    let worker = Box::new(JobWorker::new(store, runtime, config));

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    tracing::info!(service = worker.name(), "starting service");
    worker.run(shutdown).await
}
