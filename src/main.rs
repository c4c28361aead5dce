mod cache;
mod config;
mod db;
mod http;
mod hub;
mod mqtt;
mod persist;
mod reading;
mod ws;

use crate::cache::ReadingCache;
use crate::config::Config;
use crate::hub::FanOutHub;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,greenhouse_bridge=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    let pool = db::build_pool(&config.database_url, config.db_pool_size).await?;
    // Nothing works without somewhere to persist readings.
    db::ensure_schema(&pool)
        .await
        .context("schema bootstrap failed")?;

    let cache = ReadingCache::new();
    let (command_tx, command_rx) = mpsc::channel::<String>(32);
    let hub = FanOutHub::new(command_tx, config.viewer_queue_depth);

    let mqtt_config = config.clone();
    let mqtt_cache = cache.clone();
    let mqtt_hub = hub.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(err) = mqtt::run_client(mqtt_config, mqtt_cache, mqtt_hub, command_rx).await {
            tracing::error!(error = %err, "mqtt client exited");
        }
    });

    let sampler_pool = pool.clone();
    let sampler_cache = cache.clone();
    let sampler_period = config.persist_interval();
    let sampler_handle = tokio::spawn(async move {
        persist::run_sampler(sampler_pool, sampler_cache, sampler_period).await;
    });

    let state = http::AppState {
        config: Arc::new(config.clone()),
        db: pool,
        hub,
        http: reqwest::Client::new(),
    };
    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(&config.http_bind).await?;
    tracing::info!(bind = %config.http_bind, "greenhouse-bridge HTTP listening");
    let http_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        _ = mqtt_handle => {}
        _ = http_handle => {}
    }

    sampler_handle.abort();
    Ok(())
}
