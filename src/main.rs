use anyhow::{Context, Result, bail};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod gateway;
mod handlers;
mod models;
mod routes;
mod services;

use gateway::{InMemoryGateway, ObjectStoreGateway, S3Gateway, S3GatewayConfig};
use services::filesystem::VirtualFilesystem;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting bucket-browser with config: {:?}", cfg);

    // --- Build the storage gateway ---
    let gateway: Arc<dyn ObjectStoreGateway> = match cfg.backend.as_str() {
        "memory" => Arc::new(InMemoryGateway::new()),
        "s3" => Arc::new(S3Gateway::new(S3GatewayConfig {
            bucket: cfg.bucket.clone(),
            region: Some(cfg.region.clone()),
            endpoint: cfg.endpoint.clone(),
            access_key_id: cfg.access_key_id.clone(),
            secret_access_key: cfg.secret_access_key.clone(),
            allow_http: cfg.allow_http,
        })?),
        other => bail!("unknown backend `{}` (expected `s3` or `memory`)", other),
    };

    // --- Initialize core service (probes the bucket) ---
    let fs = VirtualFilesystem::connect(gateway, &cfg.root_prefix)
        .await
        .context("bucket connectivity check failed")?;
    tracing::info!(
        "Connected; serving bucket `{}` under prefix `{}/`",
        cfg.bucket,
        cfg.root_prefix.trim_matches('/')
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(fs);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
