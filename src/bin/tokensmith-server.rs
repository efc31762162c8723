// ABOUTME: Server binary wiring configuration, logging, and routes into a running issuer
// ABOUTME: Loads issuer options from YAML and serves the issuance and key endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Tokensmith server entry point.
//!
//! Bootstrap stays thin: parse flags, load the issuer configuration, build
//! the registry and issuance state, and mount the routers. Everything else
//! lives in the library.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tokensmith::config::Options;
use tokensmith::keys::Registry;
use tokensmith::logging::{init_logging, LoggingConfig};
use tokensmith::noncer::UrlSafeNoncer;
use tokensmith::routes::{HealthRoutes, IssueRoutes, IssueState, KeyRoutes};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Default timeout for remote claims calls; the claim pipeline itself never
/// bounds latency, so the outbound client must
const REMOTE_CLAIMS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "tokensmith-server", about = "JWT credential issuance service")]
struct Args {
    /// Path to the issuer configuration file (YAML)
    #[arg(long, short)]
    config: std::path::PathBuf,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&LoggingConfig::from_env())?;

    let file = File::open(&args.config)
        .with_context(|| format!("failed to open config file {}", args.config.display()))?;
    let options: Options = serde_yaml::from_reader(file)
        .with_context(|| format!("failed to parse config file {}", args.config.display()))?;

    let registry = Arc::new(Registry::new());
    let client = reqwest::Client::builder()
        .timeout(REMOTE_CLAIMS_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let state = IssueState::new(
        &options,
        &registry,
        Arc::new(UrlSafeNoncer::default()),
        client,
    )
    .map_err(|e| anyhow::anyhow!("issuer configuration rejected: {e}"))?;

    let app = axum::Router::new()
        .merge(IssueRoutes::routes(Arc::new(state)))
        .merge(KeyRoutes::routes(Arc::clone(&registry)))
        .merge(HealthRoutes::routes())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&args.address)
        .await
        .with_context(|| format!("failed to bind {}", args.address))?;

    info!(address = %args.address, "tokensmith server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
