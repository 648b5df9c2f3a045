// ABOUTME: Server binary - wires config, database, invoker, and pipeline behind the HTTP surface
// ABOUTME: Environment-driven configuration with CLI overrides
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Folio Review Server Binary
//!
//! Starts the review orchestration engine: SQLite-backed config store,
//! failover invoker over HTTPS, pipeline coordinator, and the HTTP surface
//! for the upload flow and the admin console.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;

use folio_review_server::config::ServerConfig;
use folio_review_server::database::Database;
use folio_review_server::llm::{FailoverInvoker, HttpModelTransport};
use folio_review_server::logging;
use folio_review_server::review::{AllowAll, ReviewPipeline};
use folio_review_server::routes::{self, AppState};

#[derive(Parser)]
#[command(name = "folio-review-server")]
#[command(about = "Folio Review - AI manuscript review orchestration engine")]
struct Args {
    /// Override the HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env().map_err(|e| anyhow!("{e}"))?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!("Starting Folio Review Server");
    info!("{}", config.summary());

    let db = Database::connect(&config.database_url)
        .await
        .map_err(|e| anyhow!("{e}"))?;

    // First start gets the default prompt set; admins take it from there
    db.templates()
        .seed_defaults()
        .await
        .map_err(|e| anyhow!("{e}"))?;

    let transport =
        HttpModelTransport::new().map_err(|e| anyhow!("failed to build transport: {e:?}"))?;
    let invoker = FailoverInvoker::new(db.llm_configs(), Arc::new(transport));

    let pipeline = ReviewPipeline::new(
        db.clone(),
        invoker.clone(),
        Arc::new(AllowAll),
        config.llm_timeout,
    );

    let state = Arc::new(AppState {
        db,
        pipeline,
        invoker,
        test_timeout: config.llm_test_timeout,
    });

    let router = routes::router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
