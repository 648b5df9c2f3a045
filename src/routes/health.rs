// ABOUTME: Liveness probe endpoint
// ABOUTME: Reports service name and version
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

/// Health probe routes
pub fn routes() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
