// ABOUTME: HTTP surface - router assembly and shared application state
// ABOUTME: Review operations for the upload flow plus the admin configuration console
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # HTTP Routes
//!
//! - [`books`] - minimal book intake for the (external) upload flow
//! - [`reviews`] - submit / run stage / status / retry / author response
//! - [`admin`] - LLM config and template management, Test Connection
//! - [`health`] - liveness probe

pub mod admin;
pub mod books;
pub mod health;
pub mod reviews;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::database::Database;
use crate::llm::FailoverInvoker;
use crate::review::ReviewPipeline;

/// Shared state for all route handlers
pub struct AppState {
    /// Persistence layer
    pub db: Database,
    /// Pipeline coordinator
    pub pipeline: ReviewPipeline,
    /// Invoker for the admin Test Connection action
    pub invoker: FailoverInvoker,
    /// Timeout for Test Connection calls
    pub test_timeout: Duration,
}

/// Assemble the full router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(books::BookRoutes::routes(state.clone()))
        .merge(reviews::ReviewRoutes::routes(state.clone()))
        .merge(admin::AdminRoutes::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
