// ABOUTME: Review operation endpoints - submit, run stage, status, retry, author response
// ABOUTME: Thin wrappers over the pipeline coordinator; it owns all state transitions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::errors::ReviewError;
use crate::models::{AiReview, ReviewStage};

/// Request to record the author's public response
#[derive(Debug, Deserialize)]
pub struct AuthorResponseRequest {
    /// Response text
    pub response: String,
}

/// Review operation routes
pub struct ReviewRoutes;

impl ReviewRoutes {
    /// Create the review routes
    pub fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/books/:id/review/submit", post(Self::submit))
            .route("/api/books/:id/review/stages/:stage", post(Self::run_stage))
            .route("/api/books/:id/review", get(Self::get_status))
            .route("/api/books/:id/review/retry", post(Self::retry))
            .route("/api/books/:id/review/response", post(Self::author_response))
            .with_state(state)
    }

    /// Submit a Draft book for review
    async fn submit(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<AiReview>, ReviewError> {
        let review = state.pipeline.submit(id).await?;
        Ok(Json(review))
    }

    /// Run one pipeline stage
    async fn run_stage(
        State(state): State<Arc<AppState>>,
        Path((id, stage)): Path<(Uuid, String)>,
    ) -> Result<Json<AiReview>, ReviewError> {
        let stage = ReviewStage::parse_str(&stage).ok_or_else(|| {
            ReviewError::invalid_input(format!(
                "unknown stage '{stage}'; use metadata, initial_review, or detailed_review"
            ))
        })?;

        let review = state.pipeline.run_stage(id, stage).await?;
        Ok(Json(review))
    }

    /// Current review record for a book
    async fn get_status(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<AiReview>, ReviewError> {
        let review = state.pipeline.get_status(id).await?;
        Ok(Json(review))
    }

    /// Retry a failed review at its failed stage
    async fn retry(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<AiReview>, ReviewError> {
        let review = state.pipeline.retry(id).await?;
        Ok(Json(review))
    }

    /// Record the author's public response
    async fn author_response(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
        Json(request): Json<AuthorResponseRequest>,
    ) -> Result<Json<AiReview>, ReviewError> {
        if request.response.trim().is_empty() {
            return Err(ReviewError::invalid_input("response text is required"));
        }
        let review = state.pipeline.add_author_response(id, &request.response).await?;
        Ok(Json(review))
    }
}
