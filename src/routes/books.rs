// ABOUTME: Minimal book intake endpoints for the external upload flow
// ABOUTME: Thin persistence wrappers; upload handling and text extraction live elsewhere
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use super::AppState;
use crate::database::NewBook;
use crate::errors::ReviewError;
use crate::models::Book;

/// Book intake routes
pub struct BookRoutes;

impl BookRoutes {
    /// Create the book routes
    pub fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/books", post(Self::create_book))
            .route("/api/books/:id", get(Self::get_book))
            .with_state(state)
    }

    /// Register a book with its extracted manuscript text
    async fn create_book(
        State(state): State<Arc<AppState>>,
        Json(request): Json<NewBook>,
    ) -> Result<Json<Book>, ReviewError> {
        if request.title.trim().is_empty() {
            return Err(ReviewError::invalid_input("book title is required"));
        }
        if request.manuscript_text.trim().is_empty() {
            return Err(ReviewError::invalid_input("manuscript text is required"));
        }

        let book = state.db.reviews().create_book(request).await?;
        Ok(Json(book))
    }

    /// Fetch a book
    async fn get_book(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<Book>, ReviewError> {
        let book = state.db.reviews().get_book(id).await?;
        Ok(Json(book))
    }
}
