// ABOUTME: Admin console endpoints - LLM endpoint configs, prompt templates, Test Connection
// ABOUTME: Credentials are write-only; list and get responses carry a masked key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::database::{NewLlmConfig, NewTemplate, UpdateLlmConfig, UpdateTemplate};
use crate::errors::ReviewError;
use crate::llm::ConnectionReport;
use crate::models::{LlmConfig, LlmRole, PromptTemplate, TaskType};

/// LLM config as exposed to the admin console; the credential is masked
#[derive(Debug, Serialize)]
pub struct LlmConfigResponse {
    /// Unique ID
    pub id: Uuid,
    /// Task this endpoint serves
    pub task_type: TaskType,
    /// Primary or backup slot
    pub role: LlmRole,
    /// Display name
    pub public_name: String,
    /// Provider API base URL
    pub endpoint_url: String,
    /// Provider model identifier
    pub model_code: String,
    /// Masked API key (first 8 characters, then `*`)
    pub credential: String,
    /// Whether this is the active config for its pair
    pub active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<LlmConfig> for LlmConfigResponse {
    fn from(config: LlmConfig) -> Self {
        let credential = config.masked_credential();
        Self {
            id: config.id,
            task_type: config.task_type,
            role: config.role,
            public_name: config.public_name,
            endpoint_url: config.endpoint_url,
            model_code: config.model_code,
            credential,
            active: config.active,
            created_at: config.created_at,
            updated_at: config.updated_at,
        }
    }
}

/// Request for the admin Test Connection action
#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    /// Task type to test
    pub task_type: TaskType,
    /// Role to test
    pub role: LlmRole,
}

/// Admin console routes
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create the admin routes
    pub fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/admin/llm-configs", get(Self::list_configs))
            .route("/api/admin/llm-configs", post(Self::create_config))
            .route("/api/admin/llm-configs/:id", put(Self::update_config))
            .route("/api/admin/llm-configs/:id", delete(Self::delete_config))
            .route(
                "/api/admin/llm-configs/:id/activate",
                post(Self::activate_config),
            )
            .route("/api/admin/llm-configs/test", post(Self::test_connection))
            .route("/api/admin/templates", get(Self::list_templates))
            .route("/api/admin/templates", post(Self::create_template))
            .route("/api/admin/templates/:id", put(Self::update_template))
            .route("/api/admin/templates/:id", delete(Self::delete_template))
            .route(
                "/api/admin/templates/:id/activate",
                post(Self::activate_template),
            )
            .with_state(state)
    }

    // ========================================================================
    // LLM Configs
    // ========================================================================

    /// List all configs with masked credentials
    async fn list_configs(
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<Vec<LlmConfigResponse>>, ReviewError> {
        let configs = state.db.llm_configs().list().await?;
        Ok(Json(configs.into_iter().map(Into::into).collect()))
    }

    /// Create a config; activation replaces the current active one
    async fn create_config(
        State(state): State<Arc<AppState>>,
        Json(request): Json<NewLlmConfig>,
    ) -> Result<Json<LlmConfigResponse>, ReviewError> {
        if request.credential.trim().is_empty() {
            return Err(ReviewError::invalid_input("API key cannot be empty"));
        }
        if request.endpoint_url.trim().is_empty() {
            return Err(ReviewError::invalid_input("endpoint URL cannot be empty"));
        }

        let config = state.db.llm_configs().create(request).await?;
        Ok(Json(config.into()))
    }

    /// Update endpoint fields; an omitted credential keeps the stored key
    async fn update_config(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
        Json(request): Json<UpdateLlmConfig>,
    ) -> Result<Json<LlmConfigResponse>, ReviewError> {
        let config = state.db.llm_configs().update(id, request).await?;
        Ok(Json(config.into()))
    }

    /// Delete a config
    async fn delete_config(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<impl IntoResponse, ReviewError> {
        let deleted = state.db.llm_configs().delete(id).await?;
        if deleted {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(ReviewError::not_found(format!("llm config {id}")))
        }
    }

    /// Make a config the active one for its (task, role) pair
    async fn activate_config(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<LlmConfigResponse>, ReviewError> {
        let config = state.db.llm_configs().set_active(id).await?;
        Ok(Json(config.into()))
    }

    /// Test Connection: one canned call against one configured role,
    /// reporting which role served, latency, and success or failure
    async fn test_connection(
        State(state): State<Arc<AppState>>,
        Json(request): Json<TestConnectionRequest>,
    ) -> Result<Json<ConnectionReport>, ReviewError> {
        let report = state
            .invoker
            .test_connection(request.task_type, request.role, state.test_timeout)
            .await?;
        Ok(Json(report))
    }

    // ========================================================================
    // Prompt Templates
    // ========================================================================

    /// List all templates
    async fn list_templates(
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<Vec<PromptTemplate>>, ReviewError> {
        let templates = state.db.templates().list().await?;
        Ok(Json(templates))
    }

    /// Create a template; activation replaces the current active one
    async fn create_template(
        State(state): State<Arc<AppState>>,
        Json(request): Json<NewTemplate>,
    ) -> Result<Json<PromptTemplate>, ReviewError> {
        if request.text.trim().is_empty() {
            return Err(ReviewError::invalid_input("template text cannot be empty"));
        }
        let template = state.db.templates().create(request).await?;
        Ok(Json(template))
    }

    /// Edit a template with optimistic versioning
    async fn update_template(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
        Json(request): Json<UpdateTemplate>,
    ) -> Result<Json<PromptTemplate>, ReviewError> {
        let template = state.db.templates().update(id, request).await?;
        Ok(Json(template))
    }

    /// Delete a template
    async fn delete_template(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<impl IntoResponse, ReviewError> {
        let deleted = state.db.templates().delete(id).await?;
        if deleted {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(ReviewError::not_found(format!("prompt template {id}")))
        }
    }

    /// Make a template the active one for its (task, book type) pair
    async fn activate_template(
        State(state): State<Arc<AppState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<PromptTemplate>, ReviewError> {
        let template = state.db.templates().set_active(id).await?;
        Ok(Json(template))
    }
}
