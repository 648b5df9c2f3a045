// ABOUTME: CRUD store for admin-configured LLM endpoints (primary/backup per task type)
// ABOUTME: Activation enforces exactly one active config per (task_type, role) pair
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{ReviewError, ReviewResult};
use crate::models::{LlmConfig, LlmRole, TaskType};

/// Request to create an LLM endpoint config
#[derive(Debug, Clone, Deserialize)]
pub struct NewLlmConfig {
    /// Task this endpoint serves
    pub task_type: TaskType,
    /// Primary or backup slot
    pub role: LlmRole,
    /// Human-readable name
    pub public_name: String,
    /// Provider API base URL
    pub endpoint_url: String,
    /// Provider model identifier
    pub model_code: String,
    /// API key
    pub credential: String,
    /// Activate immediately, replacing the current active config for the pair
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Request to update an existing LLM endpoint config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLlmConfig {
    /// New display name (optional)
    pub public_name: Option<String>,
    /// New API base URL (optional)
    pub endpoint_url: Option<String>,
    /// New model identifier (optional)
    pub model_code: Option<String>,
    /// New API key (optional; omitted keeps the stored key)
    pub credential: Option<String>,
}

/// LLM endpoint config store
#[derive(Clone)]
pub struct LlmConfigStore {
    pool: SqlitePool,
}

impl LlmConfigStore {
    /// Create a new store over the shared pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a config; when `active` is requested, the previously active
    /// config for the same (task, role) pair is deactivated in the same
    /// transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(&self, request: NewLlmConfig) -> ReviewResult<LlmConfig> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to begin transaction: {e}")))?;

        if request.active {
            sqlx::query("UPDATE llm_configs SET active = 0 WHERE task_type = $1 AND role = $2")
                .bind(request.task_type.as_str())
                .bind(request.role.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    ReviewError::database(format!("Failed to deactivate previous config: {e}"))
                })?;
        }

        sqlx::query(
            r"
            INSERT INTO llm_configs (
                id, task_type, role, public_name, endpoint_url, model_code,
                credential, active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ",
        )
        .bind(id.to_string())
        .bind(request.task_type.as_str())
        .bind(request.role.as_str())
        .bind(&request.public_name)
        .bind(&request.endpoint_url)
        .bind(&request.model_code)
        .bind(&request.credential)
        .bind(i32::from(request.active))
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to create llm config: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to commit: {e}")))?;

        self.get(id).await
    }

    /// List all configs, active and inactive
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list(&self) -> ReviewResult<Vec<LlmConfig>> {
        let rows = sqlx::query(
            "SELECT * FROM llm_configs ORDER BY task_type ASC, role ASC, created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to list llm configs: {e}")))?;

        rows.iter().map(row_to_config).collect()
    }

    /// Get a config by id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id does not exist.
    pub async fn get(&self, id: Uuid) -> ReviewResult<LlmConfig> {
        let row = sqlx::query("SELECT * FROM llm_configs WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to fetch llm config: {e}")))?
            .ok_or_else(|| ReviewError::not_found(format!("llm config {id}")))?;

        row_to_config(&row)
    }

    /// Update endpoint fields; omitted fields keep their stored values
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id does not exist.
    pub async fn update(&self, id: Uuid, request: UpdateLlmConfig) -> ReviewResult<LlmConfig> {
        let current = self.get(id).await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r"
            UPDATE llm_configs
            SET public_name = $1, endpoint_url = $2, model_code = $3,
                credential = $4, updated_at = $5
            WHERE id = $6
            ",
        )
        .bind(request.public_name.unwrap_or(current.public_name))
        .bind(request.endpoint_url.unwrap_or(current.endpoint_url))
        .bind(request.model_code.unwrap_or(current.model_code))
        .bind(request.credential.unwrap_or(current.credential))
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to update llm config: {e}")))?;

        self.get(id).await
    }

    /// Make a config the active one for its (task, role) pair
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id does not exist.
    pub async fn set_active(&self, id: Uuid) -> ReviewResult<LlmConfig> {
        let config = self.get(id).await?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("UPDATE llm_configs SET active = 0 WHERE task_type = $1 AND role = $2")
            .bind(config.task_type.as_str())
            .bind(config.role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                ReviewError::database(format!("Failed to deactivate previous config: {e}"))
            })?;

        sqlx::query("UPDATE llm_configs SET active = 1, updated_at = $1 WHERE id = $2")
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to activate config: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to commit: {e}")))?;

        self.get(id).await
    }

    /// Delete a config
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete(&self, id: Uuid) -> ReviewResult<bool> {
        let result = sqlx::query("DELETE FROM llm_configs WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to delete llm config: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the active config for a task type and role
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no active config exists; the stage cannot
    /// proceed until an admin configures one.
    pub async fn get_active(&self, task_type: TaskType, role: LlmRole) -> ReviewResult<LlmConfig> {
        let row = sqlx::query(
            "SELECT * FROM llm_configs WHERE task_type = $1 AND role = $2 AND active = 1",
        )
        .bind(task_type.as_str())
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to fetch active config: {e}")))?
        .ok_or_else(|| {
            ReviewError::configuration(format!("no active {role} llm config for '{task_type}'"))
        })?;

        row_to_config(&row)
    }
}

/// Map a database row to an [`LlmConfig`]
fn row_to_config(row: &SqliteRow) -> ReviewResult<LlmConfig> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| ReviewError::database(format!("Failed to get id: {e}")))?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| ReviewError::database(format!("Invalid UUID: {e}")))?;

    let task_type_str: String = row
        .try_get("task_type")
        .map_err(|e| ReviewError::database(format!("Failed to get task_type: {e}")))?;
    let task_type = TaskType::parse_str(&task_type_str)
        .ok_or_else(|| ReviewError::database(format!("Invalid task type: {task_type_str}")))?;

    let role_str: String = row
        .try_get("role")
        .map_err(|e| ReviewError::database(format!("Failed to get role: {e}")))?;
    let role = LlmRole::parse_str(&role_str)
        .ok_or_else(|| ReviewError::database(format!("Invalid role: {role_str}")))?;

    let active: i64 = row
        .try_get("active")
        .map_err(|e| ReviewError::database(format!("Failed to get active: {e}")))?;

    Ok(LlmConfig {
        id,
        task_type,
        role,
        public_name: text_column(row, "public_name")?,
        endpoint_url: text_column(row, "endpoint_url")?,
        model_code: text_column(row, "model_code")?,
        credential: text_column(row, "credential")?,
        active: active != 0,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Fetch a required text column
pub(crate) fn text_column(row: &SqliteRow, name: &str) -> ReviewResult<String> {
    row.try_get(name)
        .map_err(|e| ReviewError::database(format!("Failed to get {name}: {e}")))
}

/// Fetch a required RFC 3339 timestamp column
pub(crate) fn datetime_column(row: &SqliteRow, name: &str) -> ReviewResult<DateTime<Utc>> {
    let raw: String = row
        .try_get(name)
        .map_err(|e| ReviewError::database(format!("Failed to get {name}: {e}")))?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ReviewError::database(format!("Invalid timestamp in {name}: {e}")))
}

/// Fetch an optional RFC 3339 timestamp column
pub(crate) fn optional_datetime_column(
    row: &SqliteRow,
    name: &str,
) -> ReviewResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row
        .try_get(name)
        .map_err(|e| ReviewError::database(format!("Failed to get {name}: {e}")))?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ReviewError::database(format!("Invalid timestamp in {name}: {e}")))
    })
    .transpose()
}
