// ABOUTME: SQLite persistence layer - connection pool, schema, and store accessors
// ABOUTME: Stores for LLM configs, prompt templates, and book/review rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Persistence Layer
//!
//! A thin wrapper over an `SqlitePool` with idempotent schema creation.
//! Each store borrows the pool; rows are mapped by hand with enum string
//! forms from [`crate::models`]. Config rows are read-mostly: admin edits
//! and running stages need no transactional isolation against each other -
//! an invocation simply uses whatever was active at read time.

pub mod llm_configs;
pub mod reviews;
pub mod templates;

pub use llm_configs::{LlmConfigStore, NewLlmConfig, UpdateLlmConfig};
pub use reviews::{NewBook, ReviewStore};
pub use templates::{NewTemplate, TemplateStore, UpdateTemplate};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::errors::{ReviewError, ReviewResult};

/// Schema statements, applied idempotently at startup
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS llm_configs (
        id TEXT PRIMARY KEY,
        task_type TEXT NOT NULL,
        role TEXT NOT NULL,
        public_name TEXT NOT NULL,
        endpoint_url TEXT NOT NULL,
        model_code TEXT NOT NULL,
        credential TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    // exactly one active config per (task_type, role)
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_llm_configs_active
        ON llm_configs (task_type, role) WHERE active = 1",
    "CREATE TABLE IF NOT EXISTS prompt_templates (
        id TEXT PRIMARY KEY,
        task_type TEXT NOT NULL,
        book_type TEXT,
        name TEXT NOT NULL,
        template_text TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 1,
        active INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )",
    // at most one active template per (task_type, book_type)
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_prompt_templates_active
        ON prompt_templates (task_type, coalesce(book_type, '')) WHERE active = 1",
    "CREATE TABLE IF NOT EXISTS books (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        status TEXT NOT NULL,
        book_type TEXT,
        language TEXT,
        topic TEXT,
        manuscript_text TEXT NOT NULL,
        word_count INTEGER NOT NULL DEFAULT 0,
        extracted_metadata TEXT,
        submitted_for_ai_review_at TEXT,
        ai_review_completed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS ai_reviews (
        id TEXT PRIMARY KEY,
        book_id TEXT NOT NULL UNIQUE REFERENCES books(id) ON DELETE CASCADE,
        processing_status TEXT NOT NULL,
        current_stage TEXT,
        failed_stage TEXT,
        served_by_role TEXT,
        model_used TEXT,
        scores TEXT,
        summaries TEXT,
        service_needs TEXT,
        plagiarism TEXT,
        suspect_score INTEGER NOT NULL DEFAULT 0,
        author_response TEXT,
        error_message TEXT,
        metadata_completed_at TEXT,
        initial_review_completed_at TEXT,
        detailed_review_completed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
];

/// Database handle shared across the engine
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the given SQLite URL and apply the schema
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema creation fails.
    pub async fn connect(url: &str) -> ReviewResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to connect to {url}: {e}")))?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Open an isolated in-memory database (tests and local experiments)
    ///
    /// A single connection keeps every query on the same in-memory instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema creation fails.
    pub async fn in_memory() -> ReviewResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| ReviewError::database(format!("Failed to open in-memory db: {e}")))?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Apply schema statements; safe to run on every startup
    async fn init_schema(&self) -> ReviewResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| ReviewError::database(format!("Schema creation failed: {e}")))?;
        }
        Ok(())
    }

    /// Store for LLM endpoint configs
    #[must_use]
    pub fn llm_configs(&self) -> LlmConfigStore {
        LlmConfigStore::new(self.pool.clone())
    }

    /// Store for prompt templates
    #[must_use]
    pub fn templates(&self) -> TemplateStore {
        TemplateStore::new(self.pool.clone())
    }

    /// Store for books and AI reviews
    #[must_use]
    pub fn reviews(&self) -> ReviewStore {
        ReviewStore::new(self.pool.clone())
    }
}
