// ABOUTME: Versioned CRUD store for prompt templates with optimistic concurrency
// ABOUTME: Seeds default templates on first start; one active template per (task, book type)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use chrono::Utc;
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::llm_configs::{datetime_column, text_column};
use crate::errors::{ReviewError, ReviewResult};
use crate::models::{BookType, PromptTemplate, TaskType};

/// Request to create a prompt template
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    /// Task this template is used for
    pub task_type: TaskType,
    /// Book type selector; required for initial-review templates
    pub book_type: Option<BookType>,
    /// Display name
    pub name: String,
    /// Template text with `{variable}` placeholders
    pub text: String,
    /// Activate immediately, replacing the current active template
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Request to edit a template; `expected_version` guards against lost updates
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplate {
    /// New display name (optional)
    pub name: Option<String>,
    /// New template text (optional)
    pub text: Option<String>,
    /// Version the caller last read; mismatch fails with `VersionConflict`
    pub expected_version: i64,
}

/// Prompt template store
pub struct TemplateStore {
    pool: SqlitePool,
}

impl TemplateStore {
    /// Create a new store over the shared pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a template at version 1
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when an initial-review template is created
    /// without a book type, or a database error.
    pub async fn create(&self, request: NewTemplate) -> ReviewResult<PromptTemplate> {
        if request.task_type == TaskType::InitialReview && request.book_type.is_none() {
            return Err(ReviewError::invalid_input(
                "initial_review templates require a book type",
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to begin transaction: {e}")))?;

        if request.active {
            deactivate_pair(&mut tx, request.task_type, request.book_type).await?;
        }

        sqlx::query(
            r"
            INSERT INTO prompt_templates (
                id, task_type, book_type, name, template_text, version, active, updated_at
            ) VALUES ($1, $2, $3, $4, $5, 1, $6, $7)
            ",
        )
        .bind(id.to_string())
        .bind(request.task_type.as_str())
        .bind(request.book_type.map(BookType::as_str))
        .bind(&request.name)
        .bind(&request.text)
        .bind(i32::from(request.active))
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to create template: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to commit: {e}")))?;

        self.get(id).await
    }

    /// List all templates, active and inactive
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list(&self) -> ReviewResult<Vec<PromptTemplate>> {
        let rows = sqlx::query(
            "SELECT * FROM prompt_templates ORDER BY task_type ASC, book_type ASC, version DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to list templates: {e}")))?;

        rows.iter().map(row_to_template).collect()
    }

    /// Get a template by id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id does not exist.
    pub async fn get(&self, id: Uuid) -> ReviewResult<PromptTemplate> {
        let row = sqlx::query("SELECT * FROM prompt_templates WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to fetch template: {e}")))?
            .ok_or_else(|| ReviewError::not_found(format!("prompt template {id}")))?;

        row_to_template(&row)
    }

    /// Edit a template; the version increments by one on success
    ///
    /// # Errors
    ///
    /// Returns `VersionConflict` when `expected_version` does not match the
    /// stored version; the row is left unchanged.
    pub async fn update(&self, id: Uuid, request: UpdateTemplate) -> ReviewResult<PromptTemplate> {
        let current = self.get(id).await?;
        if current.version != request.expected_version {
            return Err(ReviewError::VersionConflict {
                expected: request.expected_version,
                actual: current.version,
            });
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r"
            UPDATE prompt_templates
            SET name = $1, template_text = $2, version = version + 1, updated_at = $3
            WHERE id = $4 AND version = $5
            ",
        )
        .bind(request.name.unwrap_or(current.name))
        .bind(request.text.unwrap_or(current.text))
        .bind(&now)
        .bind(id.to_string())
        .bind(request.expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to update template: {e}")))?;

        // A concurrent edit between the read and the guarded update loses here
        if result.rows_affected() == 0 {
            let latest = self.get(id).await?;
            return Err(ReviewError::VersionConflict {
                expected: request.expected_version,
                actual: latest.version,
            });
        }

        self.get(id).await
    }

    /// Make a template the active one for its (task, book type) pair
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id does not exist.
    pub async fn set_active(&self, id: Uuid) -> ReviewResult<PromptTemplate> {
        let template = self.get(id).await?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to begin transaction: {e}")))?;

        deactivate_pair(&mut tx, template.task_type, template.book_type).await?;

        sqlx::query("UPDATE prompt_templates SET active = 1, updated_at = $1 WHERE id = $2")
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to activate template: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| ReviewError::database(format!("Failed to commit: {e}")))?;

        self.get(id).await
    }

    /// Delete a template
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete(&self, id: Uuid) -> ReviewResult<bool> {
        let result = sqlx::query("DELETE FROM prompt_templates WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to delete template: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the active template for a task, selecting by book type
    ///
    /// Initial-review lookups require a book type. Detailed-review lookups
    /// prefer a type-specific template and fall back to the generic one.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no active template matches; the stage
    /// cannot proceed until an admin configures one.
    pub async fn get_active(
        &self,
        task_type: TaskType,
        book_type: Option<BookType>,
    ) -> ReviewResult<PromptTemplate> {
        match task_type {
            TaskType::MetadataExtraction => self.fetch_active(task_type, None).await,
            TaskType::InitialReview => {
                let book_type = book_type.ok_or_else(|| {
                    ReviewError::configuration(
                        "initial_review template lookup requires a book type",
                    )
                })?;
                self.fetch_active(task_type, Some(book_type)).await
            }
            TaskType::DetailedReview => {
                if let Some(bt) = book_type {
                    if let Ok(template) = self.fetch_active(task_type, Some(bt)).await {
                        return Ok(template);
                    }
                }
                self.fetch_active(task_type, None).await
            }
        }
    }

    async fn fetch_active(
        &self,
        task_type: TaskType,
        book_type: Option<BookType>,
    ) -> ReviewResult<PromptTemplate> {
        let query = if book_type.is_some() {
            "SELECT * FROM prompt_templates
             WHERE task_type = $1 AND book_type = $2 AND active = 1"
        } else {
            "SELECT * FROM prompt_templates
             WHERE task_type = $1 AND book_type IS NULL AND active = 1"
        };

        let mut q = sqlx::query(query).bind(task_type.as_str());
        if let Some(bt) = book_type {
            q = q.bind(bt.as_str());
        }

        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to fetch active template: {e}")))?
            .ok_or_else(|| {
                let selector = book_type.map_or_else(String::new, |bt| format!(" for '{bt}'"));
                ReviewError::configuration(format!(
                    "no active prompt template for '{task_type}'{selector}"
                ))
            })?;

        row_to_template(&row)
    }

    /// Seed the default templates when the table is empty
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn seed_defaults(&self) -> ReviewResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prompt_templates")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to count templates: {e}")))?;

        if count > 0 {
            return Ok(());
        }

        info!("No prompt templates found, seeding defaults");

        for (task_type, book_type, name, text) in default_templates() {
            self.create(NewTemplate {
                task_type,
                book_type,
                name: name.to_owned(),
                text: text.to_owned(),
                active: true,
            })
            .await?;
        }

        Ok(())
    }
}

/// Deactivate the currently active template for a (task, book type) pair
async fn deactivate_pair(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    task_type: TaskType,
    book_type: Option<BookType>,
) -> ReviewResult<()> {
    let query = if book_type.is_some() {
        "UPDATE prompt_templates SET active = 0 WHERE task_type = $1 AND book_type = $2"
    } else {
        "UPDATE prompt_templates SET active = 0 WHERE task_type = $1 AND book_type IS NULL"
    };

    let mut q = sqlx::query(query).bind(task_type.as_str());
    if let Some(bt) = book_type {
        q = q.bind(bt.as_str());
    }

    q.execute(&mut **tx)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to deactivate previous template: {e}")))?;

    Ok(())
}

/// Map a database row to a [`PromptTemplate`]
fn row_to_template(row: &SqliteRow) -> ReviewResult<PromptTemplate> {
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

    let book_type_str: Option<String> = row
        .try_get("book_type")
        .map_err(|e| ReviewError::database(format!("Failed to get book_type: {e}")))?;
    let book_type = match book_type_str {
        Some(s) => Some(
            BookType::parse_str(&s)
                .ok_or_else(|| ReviewError::database(format!("Invalid book type: {s}")))?,
        ),
        None => None,
    };

    let version: i64 = row
        .try_get("version")
        .map_err(|e| ReviewError::database(format!("Failed to get version: {e}")))?;

    let active: i64 = row
        .try_get("active")
        .map_err(|e| ReviewError::database(format!("Failed to get active: {e}")))?;

    Ok(PromptTemplate {
        id,
        task_type,
        book_type,
        name: text_column(row, "name")?,
        text: text_column(row, "template_text")?,
        version,
        active: active != 0,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Default templates installed on first start
fn default_templates() -> Vec<(TaskType, Option<BookType>, &'static str, &'static str)> {
    vec![
        (
            TaskType::MetadataExtraction,
            None,
            "Metadata Extraction",
            METADATA_EXTRACTION_TEMPLATE,
        ),
        (
            TaskType::InitialReview,
            Some(BookType::Fiction),
            "Fiction Review",
            FICTION_REVIEW_TEMPLATE,
        ),
        (
            TaskType::InitialReview,
            Some(BookType::NonFiction),
            "Non-Fiction Review",
            NON_FICTION_REVIEW_TEMPLATE,
        ),
        (
            TaskType::InitialReview,
            Some(BookType::Poetry),
            "Poetry Review",
            POETRY_REVIEW_TEMPLATE,
        ),
        (
            TaskType::DetailedReview,
            None,
            "Detailed Analysis",
            DETAILED_REVIEW_TEMPLATE,
        ),
    ]
}

const METADATA_EXTRACTION_TEMPLATE: &str = r#"Analyze the manuscript excerpt below and respond with a single JSON object:
"author": name of the primary author if mentioned, otherwise "Not specified"
"co_authors": list of co-authors, or an empty list
"booktype": one of fiction, non-fiction, poetry, screenplay, essay, blog, scientific
"language": primary language of the text, named in that language (French is Francais, German is Deutsch)
"isbn": ISBN number if present, otherwise "Not specified"
"publisher": the publisher if mentioned, otherwise "Not specified"
"word_count": the number of words in the manuscript
"topic": the main topic in at most 10 words, in the identified language
"characters": for fiction, up to five main character names, most important first
"locations": up to three main geographical locations of the story

Base your analysis ONLY on the actual content of the manuscript.

TITLE: {title}

EXCERPT:
{excerpt}"#;

const FICTION_REVIEW_TEMPLATE: &str = r#"You are a professional literary critic reviewing a {type} manuscript titled "{title}" about "{topic}".

Analyze this {language} fiction work across language and style, sensory immersion, scene construction, plot and structure, character development, and originality. Score each dimension and the overall quality from 0 to 100.

Respond with a single JSON object containing:
"ai_quality_score": overall score
"language_style_score", "plot_structure_score", "character_development_score", "originality_score": component scores
"promotional_blurb": a catchy marketing blurb of at most 25 words
"single_line_summary": a one-line summary
"detailed_summary": a one-paragraph summary of the story
"review_summary": a short summary of your review
"full_review": your complete review with strengths and areas for improvement
"service_needs": a list of objects with "category" and "suggestion" naming professional services the author should consider
"plagiarism": an object with "score" (0-100, higher is more original) and "matches" (a list of objects with "source" and "similarity")

EXCERPT:
{excerpt}"#;

const NON_FICTION_REVIEW_TEMPLATE: &str = r#"You are a professional editor reviewing a {type} manuscript titled "{title}" about "{topic}".

Analyze this {language} non-fiction work across substantiation of claims, completeness, structure and clarity, and originality and value. Score each dimension and the overall quality from 0 to 100. Identify weaknesses such as oversimplification, bias, or outdated information.

Respond with a single JSON object containing:
"ai_quality_score": overall score
"language_style_score", "plot_structure_score", "character_development_score", "originality_score": component scores (use plot_structure for organization and character_development for practical value)
"promotional_blurb": a catchy marketing blurb of at most 25 words
"single_line_summary": a one-line summary
"detailed_summary": a one-paragraph summary of the argument
"review_summary": a short summary of your review
"full_review": your complete review with strengths and areas for improvement
"service_needs": a list of objects with "category" and "suggestion" naming professional services the author should consider
"plagiarism": an object with "score" (0-100, higher is more original) and "matches" (a list of objects with "source" and "similarity")

EXCERPT:
{excerpt}"#;

const POETRY_REVIEW_TEMPLATE: &str = r#"You are a poetry critic reviewing a {type} collection titled "{title}" about "{topic}".

Analyze this {language} poetry work across language and craft, imagery and emotion, structure and form, and meaning and impact. Score each dimension and the overall quality from 0 to 100. Comment on the collection's unity and individual poem strengths.

Respond with a single JSON object containing:
"ai_quality_score": overall score
"language_style_score", "plot_structure_score", "character_development_score", "originality_score": component scores (use plot_structure for form and character_development for emotional resonance)
"promotional_blurb": a catchy marketing blurb of at most 25 words
"single_line_summary": a one-line summary
"detailed_summary": a one-paragraph summary of the collection
"review_summary": a short summary of your review
"full_review": your complete review with strengths and areas for improvement
"service_needs": a list of objects with "category" and "suggestion" naming professional services the author should consider
"plagiarism": an object with "score" (0-100, higher is more original) and "matches" (a list of objects with "source" and "similarity")

EXCERPT:
{excerpt}"#;

const DETAILED_REVIEW_TEMPLATE: &str = r#"You are a senior manuscript analyst producing an in-depth paid assessment of a {type} manuscript titled "{title}" about "{topic}", written in {language}.

Go substantially deeper than a first-pass review: analyze pacing chapter by chapter, audience and market fit, comparable titles, and concrete revision priorities ordered by impact.

Respond with a single JSON object containing:
"ai_quality_score": overall score from 0 to 100
"language_style_score", "plot_structure_score", "character_development_score", "originality_score": component scores
"detailed_summary": a thorough summary of the work
"review_summary": a summary of your assessment
"full_review": your complete analysis, including revision priorities
"service_needs": a list of objects with "category" and "suggestion" naming professional services the author should consider
"plagiarism": an object with "score" (0-100, higher is more original) and "matches" (a list of objects with "source" and "similarity")

EXCERPT:
{excerpt}"#;
