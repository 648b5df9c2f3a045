// ABOUTME: Persistence for books and their AI review records
// ABOUTME: One review row per book; stage timestamps drive ordering and retry re-entry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::llm_configs::{datetime_column, optional_datetime_column, text_column};
use crate::errors::{ReviewError, ReviewResult};
use crate::models::{
    AiReview, Book, BookStatus, BookType, LlmRole, ManuscriptMetadata, ProcessingStatus,
    ReviewFragment, ReviewStage,
};

/// Request to create a book; in production this comes from the upload flow
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    /// Title
    pub title: String,
    /// Classification, when the author provided one
    pub book_type: Option<BookType>,
    /// Language, when the author provided one
    pub language: Option<String>,
    /// Topic, when the author provided one
    pub topic: Option<String>,
    /// Extracted manuscript text
    pub manuscript_text: String,
}

/// Store for books and AI reviews
pub struct ReviewStore {
    pool: SqlitePool,
}

impl ReviewStore {
    /// Create a new store over the shared pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Books
    // ========================================================================

    /// Create a book in Draft status
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create_book(&self, request: NewBook) -> ReviewResult<Book> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let word_count = request.manuscript_text.split_whitespace().count() as i64;

        sqlx::query(
            r"
            INSERT INTO books (
                id, title, status, book_type, language, topic,
                manuscript_text, word_count, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ",
        )
        .bind(id.to_string())
        .bind(&request.title)
        .bind(BookStatus::Draft.as_str())
        .bind(request.book_type.map(BookType::as_str))
        .bind(&request.language)
        .bind(&request.topic)
        .bind(&request.manuscript_text)
        .bind(word_count)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to create book: {e}")))?;

        self.get_book(id).await
    }

    /// Get a book by id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id does not exist.
    pub async fn get_book(&self, id: Uuid) -> ReviewResult<Book> {
        let row = sqlx::query("SELECT * FROM books WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to fetch book: {e}")))?
            .ok_or_else(|| ReviewError::not_found(format!("book {id}")))?;

        row_to_book(&row)
    }

    /// Set a book's lifecycle status
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_book_status(&self, id: Uuid, status: BookStatus) -> ReviewResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE books SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to update book status: {e}")))?;
        Ok(())
    }

    /// Mark a book submitted for review
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_book_submitted(&self, id: Uuid) -> ReviewResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            UPDATE books
            SET status = $1, submitted_for_ai_review_at = $2, updated_at = $2
            WHERE id = $3
            ",
        )
        .bind(BookStatus::SubmittedForAIReview.as_str())
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to mark book submitted: {e}")))?;
        Ok(())
    }

    /// Mark a book's review completed
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_book_completed(&self, id: Uuid) -> ReviewResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            UPDATE books
            SET status = $1, ai_review_completed_at = $2, updated_at = $2
            WHERE id = $3
            ",
        )
        .bind(BookStatus::AIReviewCompleted.as_str())
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to mark book completed: {e}")))?;
        Ok(())
    }

    /// Store extracted metadata and backfill classification fields the
    /// author left empty
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn apply_book_metadata(
        &self,
        id: Uuid,
        metadata: &ManuscriptMetadata,
    ) -> ReviewResult<()> {
        let book = self.get_book(id).await?;
        let now = Utc::now().to_rfc3339();

        let book_type = book.book_type.or(metadata.book_type);
        let language = book.language.or_else(|| metadata.language.clone());
        let topic = book.topic.or_else(|| metadata.topic.clone());
        let metadata_json = to_json(metadata)?;

        sqlx::query(
            r"
            UPDATE books
            SET extracted_metadata = $1, book_type = $2, language = $3,
                topic = $4, updated_at = $5
            WHERE id = $6
            ",
        )
        .bind(&metadata_json)
        .bind(book_type.map(BookType::as_str))
        .bind(&language)
        .bind(&topic)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to store metadata: {e}")))?;
        Ok(())
    }

    // ========================================================================
    // AI Reviews
    // ========================================================================

    /// Create the review row for a book in Pending status
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when a review already exists for the book;
    /// a book never gets two review records.
    pub async fn create_review(&self, book_id: Uuid) -> ReviewResult<AiReview> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO ai_reviews (id, book_id, processing_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ",
        )
        .bind(id.to_string())
        .bind(book_id.to_string())
        .bind(ProcessingStatus::Pending.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                ReviewError::invalid_transition(format!("book {book_id} already has a review"))
            } else {
                ReviewError::database(format!("Failed to create review: {e}"))
            }
        })?;

        self.get_review(book_id).await
    }

    /// Get the review for a book
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the book has not been submitted.
    pub async fn get_review(&self, book_id: Uuid) -> ReviewResult<AiReview> {
        let row = sqlx::query("SELECT * FROM ai_reviews WHERE book_id = $1")
            .bind(book_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to fetch review: {e}")))?
            .ok_or_else(|| ReviewError::not_found(format!("ai review for book {book_id}")))?;

        row_to_review(&row)
    }

    /// Mark a stage as running
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn mark_processing(&self, book_id: Uuid, stage: ReviewStage) -> ReviewResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            UPDATE ai_reviews
            SET processing_status = $1, current_stage = $2, updated_at = $3
            WHERE book_id = $4
            ",
        )
        .bind(ProcessingStatus::Processing.as_str())
        .bind(stage.as_str())
        .bind(&now)
        .bind(book_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to mark review processing: {e}")))?;
        Ok(())
    }

    /// Merge a stage's normalized fragment into the review and stamp the
    /// stage completion; fields written by earlier stages are preserved
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn record_stage_success(
        &self,
        book_id: Uuid,
        stage: ReviewStage,
        fragment: &ReviewFragment,
        served_by: LlmRole,
        model_used: &str,
        final_stage: bool,
    ) -> ReviewResult<AiReview> {
        let current = self.get_review(book_id).await?;
        let now = Utc::now().to_rfc3339();

        // Newer stage output wins field-by-field; earlier results survive
        let scores = fragment.scores.clone().or(current.scores);
        let summaries = merge_summaries(current.summaries, fragment.summaries.clone());
        let service_needs = if fragment.service_needs.is_empty() {
            current.service_needs
        } else {
            fragment.service_needs.clone()
        };
        let plagiarism = fragment.plagiarism.clone().or(current.plagiarism);
        let suspect_score = current.suspect_score || fragment.suspect_score;

        let status = if final_stage {
            ProcessingStatus::Completed
        } else {
            ProcessingStatus::Processing
        };

        let stage_column = stage_column(stage);
        let sql = format!(
            r"
            UPDATE ai_reviews
            SET processing_status = $1, current_stage = $2, failed_stage = NULL,
                served_by_role = $3, model_used = $4, scores = $5, summaries = $6,
                service_needs = $7, plagiarism = $8, suspect_score = $9,
                error_message = NULL, {stage_column} = $10, updated_at = $10
            WHERE book_id = $11
            "
        );

        sqlx::query(&sql)
            .bind(status.as_str())
            .bind(stage.as_str())
            .bind(served_by.as_str())
            .bind(model_used)
            .bind(to_optional_json(scores.as_ref())?)
            .bind(to_optional_json(summaries.as_ref())?)
            .bind(to_json(&service_needs)?)
            .bind(to_optional_json(plagiarism.as_ref())?)
            .bind(i32::from(suspect_score))
            .bind(&now)
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ReviewError::database(format!("Failed to record stage success: {e}")))?;

        self.get_review(book_id).await
    }

    /// Record a stage failure; results of earlier stages are not rolled back
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn record_stage_failure(
        &self,
        book_id: Uuid,
        stage: ReviewStage,
        error_message: &str,
    ) -> ReviewResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            UPDATE ai_reviews
            SET processing_status = $1, current_stage = $2, failed_stage = $2,
                error_message = $3, updated_at = $4
            WHERE book_id = $5
            ",
        )
        .bind(ProcessingStatus::Failed.as_str())
        .bind(stage.as_str())
        .bind(error_message)
        .bind(&now)
        .bind(book_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to record stage failure: {e}")))?;
        Ok(())
    }

    /// Reset a failed review to Pending for retry; the failed stage marker is
    /// kept so the pipeline re-enters at the right place
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn reset_for_retry(&self, book_id: Uuid) -> ReviewResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            UPDATE ai_reviews
            SET processing_status = $1, error_message = NULL, updated_at = $2
            WHERE book_id = $3
            ",
        )
        .bind(ProcessingStatus::Pending.as_str())
        .bind(&now)
        .bind(book_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to reset review: {e}")))?;
        Ok(())
    }

    /// Store the author's public response
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn set_author_response(&self, book_id: Uuid, response: &str) -> ReviewResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE ai_reviews SET author_response = $1, updated_at = $2 WHERE book_id = $3",
        )
        .bind(response)
        .bind(&now)
        .bind(book_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ReviewError::database(format!("Failed to store author response: {e}")))?;
        Ok(())
    }
}

/// Column stamped when a stage completes
const fn stage_column(stage: ReviewStage) -> &'static str {
    match stage {
        ReviewStage::Metadata => "metadata_completed_at",
        ReviewStage::InitialReview => "initial_review_completed_at",
        ReviewStage::DetailedReview => "detailed_review_completed_at",
    }
}

/// Field-wise merge: the newer stage's summaries win where present
fn merge_summaries(
    current: Option<crate::models::ReviewSummaries>,
    incoming: Option<crate::models::ReviewSummaries>,
) -> Option<crate::models::ReviewSummaries> {
    match (current, incoming) {
        (None, incoming) => incoming,
        (current, None) => current,
        (Some(old), Some(new)) => Some(crate::models::ReviewSummaries {
            promotional_blurb: new.promotional_blurb.or(old.promotional_blurb),
            single_line_summary: new.single_line_summary.or(old.single_line_summary),
            detailed_summary: new.detailed_summary.or(old.detailed_summary),
            review_summary: new.review_summary.or(old.review_summary),
            full_review: new.full_review.or(old.full_review),
        }),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> ReviewResult<String> {
    serde_json::to_string(value)
        .map_err(|e| ReviewError::internal(format!("Failed to serialize column: {e}")))
}

fn to_optional_json<T: serde::Serialize>(value: Option<&T>) -> ReviewResult<Option<String>> {
    value.map(to_json).transpose()
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, name: &str) -> ReviewResult<Option<T>> {
    let raw: Option<String> = row
        .try_get(name)
        .map_err(|e| ReviewError::database(format!("Failed to get {name}: {e}")))?;
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| ReviewError::database(format!("Invalid JSON in {name}: {e}")))
    })
    .transpose()
}

fn optional_text(row: &SqliteRow, name: &str) -> ReviewResult<Option<String>> {
    row.try_get(name)
        .map_err(|e| ReviewError::database(format!("Failed to get {name}: {e}")))
}

/// Map a database row to a [`Book`]
fn row_to_book(row: &SqliteRow) -> ReviewResult<Book> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| ReviewError::database(format!("Failed to get id: {e}")))?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| ReviewError::database(format!("Invalid UUID: {e}")))?;

    let status_str = text_column(row, "status")?;
    let status = BookStatus::parse_str(&status_str)
        .ok_or_else(|| ReviewError::database(format!("Invalid book status: {status_str}")))?;

    let book_type = match optional_text(row, "book_type")? {
        Some(s) => Some(
            BookType::parse_str(&s)
                .ok_or_else(|| ReviewError::database(format!("Invalid book type: {s}")))?,
        ),
        None => None,
    };

    let word_count: i64 = row
        .try_get("word_count")
        .map_err(|e| ReviewError::database(format!("Failed to get word_count: {e}")))?;

    Ok(Book {
        id,
        title: text_column(row, "title")?,
        status,
        book_type,
        language: optional_text(row, "language")?,
        topic: optional_text(row, "topic")?,
        manuscript_text: text_column(row, "manuscript_text")?,
        word_count,
        extracted_metadata: json_column(row, "extracted_metadata")?,
        submitted_for_ai_review_at: optional_datetime_column(row, "submitted_for_ai_review_at")?,
        ai_review_completed_at: optional_datetime_column(row, "ai_review_completed_at")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Map a database row to an [`AiReview`]
fn row_to_review(row: &SqliteRow) -> ReviewResult<AiReview> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| ReviewError::database(format!("Failed to get id: {e}")))?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| ReviewError::database(format!("Invalid UUID: {e}")))?;

    let book_id_str: String = row
        .try_get("book_id")
        .map_err(|e| ReviewError::database(format!("Failed to get book_id: {e}")))?;
    let book_id = Uuid::parse_str(&book_id_str)
        .map_err(|e| ReviewError::database(format!("Invalid UUID: {e}")))?;

    let status_str = text_column(row, "processing_status")?;
    let processing_status = ProcessingStatus::parse_str(&status_str).ok_or_else(|| {
        ReviewError::database(format!("Invalid processing status: {status_str}"))
    })?;

    let current_stage = parse_optional_stage(row, "current_stage")?;
    let failed_stage = parse_optional_stage(row, "failed_stage")?;

    let served_by_role = match optional_text(row, "served_by_role")? {
        Some(s) => Some(
            LlmRole::parse_str(&s)
                .ok_or_else(|| ReviewError::database(format!("Invalid role: {s}")))?,
        ),
        None => None,
    };

    let suspect_score: i64 = row
        .try_get("suspect_score")
        .map_err(|e| ReviewError::database(format!("Failed to get suspect_score: {e}")))?;

    Ok(AiReview {
        id,
        book_id,
        processing_status,
        current_stage,
        failed_stage,
        served_by_role,
        model_used: optional_text(row, "model_used")?,
        scores: json_column(row, "scores")?,
        summaries: json_column(row, "summaries")?,
        service_needs: json_column(row, "service_needs")?.unwrap_or_default(),
        plagiarism: json_column(row, "plagiarism")?,
        suspect_score: suspect_score != 0,
        author_response: optional_text(row, "author_response")?,
        error_message: optional_text(row, "error_message")?,
        metadata_completed_at: optional_datetime_column(row, "metadata_completed_at")?,
        initial_review_completed_at: optional_datetime_column(
            row,
            "initial_review_completed_at",
        )?,
        detailed_review_completed_at: optional_datetime_column(
            row,
            "detailed_review_completed_at",
        )?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

fn parse_optional_stage(row: &SqliteRow, name: &str) -> ReviewResult<Option<ReviewStage>> {
    match optional_text(row, name)? {
        Some(s) => Ok(Some(ReviewStage::parse_str(&s).ok_or_else(|| {
            ReviewError::database(format!("Invalid stage in {name}: {s}"))
        })?)),
        None => Ok(None),
    }
}
