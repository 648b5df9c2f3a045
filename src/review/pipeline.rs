// ABOUTME: Review pipeline coordinator - owns every processing-status transition
// ABOUTME: Serializes stages per book, composes resolver, invoker, and normalizer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Review Pipeline Coordinator
//!
//! Stage execution is event-driven: submission and admin retry are the only
//! triggers; there is no background scheduler. Stages of a single book are
//! strictly serialized behind a per-book lock, while different books proceed
//! independently.
//!
//! Failure handling: configuration and ordering violations surface
//! immediately. Provider and parse failures are absorbed once by the
//! failover hop; when the backup also fails the stage fails with the
//! backup's error, results of earlier successful stages stay in place, and
//! the author sees `Failed` with a retry affordance - partial output is
//! never presented as a completed review.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::normalizer::normalize;
use crate::database::Database;
use crate::errors::{ReviewError, ReviewResult};
use crate::llm::FailoverInvoker;
use crate::models::{
    AiReview, Book, BookStatus, LlmRole, ProcessingStatus, ReviewFragment, ReviewStage,
};
use crate::prompts::PromptResolver;

/// Excerpt budget for metadata extraction (characters)
const METADATA_EXCERPT_CHARS: usize = 5000;

/// Excerpt budget for review stages (characters)
const REVIEW_EXCERPT_CHARS: usize = 8000;

/// Fallback value for variables the manuscript did not provide
const NOT_SPECIFIED: &str = "Not specified";

/// Decides whether a book may run the detailed (paid) review stage
///
/// Payment and subscription checks live outside the engine; deployments
/// inject their billing-backed implementation here.
#[async_trait]
pub trait EntitlementCheck: Send + Sync {
    /// Whether the book is entitled to a detailed review
    async fn is_entitled(&self, book_id: Uuid) -> ReviewResult<bool>;
}

/// Entitlement check that admits every book
pub struct AllowAll;

#[async_trait]
impl EntitlementCheck for AllowAll {
    async fn is_entitled(&self, _book_id: Uuid) -> ReviewResult<bool> {
        Ok(true)
    }
}

/// Drives a book's AI review through its stages
pub struct ReviewPipeline {
    db: Database,
    resolver: PromptResolver,
    invoker: FailoverInvoker,
    entitlement: Arc<dyn EntitlementCheck>,
    invoke_timeout: Duration,
    stage_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ReviewPipeline {
    /// Create a pipeline over the database and invoker
    #[must_use]
    pub fn new(
        db: Database,
        invoker: FailoverInvoker,
        entitlement: Arc<dyn EntitlementCheck>,
        invoke_timeout: Duration,
    ) -> Self {
        let resolver = PromptResolver::new(db.templates());
        Self {
            db,
            resolver,
            invoker,
            entitlement,
            invoke_timeout,
            stage_locks: DashMap::new(),
        }
    }

    /// Submit a book for review: Draft only; creates the Pending review row
    ///
    /// Submitting a book already past Draft is rejected - a book never gets
    /// two review records.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown book and `InvalidTransition` when
    /// the book is not in Draft.
    pub async fn submit(&self, book_id: Uuid) -> ReviewResult<AiReview> {
        let book = self.db.reviews().get_book(book_id).await?;
        if book.status != BookStatus::Draft {
            return Err(ReviewError::invalid_transition(format!(
                "book {book_id} is {} and cannot be submitted",
                book.status
            )));
        }

        let review = self.db.reviews().create_review(book_id).await?;
        self.db.reviews().set_book_submitted(book_id).await?;

        info!(book_id = %book_id, "book submitted for ai review");
        Ok(review)
    }

    /// Run one stage for a book
    ///
    /// Stages run strictly in order and each runs once; a failed stage is
    /// re-entered only through [`Self::retry`].
    ///
    /// # Errors
    ///
    /// `MissingPrerequisite` when the preceding stage has not completed,
    /// `InvalidTransition` for re-runs and entitlement refusals (review
    /// state untouched in both cases), otherwise the stage failure that was
    /// recorded on the review.
    pub async fn run_stage(&self, book_id: Uuid, stage: ReviewStage) -> ReviewResult<AiReview> {
        let lock = self
            .stage_locks
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let book = self.db.reviews().get_book(book_id).await?;
        let review = self.db.reviews().get_review(book_id).await?;

        if let Some(required) = stage.prerequisite() {
            if !review.stage_completed(required) {
                return Err(ReviewError::MissingPrerequisite { stage, required });
            }
        }
        if review.stage_completed(stage) {
            return Err(ReviewError::invalid_transition(format!(
                "stage '{stage}' already completed for book {book_id}"
            )));
        }
        if stage == ReviewStage::DetailedReview
            && !self.entitlement.is_entitled(book_id).await?
        {
            return Err(ReviewError::invalid_transition(format!(
                "book {book_id} is not entitled to a detailed review"
            )));
        }

        self.db.reviews().mark_processing(book_id, stage).await?;
        if book.status != BookStatus::AIReviewInProgress {
            self.db
                .reviews()
                .set_book_status(book_id, BookStatus::AIReviewInProgress)
                .await?;
        }

        match self.execute_stage(&book, stage).await {
            Ok((fragment, served_by, model_code)) => {
                self.finish_stage(book_id, stage, fragment, served_by, &model_code)
                    .await
            }
            Err(cause) => {
                error!(
                    book_id = %book_id,
                    stage = %stage,
                    error = %cause,
                    "review stage failed"
                );
                self.db
                    .reviews()
                    .record_stage_failure(book_id, stage, &cause.to_string())
                    .await?;
                self.db
                    .reviews()
                    .set_book_status(book_id, BookStatus::Failed)
                    .await?;
                Err(cause)
            }
        }
    }

    /// Current review record for a book
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the book has not been submitted.
    pub async fn get_status(&self, book_id: Uuid) -> ReviewResult<AiReview> {
        self.db.reviews().get_review(book_id).await
    }

    /// Retry a failed review, re-entering at the failed stage
    ///
    /// This is the only retry path; nothing retries in the background.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the review is in Failed.
    pub async fn retry(&self, book_id: Uuid) -> ReviewResult<AiReview> {
        let review = self.db.reviews().get_review(book_id).await?;
        if review.processing_status != ProcessingStatus::Failed {
            return Err(ReviewError::invalid_transition(format!(
                "review for book {book_id} is {} and cannot be retried",
                review.processing_status
            )));
        }
        let stage = review.failed_stage.ok_or_else(|| {
            ReviewError::internal(format!("failed review for book {book_id} has no failed stage"))
        })?;

        self.db.reviews().reset_for_retry(book_id).await?;
        info!(book_id = %book_id, stage = %stage, "retrying failed review stage");

        self.run_stage(book_id, stage).await
    }

    /// Record the author's public response to a completed review
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the review is Completed.
    pub async fn add_author_response(
        &self,
        book_id: Uuid,
        response: &str,
    ) -> ReviewResult<AiReview> {
        let review = self.db.reviews().get_review(book_id).await?;
        if review.processing_status != ProcessingStatus::Completed {
            return Err(ReviewError::invalid_transition(format!(
                "review for book {book_id} is {}; responses are accepted once completed",
                review.processing_status
            )));
        }

        self.db
            .reviews()
            .set_author_response(book_id, response)
            .await?;
        self.db.reviews().get_review(book_id).await
    }

    // ========================================================================
    // Stage Execution
    // ========================================================================

    /// Resolve, invoke, normalize - with the parse-failure backup hop
    async fn execute_stage(
        &self,
        book: &Book,
        stage: ReviewStage,
    ) -> ReviewResult<(ReviewFragment, LlmRole, String)> {
        let task_type = stage.task_type();
        let book_type = match stage {
            ReviewStage::Metadata => None,
            ReviewStage::InitialReview | ReviewStage::DetailedReview => book.book_type,
        };

        let variables = Self::build_variables(book, stage);
        let resolved = self
            .resolver
            .resolve(task_type, book_type, &variables)
            .await?;

        let invocation = self
            .invoker
            .invoke(task_type, &resolved.text, self.invoke_timeout)
            .await?;

        match normalize(&invocation.raw_body, task_type) {
            Ok(fragment) => Ok((fragment, invocation.served_by, invocation.model_code)),
            // An unparsable primary response fails over exactly like an
            // unreachable primary; an unparsable backup response is terminal.
            Err(parse_error) if invocation.served_by == LlmRole::Primary => {
                warn!(
                    book_id = %book.id,
                    stage = %stage,
                    error = %parse_error,
                    "primary response unparsable, failing over to backup"
                );
                let backup = self
                    .invoker
                    .invoke_role(task_type, LlmRole::Backup, &resolved.text, self.invoke_timeout)
                    .await?;
                let fragment = normalize(&backup.raw_body, task_type)?;
                Ok((fragment, backup.served_by, backup.model_code))
            }
            Err(parse_error) => Err(parse_error),
        }
    }

    /// Merge a successful fragment and advance the state machine
    async fn finish_stage(
        &self,
        book_id: Uuid,
        stage: ReviewStage,
        fragment: ReviewFragment,
        served_by: LlmRole,
        model_code: &str,
    ) -> ReviewResult<AiReview> {
        if stage == ReviewStage::Metadata {
            if let Some(metadata) = &fragment.metadata {
                self.db
                    .reviews()
                    .apply_book_metadata(book_id, metadata)
                    .await?;
            }
        }

        let final_stage = matches!(
            stage,
            ReviewStage::InitialReview | ReviewStage::DetailedReview
        );

        let review = self
            .db
            .reviews()
            .record_stage_success(book_id, stage, &fragment, served_by, model_code, final_stage)
            .await?;

        if final_stage {
            self.db.reviews().set_book_completed(book_id).await?;
        }

        info!(
            book_id = %book_id,
            stage = %stage,
            served_by = %served_by,
            model = %model_code,
            "review stage completed"
        );
        Ok(review)
    }

    /// Variables available to every template
    ///
    /// The pipeline always supplies `title`, `type`, `topic`, `language`,
    /// and `excerpt`; templates referencing anything else fail resolution.
    fn build_variables(book: &Book, stage: ReviewStage) -> HashMap<String, String> {
        let budget = match stage {
            ReviewStage::Metadata => METADATA_EXCERPT_CHARS,
            ReviewStage::InitialReview | ReviewStage::DetailedReview => REVIEW_EXCERPT_CHARS,
        };
        let excerpt: String = book.manuscript_text.chars().take(budget).collect();

        let mut variables = HashMap::new();
        variables.insert("title".to_owned(), book.title.clone());
        variables.insert(
            "type".to_owned(),
            book.book_type
                .map_or_else(|| NOT_SPECIFIED.to_owned(), |bt| bt.as_str().to_owned()),
        );
        variables.insert(
            "topic".to_owned(),
            book.topic.clone().unwrap_or_else(|| NOT_SPECIFIED.to_owned()),
        );
        variables.insert(
            "language".to_owned(),
            book.language
                .clone()
                .unwrap_or_else(|| NOT_SPECIFIED.to_owned()),
        );
        variables.insert("excerpt".to_owned(), excerpt);
        variables
    }
}
