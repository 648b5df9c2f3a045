// ABOUTME: Integration tests for the review pipeline state machine
// ABOUTME: Covers submit idempotence, stage ordering, failover, retry re-entry, entitlement
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

#![allow(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::single_match_else
)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use folio_review_server::database::Database;
use folio_review_server::errors::{ReviewError, ReviewResult};
use folio_review_server::models::{
    BookStatus, BookType, LlmRole, ProcessingStatus, ReviewStage,
};
use folio_review_server::review::{AllowAll, EntitlementCheck, ReviewPipeline};

use common::{
    create_book, ok_response, scripted_invoker, seed_configs, seed_pipeline_templates, test_db,
    transient_failure, ScriptedTransport, METADATA_RESPONSE, REVIEW_RESPONSE, TEST_TIMEOUT,
};

/// Entitlement check that refuses every book
struct DenyAll;

#[async_trait]
impl EntitlementCheck for DenyAll {
    async fn is_entitled(&self, _book_id: Uuid) -> ReviewResult<bool> {
        Ok(false)
    }
}

async fn pipeline_with(
    db: &Database,
    transport: Arc<ScriptedTransport>,
    entitlement: Arc<dyn EntitlementCheck>,
) -> ReviewPipeline {
    seed_configs(db).await;
    seed_pipeline_templates(db).await;
    ReviewPipeline::new(
        db.clone(),
        scripted_invoker(db, transport),
        entitlement,
        TEST_TIMEOUT,
    )
}

// ============================================================================
// Submit
// ============================================================================

#[tokio::test]
async fn submit_creates_a_pending_review_and_marks_the_book() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let pipeline = pipeline_with(&db, transport, Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;

    let review = pipeline.submit(book.id).await.unwrap();

    assert_eq!(review.processing_status, ProcessingStatus::Pending);
    let book = db.reviews().get_book(book.id).await.unwrap();
    assert_eq!(book.status, BookStatus::SubmittedForAIReview);
    assert!(book.submitted_for_ai_review_at.is_some());
}

#[tokio::test]
async fn submitting_twice_never_creates_a_second_review() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let pipeline = pipeline_with(&db, transport, Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;

    let first = pipeline.submit(book.id).await.unwrap();
    let err = pipeline.submit(book.id).await.unwrap_err();

    assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    let review = pipeline.get_status(book.id).await.unwrap();
    assert_eq!(review.id, first.id);
}

// ============================================================================
// Stage Ordering
// ============================================================================

#[tokio::test]
async fn running_a_stage_out_of_order_leaves_the_review_untouched() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    let err = pipeline
        .run_stage(book.id, ReviewStage::InitialReview)
        .await
        .unwrap_err();

    match err {
        ReviewError::MissingPrerequisite { stage, required } => {
            assert_eq!(stage, ReviewStage::InitialReview);
            assert_eq!(required, ReviewStage::Metadata);
        }
        other => panic!("expected MissingPrerequisite, got {other:?}"),
    }

    // No provider call was made and the review record is untouched
    assert_eq!(transport.call_count(), 0);
    let review = pipeline.get_status(book.id).await.unwrap();
    assert_eq!(review.processing_status, ProcessingStatus::Pending);
    assert!(review.error_message.is_none());
}

#[tokio::test]
async fn a_completed_stage_cannot_be_rerun() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response(METADATA_RESPONSE)]));
    let pipeline = pipeline_with(&db, transport, Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();
    pipeline.run_stage(book.id, ReviewStage::Metadata).await.unwrap();

    let err = pipeline
        .run_stage(book.id, ReviewStage::Metadata)
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::InvalidTransition { .. }));
}

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn metadata_then_initial_review_completes_the_book() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        ok_response(METADATA_RESPONSE),
        ok_response(REVIEW_RESPONSE),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    // No book type at upload: the metadata stage must backfill it
    let book = create_book(&db, None).await;
    pipeline.submit(book.id).await.unwrap();

    let review = pipeline
        .run_stage(book.id, ReviewStage::Metadata)
        .await
        .unwrap();
    assert!(review.stage_completed(ReviewStage::Metadata));
    assert_eq!(review.served_by_role, Some(LlmRole::Primary));

    let book_after = db.reviews().get_book(book.id).await.unwrap();
    assert_eq!(book_after.status, BookStatus::AIReviewInProgress);
    assert_eq!(book_after.book_type, Some(BookType::Fiction));
    let metadata = book_after.extracted_metadata.unwrap();
    assert_eq!(metadata.author.as_deref(), Some("M. Verne"));

    let review = pipeline
        .run_stage(book.id, ReviewStage::InitialReview)
        .await
        .unwrap();

    assert_eq!(review.processing_status, ProcessingStatus::Completed);
    assert_eq!(review.scores.unwrap().overall, Some(87));
    assert_eq!(review.service_needs.len(), 1);
    assert!(review.error_message.is_none());

    let book_after = db.reviews().get_book(book.id).await.unwrap();
    assert_eq!(book_after.status, BookStatus::AIReviewCompleted);
    assert!(book_after.ai_review_completed_at.is_some());
    assert_eq!(transport.call_count(), 2);
}

// ============================================================================
// Failover Properties
// ============================================================================

#[tokio::test]
async fn primary_failure_with_backup_success_records_served_by_backup() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        transient_failure("primary 503"),
        ok_response(METADATA_RESPONSE),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    let review = pipeline
        .run_stage(book.id, ReviewStage::Metadata)
        .await
        .unwrap();

    assert_eq!(review.served_by_role, Some(LlmRole::Backup));
    // Exactly two provider calls were made, never more
    assert_eq!(
        transport.roles_called(),
        vec![LlmRole::Primary, LlmRole::Backup]
    );
}

#[tokio::test]
async fn unparsable_primary_response_fails_over_like_a_network_failure() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        ok_response("Sorry, I cannot help with that."),
        ok_response(METADATA_RESPONSE),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    let review = pipeline
        .run_stage(book.id, ReviewStage::Metadata)
        .await
        .unwrap();

    assert_eq!(review.served_by_role, Some(LlmRole::Backup));
    assert_eq!(
        transport.roles_called(),
        vec![LlmRole::Primary, LlmRole::Backup]
    );
}

#[tokio::test]
async fn unparsable_backup_response_is_terminal_after_two_calls() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        transient_failure("primary down"),
        ok_response("still not json"),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    let err = pipeline
        .run_stage(book.id, ReviewStage::Metadata)
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Parse { .. }));
    assert_eq!(transport.call_count(), 2);

    let review = pipeline.get_status(book.id).await.unwrap();
    assert_eq!(review.processing_status, ProcessingStatus::Failed);
}

#[tokio::test]
async fn double_failure_fails_the_stage_with_the_backup_error() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        transient_failure("primary down"),
        transient_failure("backup down"),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    let err = pipeline
        .run_stage(book.id, ReviewStage::Metadata)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReviewError::Transient {
            role: LlmRole::Backup,
            ..
        }
    ));
    assert_eq!(transport.call_count(), 2);

    let review = pipeline.get_status(book.id).await.unwrap();
    assert_eq!(review.processing_status, ProcessingStatus::Failed);
    assert_eq!(review.failed_stage, Some(ReviewStage::Metadata));
    assert!(review.error_message.unwrap().contains("backup down"));

    let book_after = db.reviews().get_book(book.id).await.unwrap();
    assert_eq!(book_after.status, BookStatus::Failed);
}

// ============================================================================
// Retry
// ============================================================================

#[tokio::test]
async fn retry_reenters_at_the_failed_stage_keeping_earlier_results() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        ok_response(METADATA_RESPONSE),
        transient_failure("primary down"),
        transient_failure("backup down"),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    pipeline.run_stage(book.id, ReviewStage::Metadata).await.unwrap();
    let metadata_stamp = pipeline
        .get_status(book.id)
        .await
        .unwrap()
        .metadata_completed_at;

    pipeline
        .run_stage(book.id, ReviewStage::InitialReview)
        .await
        .unwrap_err();

    // The admin fixes the outage; the next attempt succeeds
    transport.push(ok_response(REVIEW_RESPONSE));
    let review = pipeline.retry(book.id).await.unwrap();

    assert_eq!(review.processing_status, ProcessingStatus::Completed);
    assert!(review.error_message.is_none());
    // Metadata was not re-run: its stamp is unchanged and no extra calls ran
    assert_eq!(review.metadata_completed_at, metadata_stamp);
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn retry_is_only_valid_from_failed() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let pipeline = pipeline_with(&db, transport, Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    let err = pipeline.retry(book.id).await.unwrap_err();
    assert!(matches!(err, ReviewError::InvalidTransition { .. }));
}

// ============================================================================
// Entitlement
// ============================================================================

#[tokio::test]
async fn detailed_review_is_gated_by_the_entitlement_check() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        ok_response(METADATA_RESPONSE),
        ok_response(REVIEW_RESPONSE),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(DenyAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();
    pipeline.run_stage(book.id, ReviewStage::Metadata).await.unwrap();
    pipeline
        .run_stage(book.id, ReviewStage::InitialReview)
        .await
        .unwrap();

    let err = pipeline
        .run_stage(book.id, ReviewStage::DetailedReview)
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    // The refusal made no provider call and left the completed review alone
    assert_eq!(transport.call_count(), 2);
    let review = pipeline.get_status(book.id).await.unwrap();
    assert_eq!(review.processing_status, ProcessingStatus::Completed);
    assert!(!review.stage_completed(ReviewStage::DetailedReview));
}

#[tokio::test]
async fn entitled_books_run_the_detailed_stage_after_the_initial_review() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        ok_response(METADATA_RESPONSE),
        ok_response(REVIEW_RESPONSE),
        ok_response(REVIEW_RESPONSE),
    ]));
    let pipeline = pipeline_with(&db, transport.clone(), Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();
    pipeline.run_stage(book.id, ReviewStage::Metadata).await.unwrap();
    pipeline
        .run_stage(book.id, ReviewStage::InitialReview)
        .await
        .unwrap();

    let review = pipeline
        .run_stage(book.id, ReviewStage::DetailedReview)
        .await
        .unwrap();

    assert_eq!(review.processing_status, ProcessingStatus::Completed);
    assert!(review.stage_completed(ReviewStage::DetailedReview));
    assert_eq!(transport.call_count(), 3);
}

// ============================================================================
// Author Response
// ============================================================================

#[tokio::test]
async fn author_response_is_rejected_until_the_review_completes() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        ok_response(METADATA_RESPONSE),
        ok_response(REVIEW_RESPONSE),
    ]));
    let pipeline = pipeline_with(&db, transport, Arc::new(AllowAll)).await;
    let book = create_book(&db, Some(BookType::Fiction)).await;
    pipeline.submit(book.id).await.unwrap();

    let err = pipeline
        .add_author_response(book.id, "Thank you for the feedback.")
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::InvalidTransition { .. }));

    pipeline.run_stage(book.id, ReviewStage::Metadata).await.unwrap();
    pipeline
        .run_stage(book.id, ReviewStage::InitialReview)
        .await
        .unwrap();

    let review = pipeline
        .add_author_response(book.id, "Thank you for the feedback.")
        .await
        .unwrap();
    assert_eq!(
        review.author_response.as_deref(),
        Some("Thank you for the feedback.")
    );
}
