// ABOUTME: Tests for the result normalizer - JSON extraction, clamping, defaulting
// ABOUTME: Models wrap JSON in prose; only a total absence of JSON is a parse error
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

use folio_review_server::errors::ReviewError;
use folio_review_server::models::{BookType, TaskType};
use folio_review_server::review::normalize;

use common::{METADATA_RESPONSE, REVIEW_RESPONSE};

#[test]
fn extracts_json_wrapped_in_commentary() {
    let fragment = normalize(METADATA_RESPONSE, TaskType::MetadataExtraction).unwrap();
    let metadata = fragment.metadata.unwrap();

    assert_eq!(metadata.author.as_deref(), Some("M. Verne"));
    assert_eq!(metadata.book_type, Some(BookType::Fiction));
    assert_eq!(metadata.language.as_deref(), Some("English"));
    assert_eq!(metadata.word_count, Some(52000));
    assert_eq!(metadata.characters, vec!["Anse", "Mireille"]);
    // "Not specified" answers are treated as absent
    assert!(metadata.isbn.is_none());
    assert!(metadata.publisher.is_none());
}

#[test]
fn review_response_maps_scores_summaries_and_needs() {
    let fragment = normalize(REVIEW_RESPONSE, TaskType::InitialReview).unwrap();

    let scores = fragment.scores.unwrap();
    assert_eq!(scores.overall, Some(87));
    assert_eq!(scores.language_style, Some(84));
    assert_eq!(scores.originality, Some(90));

    let summaries = fragment.summaries.unwrap();
    assert!(summaries.promotional_blurb.unwrap().contains("lighthouse"));
    assert!(summaries.full_review.is_some());

    assert_eq!(fragment.service_needs.len(), 1);
    assert_eq!(fragment.service_needs[0].category, "Copy Editing");

    let plagiarism = fragment.plagiarism.unwrap();
    assert_eq!(plagiarism.score, 96);
    assert!(plagiarism.matches.is_empty());

    assert!(!fragment.suspect_score);
}

#[test]
fn out_of_range_score_is_clamped_and_flagged_not_rejected() {
    let body = r#"{"ai_quality_score": 150, "language_style_score": -3}"#;
    let fragment = normalize(body, TaskType::InitialReview).unwrap();

    let scores = fragment.scores.unwrap();
    assert_eq!(scores.overall, Some(100));
    assert_eq!(scores.language_style, Some(0));
    assert!(fragment.suspect_score);
}

#[test]
fn numeric_strings_are_accepted() {
    let body = r#"{"ai_quality_score": "88"}"#;
    let fragment = normalize(body, TaskType::InitialReview).unwrap();
    assert_eq!(fragment.scores.unwrap().overall, Some(88));
}

#[test]
fn missing_optional_fields_default_instead_of_failing() {
    let body = r#"{"ai_quality_score": 70}"#;
    let fragment = normalize(body, TaskType::InitialReview).unwrap();

    assert!(fragment.summaries.is_none());
    assert!(fragment.service_needs.is_empty());
    assert!(fragment.plagiarism.is_none());
}

#[test]
fn plagiarism_without_matches_gets_an_empty_array() {
    let body = r#"{"plagiarism": {"score": 91}}"#;
    let fragment = normalize(body, TaskType::InitialReview).unwrap();

    let plagiarism = fragment.plagiarism.unwrap();
    assert_eq!(plagiarism.score, 91);
    assert!(plagiarism.matches.is_empty());
}

#[test]
fn skips_malformed_candidates_and_finds_the_real_object() {
    let body = r#"The result {not valid json} is below:
{"ai_quality_score": 75}"#;
    let fragment = normalize(body, TaskType::InitialReview).unwrap();
    assert_eq!(fragment.scores.unwrap().overall, Some(75));
}

#[test]
fn braces_inside_strings_do_not_confuse_extraction() {
    let body = r#"{"review_summary": "uses {curly} notation", "ai_quality_score": 80}"#;
    let fragment = normalize(body, TaskType::InitialReview).unwrap();
    assert_eq!(fragment.scores.unwrap().overall, Some(80));
    assert_eq!(
        fragment.summaries.unwrap().review_summary.as_deref(),
        Some("uses {curly} notation")
    );
}

#[test]
fn output_without_any_json_is_a_parse_error() {
    let err = normalize(
        "I'm sorry, I can't review this manuscript.",
        TaskType::InitialReview,
    )
    .unwrap_err();

    match err {
        ReviewError::Parse { raw, .. } => assert!(raw.contains("sorry")),
        other => panic!("expected Parse, got {other:?}"),
    }
}
