// ABOUTME: Integration tests for prompt resolution - template lookup and substitution
// ABOUTME: Covers configuration failures, strict substitution, and detailed-review fallback
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

use std::collections::HashMap;

use folio_review_server::database::NewTemplate;
use folio_review_server::errors::ReviewError;
use folio_review_server::models::{BookType, TaskType};
use folio_review_server::prompts::PromptResolver;

use common::test_db;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[tokio::test]
async fn resolve_without_active_template_is_a_configuration_error() {
    let db = test_db().await;
    let resolver = PromptResolver::new(db.templates());

    let err = resolver
        .resolve(TaskType::MetadataExtraction, None, &vars(&[]))
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Configuration { .. }));
}

#[tokio::test]
async fn resolve_substitutes_every_placeholder() {
    let db = test_db().await;
    db.templates()
        .create(NewTemplate {
            task_type: TaskType::InitialReview,
            book_type: Some(BookType::Fiction),
            name: "Fiction Review".to_owned(),
            text: "{type} about {topic} in {language}".to_owned(),
            active: true,
        })
        .await
        .unwrap();

    let resolver = PromptResolver::new(db.templates());
    let resolved = resolver
        .resolve(
            TaskType::InitialReview,
            Some(BookType::Fiction),
            &vars(&[("type", "fiction"), ("topic", "T"), ("language", "English")]),
        )
        .await
        .unwrap();

    assert_eq!(resolved.text, "fiction about T in English");
    assert!(!resolved.text.contains('{'));
    assert_eq!(resolved.template_version, 1);
}

#[tokio::test]
async fn unresolved_placeholder_fails_instead_of_leaking_braces() {
    let db = test_db().await;
    db.templates()
        .create(NewTemplate {
            task_type: TaskType::InitialReview,
            book_type: Some(BookType::Fiction),
            name: "Fiction Review".to_owned(),
            text: "a {genre} story".to_owned(),
            active: true,
        })
        .await
        .unwrap();

    let resolver = PromptResolver::new(db.templates());
    let err = resolver
        .resolve(
            TaskType::InitialReview,
            Some(BookType::Fiction),
            &vars(&[("type", "fiction")]),
        )
        .await
        .unwrap_err();

    match err {
        ReviewError::Substitution { placeholder } => assert_eq!(placeholder, "genre"),
        other => panic!("expected Substitution, got {other:?}"),
    }
}

#[tokio::test]
async fn initial_review_lookup_requires_a_book_type() {
    let db = test_db().await;
    let resolver = PromptResolver::new(db.templates());

    let err = resolver
        .resolve(TaskType::InitialReview, None, &vars(&[]))
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Configuration { .. }));
}

#[tokio::test]
async fn detailed_review_falls_back_to_the_generic_template() {
    let db = test_db().await;
    db.templates()
        .create(NewTemplate {
            task_type: TaskType::DetailedReview,
            book_type: None,
            name: "Detailed Analysis".to_owned(),
            text: "deep analysis of {title}".to_owned(),
            active: true,
        })
        .await
        .unwrap();

    let resolver = PromptResolver::new(db.templates());
    let resolved = resolver
        .resolve(
            TaskType::DetailedReview,
            Some(BookType::Poetry),
            &vars(&[("title", "Tidelines")]),
        )
        .await
        .unwrap();

    assert_eq!(resolved.text, "deep analysis of Tidelines");
}

#[tokio::test]
async fn detailed_review_prefers_a_type_specific_template() {
    let db = test_db().await;
    db.templates()
        .create(NewTemplate {
            task_type: TaskType::DetailedReview,
            book_type: None,
            name: "Detailed Analysis".to_owned(),
            text: "generic".to_owned(),
            active: true,
        })
        .await
        .unwrap();
    db.templates()
        .create(NewTemplate {
            task_type: TaskType::DetailedReview,
            book_type: Some(BookType::Poetry),
            name: "Poetry Analysis".to_owned(),
            text: "poetry-specific".to_owned(),
            active: true,
        })
        .await
        .unwrap();

    let resolver = PromptResolver::new(db.templates());
    let resolved = resolver
        .resolve(TaskType::DetailedReview, Some(BookType::Poetry), &vars(&[]))
        .await
        .unwrap();

    assert_eq!(resolved.text, "poetry-specific");
}
