// ABOUTME: Shared test utilities - scripted transports, seeded configs, and canned model output
// ABOUTME: Keeps integration tests free of live HTTP; the transport trait is the seam
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review
#![allow(
    dead_code,
    missing_docs,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `folio_review_server`

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use folio_review_server::database::{Database, NewBook, NewLlmConfig, NewTemplate};
use folio_review_server::llm::{FailoverInvoker, ModelTransport, RawResponse, TransportFailure};
use folio_review_server::models::{Book, BookType, LlmConfig, LlmRole, TaskType};

/// One scripted transport outcome
pub type ScriptedResult = Result<RawResponse, TransportFailure>;

/// Transport that replays scripted outcomes in call order and records every
/// call it receives
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResult>>,
    calls: Mutex<Vec<(TaskType, LlmRole)>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<ScriptedResult>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Append another scripted outcome (for retry scenarios)
    pub fn push(&self, result: ScriptedResult) {
        self.responses.lock().unwrap().push_back(result);
    }

    /// Total number of provider calls made
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Roles called, in order
    pub fn roles_called(&self) -> Vec<LlmRole> {
        self.calls.lock().unwrap().iter().map(|(_, r)| *r).collect()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn send(
        &self,
        config: &LlmConfig,
        _prompt: &str,
        _timeout: Duration,
    ) -> ScriptedResult {
        self.calls
            .lock()
            .unwrap()
            .push((config.task_type, config.role));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportFailure::Transient {
                    detail: "transport script exhausted".to_owned(),
                })
            })
    }
}

pub fn ok_response(body: &str) -> ScriptedResult {
    Ok(RawResponse {
        body: body.to_owned(),
        model_code: "test-model".to_owned(),
    })
}

pub fn transient_failure(detail: &str) -> ScriptedResult {
    Err(TransportFailure::Transient {
        detail: detail.to_owned(),
    })
}

pub fn auth_failure(detail: &str) -> ScriptedResult {
    Err(TransportFailure::Auth {
        detail: detail.to_owned(),
    })
}

/// Standard invocation timeout for tests; the scripted transport never waits
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Fresh in-memory database
pub async fn test_db() -> Database {
    Database::in_memory().await.unwrap()
}

/// Invoker over a scripted transport
pub fn scripted_invoker(
    db: &Database,
    transport: std::sync::Arc<ScriptedTransport>,
) -> FailoverInvoker {
    FailoverInvoker::new(db.llm_configs(), transport)
}

/// Seed an active primary and backup config for every task type
pub async fn seed_configs(db: &Database) {
    for task_type in [
        TaskType::MetadataExtraction,
        TaskType::InitialReview,
        TaskType::DetailedReview,
    ] {
        for (role, model) in [
            (LlmRole::Primary, "primary-model"),
            (LlmRole::Backup, "backup-model"),
        ] {
            db.llm_configs()
                .create(NewLlmConfig {
                    task_type,
                    role,
                    public_name: format!("{task_type} {role}"),
                    endpoint_url: "https://llm.example.com/v1".to_owned(),
                    model_code: model.to_owned(),
                    credential: "sk-test-0123456789".to_owned(),
                    active: true,
                })
                .await
                .unwrap();
        }
    }
}

/// Seed the minimal template set the pipeline tests need
pub async fn seed_pipeline_templates(db: &Database) {
    db.templates()
        .create(NewTemplate {
            task_type: TaskType::MetadataExtraction,
            book_type: None,
            name: "Metadata Extraction".to_owned(),
            text: "Extract metadata for {title}:\n{excerpt}".to_owned(),
            active: true,
        })
        .await
        .unwrap();

    db.templates()
        .create(NewTemplate {
            task_type: TaskType::InitialReview,
            book_type: Some(BookType::Fiction),
            name: "Fiction Review".to_owned(),
            text: "Review this {type} about {topic} in {language}:\n{excerpt}".to_owned(),
            active: true,
        })
        .await
        .unwrap();

    db.templates()
        .create(NewTemplate {
            task_type: TaskType::DetailedReview,
            book_type: None,
            name: "Detailed Analysis".to_owned(),
            text: "Analyze this {type} titled {title} in depth:\n{excerpt}".to_owned(),
            active: true,
        })
        .await
        .unwrap();
}

/// Create a Draft book; `book_type` is left to the metadata stage when None
pub async fn create_book(db: &Database, book_type: Option<BookType>) -> Book {
    db.reviews()
        .create_book(NewBook {
            title: "The Hollow Coast".to_owned(),
            book_type,
            language: Some("English".to_owned()),
            topic: Some("a lighthouse keeper's secret".to_owned()),
            manuscript_text:
                "The lamp had burned for forty years before Anse let it go out. \
                 What washed ashore that night was not wreckage."
                    .to_owned(),
        })
        .await
        .unwrap()
}

/// Canned metadata-extraction output, wrapped in model commentary
pub const METADATA_RESPONSE: &str = r#"Here is the extracted metadata you asked for:
{"author": "M. Verne", "co_authors": [], "booktype": "fiction",
 "language": "English", "ISBN": "Not specified", "Publisher": "Not specified",
 "word_count": 52000, "topic": "a lighthouse keeper's secret",
 "characters": ["Anse", "Mireille"], "locations": ["Brittany"]}
I hope this helps!"#;

/// Canned review output
pub const REVIEW_RESPONSE: &str = r#"{
  "ai_quality_score": 87,
  "language_style_score": 84,
  "plot_structure_score": 82,
  "character_development_score": 88,
  "originality_score": 90,
  "promotional_blurb": "A lighthouse keeper's forty-year vigil ends the night the sea gives something back.",
  "single_line_summary": "A coastal mystery about the cost of keeping other people's secrets.",
  "detailed_summary": "Anse has tended the lamp at Pointe Creuse for four decades, long enough to know which wrecks were accidents.",
  "review_summary": "Atmospheric, controlled, and quietly devastating.",
  "full_review": "The prose is spare and confident. Pacing sags briefly in the middle third.",
  "service_needs": [{"category": "Copy Editing", "suggestion": "Minor grammatical refinements could enhance readability"}],
  "plagiarism": {"score": 96, "matches": []}
}"#;
