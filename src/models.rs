// ABOUTME: Domain model types for books, AI reviews, LLM configs, and prompt templates
// ABOUTME: Enum string forms match the stored database values and the admin API wire format
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Domain Model
//!
//! Types shared by the config store, the invoker, the normalizer, and the
//! pipeline. Every enum carries `as_str` / `parse_str` for its stored string
//! form so the database layer and the HTTP layer agree on one spelling.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Task / Role / Stage Enums
// ============================================================================

/// Review task routed to an independently configured model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// First pass: extract manuscript metadata
    MetadataExtraction,
    /// Free review included with every submission
    InitialReview,
    /// Paid in-depth analysis
    DetailedReview,
}

impl TaskType {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MetadataExtraction => "metadata_extraction",
            Self::InitialReview => "initial_review",
            Self::DetailedReview => "detailed_review",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "metadata_extraction" => Some(Self::MetadataExtraction),
            "initial_review" => Some(Self::InitialReview),
            "detailed_review" => Some(Self::DetailedReview),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which configured endpoint served (or should serve) a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    /// First choice endpoint for a task
    Primary,
    /// Used only after the primary fails
    Backup,
}

impl LlmRole {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Backup => "backup",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "backup" => Some(Self::Backup),
            _ => None,
        }
    }
}

impl fmt::Display for LlmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manuscript classification; initial-review templates are selected per type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookType {
    /// Fiction
    Fiction,
    /// Non-fiction
    #[serde(rename = "non-fiction")]
    NonFiction,
    /// Poetry
    Poetry,
    /// Screenplay
    Screenplay,
    /// Essay
    Essay,
    /// Blog
    Blog,
    /// Scientific
    Scientific,
}

impl BookType {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fiction => "fiction",
            Self::NonFiction => "non-fiction",
            Self::Poetry => "poetry",
            Self::Screenplay => "screenplay",
            Self::Essay => "essay",
            Self::Blog => "blog",
            Self::Scientific => "scientific",
        }
    }

    /// Parse from a stored or model-produced string (models are inconsistent
    /// about hyphenation, so the underscore and collapsed spellings are
    /// accepted too)
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fiction" => Some(Self::Fiction),
            "non-fiction" | "non_fiction" | "nonfiction" => Some(Self::NonFiction),
            "poetry" => Some(Self::Poetry),
            "screenplay" => Some(Self::Screenplay),
            "essay" => Some(Self::Essay),
            "blog" => Some(Self::Blog),
            "scientific" => Some(Self::Scientific),
            _ => None,
        }
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered phase of a book's review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    /// Metadata extraction, always first
    Metadata,
    /// Initial review, requires metadata
    InitialReview,
    /// Detailed (paid) review, requires the initial review
    DetailedReview,
}

impl ReviewStage {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::InitialReview => "initial_review",
            Self::DetailedReview => "detailed_review",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "metadata" => Some(Self::Metadata),
            "initial_review" => Some(Self::InitialReview),
            "detailed_review" => Some(Self::DetailedReview),
            _ => None,
        }
    }

    /// The task type this stage is routed to
    #[must_use]
    pub const fn task_type(self) -> TaskType {
        match self {
            Self::Metadata => TaskType::MetadataExtraction,
            Self::InitialReview => TaskType::InitialReview,
            Self::DetailedReview => TaskType::DetailedReview,
        }
    }

    /// The stage that must complete before this one may run
    #[must_use]
    pub const fn prerequisite(self) -> Option<Self> {
        match self {
            Self::Metadata => None,
            Self::InitialReview => Some(Self::Metadata),
            Self::DetailedReview => Some(Self::InitialReview),
        }
    }
}

impl fmt::Display for ReviewStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Status Enums
// ============================================================================

/// Lifecycle status of a book
///
/// `Published` / `Unpublished` are owned by the publishing flow; the engine
/// persists them but never sets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookStatus {
    /// Created by upload, not yet submitted
    Draft,
    /// Submitted, review row created, no stage started
    SubmittedForAIReview,
    /// At least one stage has started
    AIReviewInProgress,
    /// Final requested stage completed
    AIReviewCompleted,
    /// A stage failed; retry is available
    Failed,
    /// Live on the public catalog (publishing flow)
    Published,
    /// Withdrawn from the public catalog (publishing flow)
    Unpublished,
}

impl BookStatus {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::SubmittedForAIReview => "SubmittedForAIReview",
            Self::AIReviewInProgress => "AIReviewInProgress",
            Self::AIReviewCompleted => "AIReviewCompleted",
            Self::Failed => "Failed",
            Self::Published => "Published",
            Self::Unpublished => "Unpublished",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "Draft" => Some(Self::Draft),
            "SubmittedForAIReview" => Some(Self::SubmittedForAIReview),
            "AIReviewInProgress" => Some(Self::AIReviewInProgress),
            "AIReviewCompleted" => Some(Self::AIReviewCompleted),
            "Failed" => Some(Self::Failed),
            "Published" => Some(Self::Published),
            "Unpublished" => Some(Self::Unpublished),
            _ => None,
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a book's AI review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    /// Submitted, no stage running
    Pending,
    /// A stage is running
    Processing,
    /// Final requested stage merged successfully
    Completed,
    /// A stage exhausted its failover; retry available
    Failed,
}

impl ProcessingStatus {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Processing" => Some(Self::Processing),
            "Completed" => Some(Self::Completed),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Config Store Entities
// ============================================================================

/// An admin-configured LLM endpoint for one task type and role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Unique ID
    pub id: Uuid,
    /// Task this endpoint serves
    pub task_type: TaskType,
    /// Primary or backup slot
    pub role: LlmRole,
    /// Human-readable name shown in the admin console
    pub public_name: String,
    /// Provider API base URL
    pub endpoint_url: String,
    /// Provider model identifier
    pub model_code: String,
    /// API key; never returned unmasked by the admin API
    pub credential: String,
    /// Whether this row is the active config for its (task, role) pair
    pub active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl LlmConfig {
    /// Credential masked for display: first 8 characters, then `*`
    #[must_use]
    pub fn masked_credential(&self) -> String {
        let visible: String = self.credential.chars().take(8).collect();
        let hidden = self.credential.chars().count().saturating_sub(8);
        format!("{}{}", visible, "*".repeat(hidden))
    }
}

/// A versioned, parameterized prompt template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Unique ID
    pub id: Uuid,
    /// Task this template is used for
    pub task_type: TaskType,
    /// Book type selector; required for initial-review templates
    pub book_type: Option<BookType>,
    /// Display name
    pub name: String,
    /// Template text with `{variable}` placeholders
    pub text: String,
    /// Monotonically increasing edit version
    pub version: i64,
    /// Whether this is the active template for its (task, book type) pair
    pub active: bool,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Book
// ============================================================================

/// Manuscript metadata extracted by the first pipeline stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManuscriptMetadata {
    /// Primary author, if the manuscript names one
    pub author: Option<String>,
    /// Co-authors
    #[serde(default)]
    pub co_authors: Vec<String>,
    /// Detected classification
    pub book_type: Option<BookType>,
    /// Primary language of the text
    pub language: Option<String>,
    /// ISBN, if present in the manuscript
    pub isbn: Option<String>,
    /// Publisher, if mentioned
    pub publisher: Option<String>,
    /// Model-reported word count
    pub word_count: Option<i64>,
    /// Main topic in a few words
    pub topic: Option<String>,
    /// Main characters (fiction), most important first
    #[serde(default)]
    pub characters: Vec<String>,
    /// Main geographical locations
    #[serde(default)]
    pub locations: Vec<String>,
}

/// A book and its manuscript, as handed over by the upload flow
#[derive(Debug, Clone, Serialize)]
pub struct Book {
    /// Unique ID
    pub id: Uuid,
    /// Title given at upload
    pub title: String,
    /// Lifecycle status; mutated only by the pipeline (and the external
    /// publishing flow for Published/Unpublished)
    pub status: BookStatus,
    /// Classification; set at upload or by the metadata stage
    pub book_type: Option<BookType>,
    /// Language; set at upload or by the metadata stage
    pub language: Option<String>,
    /// Topic; set at upload or by the metadata stage
    pub topic: Option<String>,
    /// Extracted manuscript text; read only to build prompt excerpts
    #[serde(skip_serializing)]
    pub manuscript_text: String,
    /// Word count computed at upload
    pub word_count: i64,
    /// Result of the metadata stage
    pub extracted_metadata: Option<ManuscriptMetadata>,
    /// When the book was submitted for review
    pub submitted_for_ai_review_at: Option<DateTime<Utc>>,
    /// When the review completed
    pub ai_review_completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// AI Review
// ============================================================================

/// Component and overall quality scores, 0..=100
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewScores {
    /// Overall AI quality score
    pub overall: Option<i64>,
    /// Language and style
    pub language_style: Option<i64>,
    /// Plot and structure
    pub plot_structure: Option<i64>,
    /// Character development
    pub character_development: Option<i64>,
    /// Originality
    pub originality: Option<i64>,
}

/// Generated summary texts at the granularities the catalog displays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummaries {
    /// Marketing blurb (25 words or fewer)
    pub promotional_blurb: Option<String>,
    /// One-line summary
    pub single_line_summary: Option<String>,
    /// Multi-paragraph summary
    pub detailed_summary: Option<String>,
    /// Summary of the review itself
    pub review_summary: Option<String>,
    /// Full review content
    pub full_review: Option<String>,
}

/// A professional service the review suggests the author consider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNeed {
    /// Service category (e.g. "Copy Editing")
    pub category: String,
    /// Why the review suggests it
    pub suggestion: String,
}

/// A single plagiarism match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismMatch {
    /// Matched source
    pub source: String,
    /// Similarity in percent
    pub similarity: f64,
}

/// Plagiarism analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismDetails {
    /// Originality score, 0..=100 (higher is less suspicious)
    pub score: i64,
    /// Specific matches; empty when none were reported
    #[serde(default)]
    pub matches: Vec<PlagiarismMatch>,
}

/// Normalized output of one model invocation, merged into the review
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewFragment {
    /// Metadata (metadata-extraction task only)
    pub metadata: Option<ManuscriptMetadata>,
    /// Scores (review tasks)
    pub scores: Option<ReviewScores>,
    /// Summaries (review tasks)
    pub summaries: Option<ReviewSummaries>,
    /// Suggested services
    #[serde(default)]
    pub service_needs: Vec<ServiceNeed>,
    /// Plagiarism analysis
    pub plagiarism: Option<PlagiarismDetails>,
    /// Set when an out-of-range score was clamped; never blocks completion
    pub suspect_score: bool,
}

/// The persisted, per-book record of analysis results and pipeline status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiReview {
    /// Unique ID
    pub id: Uuid,
    /// The reviewed book (one review row per book)
    pub book_id: Uuid,
    /// Pipeline status, owned exclusively by the coordinator
    pub processing_status: ProcessingStatus,
    /// Stage currently or last running
    pub current_stage: Option<ReviewStage>,
    /// Stage that failed; retry re-enters here
    pub failed_stage: Option<ReviewStage>,
    /// Which role served the last successful invocation
    pub served_by_role: Option<LlmRole>,
    /// Model code that served the last successful invocation
    pub model_used: Option<String>,
    /// Quality scores
    pub scores: Option<ReviewScores>,
    /// Generated summaries
    pub summaries: Option<ReviewSummaries>,
    /// Suggested services
    pub service_needs: Vec<ServiceNeed>,
    /// Plagiarism analysis
    pub plagiarism: Option<PlagiarismDetails>,
    /// At least one stage reported an out-of-range score
    pub suspect_score: bool,
    /// The author's public response; the only field mutable after completion
    pub author_response: Option<String>,
    /// Failure detail for the author and the admin console
    pub error_message: Option<String>,
    /// Metadata stage completion
    pub metadata_completed_at: Option<DateTime<Utc>>,
    /// Initial review stage completion
    pub initial_review_completed_at: Option<DateTime<Utc>>,
    /// Detailed review stage completion
    pub detailed_review_completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl AiReview {
    /// Whether the given stage has completed successfully
    #[must_use]
    pub const fn stage_completed(&self, stage: ReviewStage) -> bool {
        match stage {
            ReviewStage::Metadata => self.metadata_completed_at.is_some(),
            ReviewStage::InitialReview => self.initial_review_completed_at.is_some(),
            ReviewStage::DetailedReview => self.detailed_review_completed_at.is_some(),
        }
    }
}
