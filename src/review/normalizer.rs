// ABOUTME: Normalizes raw model output into a typed review fragment
// ABOUTME: Extracts the first JSON object from prose, clamps scores, defaults missing fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Result Normalizer
//!
//! Models frequently wrap their JSON in commentary, so extraction scans for
//! the first well-formed JSON object anywhere in the body. Missing optional
//! fields default to none/empty rather than failing; an out-of-range score
//! is clamped to [0,100] and flags the fragment as suspect without aborting.
//! Only the total absence of a JSON object is a `Parse` error - which the
//! coordinator treats exactly like an unreachable endpoint for failover
//! purposes.

use serde_json::Value;

use crate::errors::{ReviewError, ReviewResult};
use crate::models::{
    BookType, ManuscriptMetadata, PlagiarismDetails, PlagiarismMatch, ReviewFragment,
    ReviewScores, ReviewSummaries, ServiceNeed, TaskType,
};

/// How much raw body to keep on a parse failure
const RAW_PREVIEW_CHARS: usize = 500;

/// Normalize one model response for the given task
///
/// # Errors
///
/// Returns `Parse` when no well-formed JSON object can be located.
pub fn normalize(raw_body: &str, task_type: TaskType) -> ReviewResult<ReviewFragment> {
    let value = extract_first_json_object(raw_body).ok_or_else(|| {
        ReviewError::parse(
            "no JSON object found in model output",
            raw_body.chars().take(RAW_PREVIEW_CHARS).collect::<String>(),
        )
    })?;

    match task_type {
        TaskType::MetadataExtraction => Ok(ReviewFragment {
            metadata: Some(metadata_fragment(&value)),
            ..ReviewFragment::default()
        }),
        TaskType::InitialReview | TaskType::DetailedReview => Ok(review_fragment(&value)),
    }
}

/// Locate and parse the first well-formed JSON object in free text
///
/// Walks a string-aware brace matcher from each `{`; candidates that fail to
/// parse are skipped and the scan continues.
fn extract_first_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut start = 0;

    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(end) = matching_brace(bytes, open) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[open..=end]) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
        start = open + 1;
    }

    None
}

/// Index of the brace closing the object that opens at `open`
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

// ============================================================================
// Field Extraction
// ============================================================================

/// First present key, as a non-empty trimmed string
fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(s) = v.as_str() {
                let trimmed = s.trim();
                if !trimmed.is_empty() && trimmed != "Not specified" {
                    return Some(trimmed.to_owned());
                }
            }
        }
    }
    None
}

/// First present key, as a list of strings
fn string_list_field(value: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        if let Some(Value::Array(items)) = value.get(*key) {
            return items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
    }
    Vec::new()
}

/// First present key, as an integer; numeric strings are accepted
fn int_field(value: &Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(n) = as_number(v) {
                return Some(n.round() as i64);
            }
        }
    }
    None
}

/// First present key as a score clamped to [0,100]; clamping flags suspicion
fn score_field(value: &Value, keys: &[&str], suspect: &mut bool) -> Option<i64> {
    int_field(value, keys).map(|n| clamp_score(n, suspect))
}

fn clamp_score(n: i64, suspect: &mut bool) -> i64 {
    if (0..=100).contains(&n) {
        n
    } else {
        *suspect = true;
        n.clamp(0, 100)
    }
}

/// Accept JSON numbers and numeric strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Metadata fragment from the metadata-extraction response
///
/// The extraction prompt's key casing has drifted over template versions, so
/// both spellings are accepted for the affected keys.
fn metadata_fragment(value: &Value) -> ManuscriptMetadata {
    ManuscriptMetadata {
        author: string_field(value, &["author", "Author"]),
        co_authors: string_list_field(value, &["co_authors", "co-authors"]),
        book_type: string_field(value, &["booktype", "book_type", "type"])
            .and_then(|s| BookType::parse_str(&s)),
        language: string_field(value, &["language", "Language"]),
        isbn: string_field(value, &["ISBN", "isbn"]),
        publisher: string_field(value, &["Publisher", "publisher"]),
        word_count: int_field(value, &["Wordcount", "word_count", "wordcount"]),
        topic: string_field(value, &["Topic", "topic"]),
        characters: string_list_field(value, &["Characters", "characters"]),
        locations: string_list_field(value, &["Location", "locations", "location"]),
    }
}

/// Review fragment from an initial- or detailed-review response
fn review_fragment(value: &Value) -> ReviewFragment {
    let mut suspect = false;

    let scores = ReviewScores {
        overall: score_field(
            value,
            &["ai_quality_score", "overall_score", "overall"],
            &mut suspect,
        ),
        language_style: score_field(
            value,
            &["language_style_score", "language_style"],
            &mut suspect,
        ),
        plot_structure: score_field(
            value,
            &["plot_structure_score", "plot_structure"],
            &mut suspect,
        ),
        character_development: score_field(
            value,
            &["character_development_score", "character_development"],
            &mut suspect,
        ),
        originality: score_field(value, &["originality_score", "originality"], &mut suspect),
    };

    let summaries = ReviewSummaries {
        promotional_blurb: string_field(value, &["promotional_blurb", "blurb"]),
        single_line_summary: string_field(value, &["single_line_summary"]),
        detailed_summary: string_field(value, &["detailed_summary"]),
        review_summary: string_field(value, &["review_summary"]),
        full_review: string_field(value, &["full_review", "detailed_feedback"]),
    };

    let service_needs = service_needs(value);
    let plagiarism = plagiarism(value, &mut suspect);

    let has_scores = scores != ReviewScores::default();
    let has_summaries = summaries != ReviewSummaries::default();

    ReviewFragment {
        metadata: None,
        scores: has_scores.then_some(scores),
        summaries: has_summaries.then_some(summaries),
        service_needs,
        plagiarism,
        suspect_score: suspect,
    }
}

fn service_needs(value: &Value) -> Vec<ServiceNeed> {
    let Some(Value::Array(items)) = value.get("service_needs") else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let category = string_field(item, &["category"])?;
            let suggestion = string_field(item, &["suggestion"]).unwrap_or_default();
            Some(ServiceNeed {
                category,
                suggestion,
            })
        })
        .collect()
}

fn plagiarism(value: &Value, suspect: &mut bool) -> Option<PlagiarismDetails> {
    let details = value.get("plagiarism").or_else(|| value.get("plagiarism_details"))?;
    let score = score_field(details, &["score", "plagiarism_score"], suspect)?;

    let matches = match details.get("matches") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let source = string_field(item, &["source"])?;
                let similarity = item.get("similarity").and_then(as_number).unwrap_or(0.0);
                Some(PlagiarismMatch { source, similarity })
            })
            .collect(),
        _ => Vec::new(),
    };

    Some(PlagiarismDetails { score, matches })
}
