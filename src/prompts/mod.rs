// ABOUTME: Prompt resolution - active template lookup plus strict variable substitution
// ABOUTME: Any unresolved placeholder aborts; braces never reach a paid model call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Prompt Resolver
//!
//! Selects the active template for a task and substitutes manuscript-derived
//! variables. A `{key}` token is `{` followed by `[A-Za-z0-9_]+` and `}`;
//! anything else (JSON braces in template bodies, stray `{`) is copied
//! verbatim. A token whose key is missing from the variables map is a
//! contract violation and resolution fails with `Substitution` - the
//! pipeline never forwards a template with literal placeholders to a model.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::database::TemplateStore;
use crate::errors::{ReviewError, ReviewResult};
use crate::models::{BookType, TaskType};

/// A fully substituted prompt, with template provenance for audit
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPrompt {
    /// The prompt text, free of `{key}` tokens
    pub text: String,
    /// Template the text came from
    pub template_id: Uuid,
    /// Template version at resolution time
    pub template_version: i64,
}

/// Resolves prompts from the template store
pub struct PromptResolver {
    templates: TemplateStore,
}

impl PromptResolver {
    /// Create a resolver over the template store
    #[must_use]
    pub const fn new(templates: TemplateStore) -> Self {
        Self { templates }
    }

    /// Resolve the active template for a task and substitute variables
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no active template matches and
    /// `Substitution` when the template references a key the variables map
    /// does not provide.
    pub async fn resolve(
        &self,
        task_type: TaskType,
        book_type: Option<BookType>,
        variables: &HashMap<String, String>,
    ) -> ReviewResult<ResolvedPrompt> {
        let template = self.templates.get_active(task_type, book_type).await?;
        let text = substitute(&template.text, variables)?;
        Ok(ResolvedPrompt {
            text,
            template_id: template.id,
            template_version: template.version,
        })
    }
}

/// Substitute every `{key}` token from the variables map
///
/// # Errors
///
/// Returns `Substitution` naming the first key with no value.
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> ReviewResult<String> {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some((key, end)) = placeholder_at(bytes, i) {
                match variables.get(key) {
                    Some(value) => out.push_str(value),
                    None => return Err(ReviewError::substitution(key)),
                }
                i = end;
                continue;
            }
        }
        // copy the full UTF-8 character starting here
        let ch_len = utf8_len(bytes[i]);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }

    Ok(out)
}

/// If a `{key}` token starts at `start`, return the key and the index just
/// past the closing brace
fn placeholder_at(bytes: &[u8], start: usize) -> Option<(&str, usize)> {
    let mut i = start + 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i > start + 1 && i < bytes.len() && bytes[i] == b'}' {
        // the key range is pure ASCII, safe to slice
        #[allow(clippy::unwrap_used)]
        let key = std::str::from_utf8(&bytes[start + 1..i]).unwrap();
        Some((key, i + 1))
    } else {
        None
    }
}

/// Byte length of the UTF-8 character starting with this byte
const fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b < 0xE0 => 2,
        b if b < 0xF0 => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic, clippy::single_match_else, clippy::wildcard_imports)]

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn substitutes_every_occurrence() {
        let out = substitute(
            "{type} about {topic} in {language}, again: {type}",
            &vars(&[("type", "fiction"), ("topic", "T"), ("language", "English")]),
        )
        .unwrap();
        assert_eq!(out, "fiction about T in English, again: fiction");
        assert!(!out.contains('{'));
    }

    #[test]
    fn missing_variable_fails_hard() {
        let err = substitute("a {genre} story", &vars(&[("type", "fiction")])).unwrap_err();
        match err {
            ReviewError::Substitution { placeholder } => assert_eq!(placeholder, "genre"),
            other => panic!("expected Substitution, got {other:?}"),
        }
    }

    #[test]
    fn json_braces_survive() {
        let template = "Respond with JSON:\n{\n  \"score\": 1\n}\nfor {title}";
        let out = substitute(template, &vars(&[("title", "Dune")])).unwrap();
        assert!(out.contains("{\n  \"score\": 1\n}"));
        assert!(out.contains("for Dune"));
    }

    #[test]
    fn unterminated_brace_is_literal() {
        let out = substitute("open { brace", &vars(&[])).unwrap();
        assert_eq!(out, "open { brace");
    }

    #[test]
    fn multibyte_text_is_preserved() {
        let out = substitute("Résumé of {title} — ✓", &vars(&[("title", "Ulysse")])).unwrap();
        assert_eq!(out, "Résumé of Ulysse — ✓");
    }
}
