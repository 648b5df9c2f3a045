// ABOUTME: Unified error taxonomy for the review orchestration engine
// ABOUTME: Tagged variants so callers branch on explicit kinds instead of probing messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Review Engine Error Taxonomy
//!
//! Every failure the engine can produce is a [`ReviewError`] variant with an
//! explicit kind. The split that matters operationally:
//!
//! - `Configuration` / `MissingPrerequisite` / `InvalidTransition` /
//!   `Substitution` surface immediately; no retry is attempted.
//! - `Auth` / `Transient` / `Parse` are absorbed once by the failover hop;
//!   only when the backup also fails does a stage fail, and the reported
//!   cause is the backup's error.
//!
//! A suspect score is not an error: it is a non-fatal flag carried on the
//! normalized fragment.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{LlmRole, ReviewStage};

/// Result type alias for convenience
pub type ReviewResult<T> = Result<T, ReviewError>;

/// Unified error type for the review engine
#[derive(Debug, Error)]
pub enum ReviewError {
    /// No active LLM config or prompt template for the requested task;
    /// terminal until an admin fixes the configuration
    #[error("configuration missing: {detail}")]
    Configuration {
        /// What was missing (task type, role, template lookup)
        detail: String,
    },

    /// A template placeholder had no value in the variables map; the prompt
    /// is never forwarded to a model with literal braces in it
    #[error("unresolved template placeholder '{{{placeholder}}}'")]
    Substitution {
        /// The placeholder key that could not be resolved
        placeholder: String,
    },

    /// Provider rejected the configured credential
    #[error("{role} endpoint rejected credentials: {detail}")]
    Auth {
        /// Which configured role produced the failure
        role: LlmRole,
        /// Provider-reported detail
        detail: String,
    },

    /// Timeout, connection failure, or non-2xx provider response
    #[error("{role} endpoint unreachable: {detail}")]
    Transient {
        /// Which configured role produced the failure
        role: LlmRole,
        /// Failure detail (status code, timeout, connect error)
        detail: String,
    },

    /// No well-formed JSON object could be located in the model output
    #[error("unparsable model output: {detail}")]
    Parse {
        /// Why extraction failed
        detail: String,
        /// The raw body, retained for diagnostics
        raw: String,
    },

    /// Stage-ordering violation; the review record is left untouched
    #[error("stage '{stage}' requires '{required}' to complete first")]
    MissingPrerequisite {
        /// The stage that was requested
        stage: ReviewStage,
        /// The stage that must complete before it
        required: ReviewStage,
    },

    /// The requested operation is not valid from the current state
    #[error("invalid transition: {detail}")]
    InvalidTransition {
        /// What was attempted and why it is invalid
        detail: String,
    },

    /// A request carried invalid or missing input
    #[error("invalid input: {detail}")]
    InvalidInput {
        /// What was wrong with the input
        detail: String,
    },

    /// Optimistic template edit collided with a concurrent change
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the caller expected
        expected: i64,
        /// Version currently stored
        actual: i64,
    },

    /// The requested resource does not exist
    #[error("{resource} not found")]
    NotFound {
        /// Resource description (entity and id)
        resource: String,
    },

    /// Database operation failed
    #[error("database error: {detail}")]
    Database {
        /// Underlying failure detail
        detail: String,
    },

    /// Unexpected internal failure
    #[error("internal error: {detail}")]
    Internal {
        /// Failure detail
        detail: String,
    },
}

impl ReviewError {
    /// Configuration missing
    #[must_use]
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration {
            detail: detail.into(),
        }
    }

    /// Unresolved placeholder
    #[must_use]
    pub fn substitution(placeholder: impl Into<String>) -> Self {
        Self::Substitution {
            placeholder: placeholder.into(),
        }
    }

    /// Credential rejected by a provider
    #[must_use]
    pub fn auth(role: LlmRole, detail: impl Into<String>) -> Self {
        Self::Auth {
            role,
            detail: detail.into(),
        }
    }

    /// Timeout / network / non-2xx provider failure
    #[must_use]
    pub fn transient(role: LlmRole, detail: impl Into<String>) -> Self {
        Self::Transient {
            role,
            detail: detail.into(),
        }
    }

    /// No JSON object in model output
    #[must_use]
    pub fn parse(detail: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            detail: detail.into(),
            raw: raw.into(),
        }
    }

    /// Invalid state-machine transition
    #[must_use]
    pub fn invalid_transition(detail: impl Into<String>) -> Self {
        Self::InvalidTransition {
            detail: detail.into(),
        }
    }

    /// Invalid request input
    #[must_use]
    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            detail: detail.into(),
        }
    }

    /// Resource not found
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Database failure
    #[must_use]
    pub fn database(detail: impl Into<String>) -> Self {
        Self::Database {
            detail: detail.into(),
        }
    }

    /// Internal failure
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Stable wire code for this error kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Substitution { .. } => "SUBSTITUTION_ERROR",
            Self::Auth { .. } => "AUTH_ERROR",
            Self::Transient { .. } => "TRANSIENT_ERROR",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::MissingPrerequisite { .. } => "MISSING_PREREQUISITE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether this failure lets the invoker fail over to the backup endpoint
    #[must_use]
    pub const fn is_failover_trigger(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::Transient { .. } | Self::Parse { .. }
        )
    }

    /// HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } | Self::VersionConflict { .. } => StatusCode::CONFLICT,
            Self::MissingPrerequisite { .. } | Self::Substitution { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Configuration { .. } => StatusCode::FAILED_DEPENDENCY,
            Self::Auth { .. } | Self::Transient { .. } | Self::Parse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Error payload inside the envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable wire code (see [`ReviewError::kind`])
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl From<&ReviewError> for ErrorResponse {
    fn from(error: &ReviewError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.kind().to_owned(),
                message: error.to_string(),
            },
        }
    }
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = ErrorResponse::from(&self);
        (status, Json(body)).into_response()
    }
}
