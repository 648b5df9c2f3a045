// ABOUTME: LLM invocation layer - transport seam, raw responses, and the failover invoker
// ABOUTME: The exact provider wire format stays behind the ModelTransport trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Model Registry & Failover Invoker
//!
//! Resolves the configured primary/backup endpoints for a task type and
//! performs the actual call with a single failover hop: any credential
//! rejection, timeout, connection failure, or non-2xx response on the
//! primary triggers exactly one retry against the backup with the same
//! timeout budget. There are no further retries and no cascading beyond two
//! tiers - the backup is used when the primary cannot be reached, nothing
//! more.
//!
//! Every invocation records which role actually served the request, for
//! audit and for the admin Test Connection action.

mod invoker;
mod transport;

pub use invoker::{ConnectionReport, FailoverInvoker, Invocation};
pub use transport::HttpModelTransport;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ReviewError;
use crate::models::{LlmConfig, LlmRole};

/// Raw provider output; parsing is the normalizer's job, not the invoker's
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Response body text
    pub body: String,
    /// Model that produced it, as reported by the provider (falls back to
    /// the configured model code)
    pub model_code: String,
}

/// Classified transport failure; both kinds trigger the failover hop
#[derive(Debug, Clone)]
pub enum TransportFailure {
    /// Provider rejected the configured credential (HTTP 401/403)
    Auth {
        /// Provider-reported detail
        detail: String,
    },
    /// Timeout, connection failure, or any other non-2xx response
    Transient {
        /// Failure detail
        detail: String,
    },
}

impl TransportFailure {
    /// Attach the serving role to produce the engine error
    #[must_use]
    pub fn into_review_error(self, role: LlmRole) -> ReviewError {
        match self {
            Self::Auth { detail } => ReviewError::auth(role, detail),
            Self::Transient { detail } => ReviewError::transient(role, detail),
        }
    }
}

/// Transport seam between the invoker and a provider endpoint
///
/// Implementations send one prompt to one configured endpoint within the
/// given timeout. Tests script this trait; production uses
/// [`HttpModelTransport`].
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Send a prompt to the endpoint and return the raw response body
    async fn send(
        &self,
        config: &LlmConfig,
        prompt: &str,
        timeout: Duration,
    ) -> Result<RawResponse, TransportFailure>;
}
