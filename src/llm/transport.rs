// ABOUTME: HTTP transport speaking a generic OpenAI-compatible chat-completions shape
// ABOUTME: Bounded timeout per call; expiry is abandoned locally and classified transient
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ModelTransport, RawResponse, TransportFailure};
use crate::models::LlmConfig;

/// Connection timeout, separate from the per-request budget
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// How much of an error body to keep in failure details
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

// ============================================================================
// Wire Types (OpenAI-compatible chat completions)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Transport
// ============================================================================

/// Production transport over HTTPS
///
/// Speaks the `chat/completions` shape most providers accept. The prompt is
/// sent as a single user message; the first choice's content comes back as
/// the raw body. A 2xx response whose body does not match the envelope is
/// returned verbatim - deciding whether it parses is the normalizer's job.
pub struct HttpModelTransport {
    client: Client,
}

impl HttpModelTransport {
    /// Create the transport; the per-request timeout is supplied per call
    ///
    /// # Errors
    ///
    /// Returns a transport failure if the HTTP client cannot be built.
    pub fn new() -> Result<Self, TransportFailure> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportFailure::Transient {
                detail: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Build the completions URL from the configured base
    fn completions_url(config: &LlmConfig) -> String {
        format!(
            "{}/chat/completions",
            config.endpoint_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ModelTransport for HttpModelTransport {
    async fn send(
        &self,
        config: &LlmConfig,
        prompt: &str,
        timeout: Duration,
    ) -> Result<RawResponse, TransportFailure> {
        let url = Self::completions_url(config);
        let request = ChatCompletionRequest {
            model: &config.model_code,
            messages: vec![ChatCompletionMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(
            endpoint = %url,
            model = %config.model_code,
            prompt_len = prompt.len(),
            "sending model request"
        );

        let send_future = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&config.credential)
                .json(&request)
                .send()
                .await
                .map_err(|e| classify_reqwest_error(&e))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| TransportFailure::Transient {
                    detail: format!("failed to read response body: {e}"),
                })?;

            if !status.is_success() {
                return Err(classify_status(status, &body));
            }

            Ok(extract_body(body, &config.model_code))
        };

        // The in-flight call is abandoned locally on expiry; whether the
        // remote eventually responds is irrelevant to the stage outcome.
        match tokio::time::timeout(timeout, send_future).await {
            Ok(result) => result,
            Err(_) => Err(TransportFailure::Transient {
                detail: format!("request timed out after {}s", timeout.as_secs()),
            }),
        }
    }
}

/// Pull the message content out of the completions envelope, falling back to
/// the verbatim body for providers that answer with plain text
fn extract_body(body: String, configured_model: &str) -> RawResponse {
    if let Ok(envelope) = serde_json::from_str::<ChatCompletionResponse>(&body) {
        if let Some(content) = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        {
            return RawResponse {
                body: content,
                model_code: envelope
                    .model
                    .unwrap_or_else(|| configured_model.to_owned()),
            };
        }
    }
    RawResponse {
        body,
        model_code: configured_model.to_owned(),
    }
}

/// Classify an HTTP status; credential rejections are distinct because admins
/// fix them differently, but both kinds trigger failover
fn classify_status(status: StatusCode, body: &str) -> TransportFailure {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportFailure::Auth {
            detail: format!("status {status}: {preview}"),
        },
        _ => TransportFailure::Transient {
            detail: format!("status {status}: {preview}"),
        },
    }
}

/// Classify a reqwest error (connect failures, mid-body timeouts)
fn classify_reqwest_error(error: &reqwest::Error) -> TransportFailure {
    TransportFailure::Transient {
        detail: format!("request failed: {error}"),
    }
}
