// ABOUTME: Failover invoker - primary call with exactly one backup hop per invocation
// ABOUTME: Records which role served each request for audit and Test Connection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use super::{ModelTransport, RawResponse};
use crate::database::LlmConfigStore;
use crate::errors::ReviewResult;
use crate::models::{LlmConfig, LlmRole, TaskType};

/// Canned prompt for the admin Test Connection action
const TEST_PROMPT: &str = "Reply with the single word: ok";

/// A successful invocation and its audit record
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Raw response body for the normalizer
    pub raw_body: String,
    /// Which configured role actually served the request
    pub served_by: LlmRole,
    /// Model that served it
    pub model_code: String,
    /// Wall-clock call duration
    pub latency: Duration,
}

/// Result of the admin Test Connection action
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    /// Whether the endpoint answered successfully
    pub ok: bool,
    /// Task type tested
    pub task_type: TaskType,
    /// Role tested
    pub role: LlmRole,
    /// Model that answered, on success
    pub model_code: Option<String>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
    /// Failure detail, on failure
    pub error: Option<String>,
}

/// Resolves endpoints per task type and performs calls with failover
#[derive(Clone)]
pub struct FailoverInvoker {
    configs: LlmConfigStore,
    transport: Arc<dyn ModelTransport>,
}

impl FailoverInvoker {
    /// Create an invoker over the config store and a transport
    #[must_use]
    pub fn new(configs: LlmConfigStore, transport: Arc<dyn ModelTransport>) -> Self {
        Self { configs, transport }
    }

    /// Invoke the active primary endpoint for a task, failing over to the
    /// backup exactly once on any auth or transient failure
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no active config exists for a required
    /// role, or the BACKUP's error when both endpoints fail - the primary's
    /// error is retained only in the logs.
    pub async fn invoke(
        &self,
        task_type: TaskType,
        prompt: &str,
        timeout: Duration,
    ) -> ReviewResult<Invocation> {
        let primary = self.configs.get_active(task_type, LlmRole::Primary).await?;

        match self.call(&primary, LlmRole::Primary, prompt, timeout).await {
            Ok(invocation) => Ok(invocation),
            Err(primary_error) if primary_error.is_failover_trigger() => {
                warn!(
                    task_type = %task_type,
                    error = %primary_error,
                    "primary endpoint failed, failing over to backup"
                );
                let backup = self.configs.get_active(task_type, LlmRole::Backup).await?;
                self.call(&backup, LlmRole::Backup, prompt, timeout).await
            }
            Err(other) => Err(other),
        }
    }

    /// Invoke one specific role with no failover
    ///
    /// Used by the coordinator's parse-failure hop and by Test Connection.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no active config exists for the role, or
    /// the call's own failure.
    pub async fn invoke_role(
        &self,
        task_type: TaskType,
        role: LlmRole,
        prompt: &str,
        timeout: Duration,
    ) -> ReviewResult<Invocation> {
        let config = self.configs.get_active(task_type, role).await?;
        self.call(&config, role, prompt, timeout).await
    }

    /// Admin Test Connection: one canned call against one role
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no active config exists for the role;
    /// call failures are reported inside the [`ConnectionReport`].
    pub async fn test_connection(
        &self,
        task_type: TaskType,
        role: LlmRole,
        timeout: Duration,
    ) -> ReviewResult<ConnectionReport> {
        // Surface missing configuration as an error; the admin must create
        // the config before testing it
        self.configs.get_active(task_type, role).await?;

        match self.invoke_role(task_type, role, TEST_PROMPT, timeout).await {
            Ok(invocation) => Ok(ConnectionReport {
                ok: true,
                task_type,
                role,
                model_code: Some(invocation.model_code),
                latency_ms: invocation.latency.as_millis() as u64,
                error: None,
            }),
            Err(error) => Ok(ConnectionReport {
                ok: false,
                task_type,
                role,
                model_code: None,
                latency_ms: 0,
                error: Some(error.to_string()),
            }),
        }
    }

    /// One transport call with audit logging
    async fn call(
        &self,
        config: &LlmConfig,
        role: LlmRole,
        prompt: &str,
        timeout: Duration,
    ) -> ReviewResult<Invocation> {
        let started = Instant::now();
        match self.transport.send(config, prompt, timeout).await {
            Ok(RawResponse { body, model_code }) => {
                let latency = started.elapsed();
                info!(
                    task_type = %config.task_type,
                    served_by = %role,
                    model = %model_code,
                    latency_ms = latency.as_millis() as u64,
                    "model invocation served"
                );
                Ok(Invocation {
                    raw_body: body,
                    served_by: role,
                    model_code,
                    latency,
                })
            }
            Err(failure) => Err(failure.into_review_error(role)),
        }
    }
}
