// ABOUTME: Environment-driven server configuration with documented defaults
// ABOUTME: Reads FOLIO_* variables for database, HTTP port, and LLM call timeouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Server Configuration
//!
//! Environment-only configuration. Every setting has a default so the server
//! starts with no environment at all (SQLite file in the working directory,
//! port 8087).

use std::env;
use std::time::Duration;

use crate::errors::{ReviewError, ReviewResult};

/// Environment variable for the database URL
const DATABASE_URL_ENV: &str = "FOLIO_DATABASE_URL";

/// Environment variable for the HTTP port
const HTTP_PORT_ENV: &str = "FOLIO_HTTP_PORT";

/// Environment variable for the LLM invocation timeout (seconds)
const LLM_TIMEOUT_ENV: &str = "FOLIO_LLM_TIMEOUT_SECS";

/// Environment variable for the admin Test Connection timeout (seconds)
const LLM_TEST_TIMEOUT_ENV: &str = "FOLIO_LLM_TEST_TIMEOUT_SECS";

/// Default SQLite database (created if missing)
const DEFAULT_DATABASE_URL: &str = "sqlite:folio_review.db?mode=rwc";

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8087;

/// Default invocation timeout; review generation on large excerpts is slow
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Default Test Connection timeout; admins expect a quick verdict
const DEFAULT_LLM_TEST_TIMEOUT_SECS: u64 = 10;

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database connection URL
    pub database_url: String,
    /// HTTP listen port
    pub http_port: u16,
    /// Timeout for pipeline LLM invocations
    pub llm_timeout: Duration,
    /// Timeout for the admin Test Connection action
    pub llm_test_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse (port or timeout).
    pub fn from_env() -> ReviewResult<Self> {
        Ok(Self {
            database_url: env::var(DATABASE_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned()),
            http_port: parse_env(HTTP_PORT_ENV, DEFAULT_HTTP_PORT)?,
            llm_timeout: Duration::from_secs(parse_env(
                LLM_TIMEOUT_ENV,
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
            llm_test_timeout: Duration::from_secs(parse_env(
                LLM_TEST_TIMEOUT_ENV,
                DEFAULT_LLM_TEST_TIMEOUT_SECS,
            )?),
        })
    }

    /// One-line summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "database={}, port={}, llm_timeout={}s, test_timeout={}s",
            self.database_url,
            self.http_port,
            self.llm_timeout.as_secs(),
            self.llm_test_timeout.as_secs()
        )
    }
}

/// Parse an environment variable, falling back to a default when unset
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> ReviewResult<T> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ReviewError::internal(format!("invalid value for {name}: {value}"))),
        Err(_) => Ok(default),
    }
}
