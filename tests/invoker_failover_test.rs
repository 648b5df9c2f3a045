// ABOUTME: Integration tests for the failover invoker
// ABOUTME: Verifies the single-hop property: never more than two provider calls
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

use std::sync::Arc;

use folio_review_server::errors::ReviewError;
use folio_review_server::models::{LlmRole, TaskType};

use common::{
    auth_failure, ok_response, scripted_invoker, seed_configs, test_db, transient_failure,
    ScriptedTransport, TEST_TIMEOUT,
};

#[tokio::test]
async fn primary_success_makes_exactly_one_call() {
    let db = test_db().await;
    seed_configs(&db).await;
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("hello")]));
    let invoker = scripted_invoker(&db, transport.clone());

    let invocation = invoker
        .invoke(TaskType::InitialReview, "prompt", TEST_TIMEOUT)
        .await
        .unwrap();

    assert_eq!(invocation.served_by, LlmRole::Primary);
    assert_eq!(invocation.raw_body, "hello");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn transient_primary_failure_fails_over_to_backup() {
    let db = test_db().await;
    seed_configs(&db).await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        transient_failure("connection refused"),
        ok_response("from backup"),
    ]));
    let invoker = scripted_invoker(&db, transport.clone());

    let invocation = invoker
        .invoke(TaskType::MetadataExtraction, "prompt", TEST_TIMEOUT)
        .await
        .unwrap();

    assert_eq!(invocation.served_by, LlmRole::Backup);
    assert_eq!(invocation.raw_body, "from backup");
    assert_eq!(
        transport.roles_called(),
        vec![LlmRole::Primary, LlmRole::Backup]
    );
}

#[tokio::test]
async fn auth_failure_also_triggers_the_failover_hop() {
    let db = test_db().await;
    seed_configs(&db).await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        auth_failure("invalid api key"),
        ok_response("from backup"),
    ]));
    let invoker = scripted_invoker(&db, transport.clone());

    let invocation = invoker
        .invoke(TaskType::DetailedReview, "prompt", TEST_TIMEOUT)
        .await
        .unwrap();

    assert_eq!(invocation.served_by, LlmRole::Backup);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn double_failure_reports_the_backup_error_after_exactly_two_calls() {
    let db = test_db().await;
    seed_configs(&db).await;
    let transport = Arc::new(ScriptedTransport::new(vec![
        transient_failure("primary down"),
        transient_failure("backup down"),
    ]));
    let invoker = scripted_invoker(&db, transport.clone());

    let err = invoker
        .invoke(TaskType::InitialReview, "prompt", TEST_TIMEOUT)
        .await
        .unwrap_err();

    // The final cause is the backup's error; the primary's stays in the logs
    match err {
        ReviewError::Transient { role, detail } => {
            assert_eq!(role, LlmRole::Backup);
            assert!(detail.contains("backup down"));
        }
        other => panic!("expected Transient from backup, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn missing_config_is_a_configuration_error_with_no_calls() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("unused")]));
    let invoker = scripted_invoker(&db, transport.clone());

    let err = invoker
        .invoke(TaskType::InitialReview, "prompt", TEST_TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Configuration { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn invoke_role_makes_exactly_one_call_even_on_failure() {
    let db = test_db().await;
    seed_configs(&db).await;
    let transport = Arc::new(ScriptedTransport::new(vec![transient_failure("down")]));
    let invoker = scripted_invoker(&db, transport.clone());

    let err = invoker
        .invoke_role(TaskType::InitialReview, LlmRole::Backup, "p", TEST_TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReviewError::Transient {
            role: LlmRole::Backup,
            ..
        }
    ));
    assert_eq!(transport.roles_called(), vec![LlmRole::Backup]);
}

#[tokio::test]
async fn test_connection_reports_served_role_and_latency() {
    let db = test_db().await;
    seed_configs(&db).await;
    let transport = Arc::new(ScriptedTransport::new(vec![ok_response("ok")]));
    let invoker = scripted_invoker(&db, transport);

    let report = invoker
        .test_connection(TaskType::MetadataExtraction, LlmRole::Primary, TEST_TIMEOUT)
        .await
        .unwrap();

    assert!(report.ok);
    assert_eq!(report.role, LlmRole::Primary);
    assert_eq!(report.model_code.as_deref(), Some("test-model"));
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_connection_reports_failure_without_failover() {
    let db = test_db().await;
    seed_configs(&db).await;
    let transport = Arc::new(ScriptedTransport::new(vec![transient_failure("timeout")]));
    let invoker = scripted_invoker(&db, transport.clone());

    let report = invoker
        .test_connection(TaskType::MetadataExtraction, LlmRole::Backup, TEST_TIMEOUT)
        .await
        .unwrap();

    assert!(!report.ok);
    assert!(report.error.unwrap().contains("timeout"));
    // Test Connection targets one role; it never hops
    assert_eq!(transport.roles_called(), vec![LlmRole::Backup]);
}

#[tokio::test]
async fn test_connection_on_unconfigured_role_is_a_configuration_error() {
    let db = test_db().await;
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let invoker = scripted_invoker(&db, transport);

    let err = invoker
        .test_connection(TaskType::InitialReview, LlmRole::Primary, TEST_TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Configuration { .. }));
}
