//! Integration tests for the Generation Client against a scripted oracle.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use mealgen_core::GenerationError;
use mealgen_core::client::{
    CallSpec, GenerationClient, MemoryAuditSink, PgAuditSink, PromptKind, RetryPolicy,
};
use mealgen_core::oracle::OracleError;
use mealgen_db::queries::generation_logs;
use mealgen_test_utils::samples::INGREDIENTS_TOOL;
use mealgen_test_utils::{ScriptedOracle, create_test_db, drop_test_db};

fn spec(max_retries: u32) -> CallSpec {
    CallSpec::new(
        PromptKind::Ingredients,
        "Pick ingredients.".to_owned(),
        json!({"type": "object"}),
        "planning-model",
        1024,
    )
    .with_max_retries(max_retries)
}

fn client(oracle: ScriptedOracle) -> (GenerationClient, Arc<ScriptedOracle>, Arc<MemoryAuditSink>) {
    let oracle = Arc::new(oracle);
    let audit = Arc::new(MemoryAuditSink::new());
    let client = GenerationClient::new(oracle.clone(), audit.clone())
        .with_retry(RetryPolicy::immediate())
        .with_caller("client-test");
    (client, oracle, audit)
}

#[tokio::test]
async fn transient_failures_below_budget_then_success() {
    for k in 0..3u32 {
        let mut script = ScriptedOracle::new();
        for _ in 0..k {
            script = script.fail(INGREDIENTS_TOOL, OracleError::Timeout);
        }
        script = script.reply(INGREDIENTS_TOOL, json!({"protein": ["tofu"]}));
        let (client, oracle, audit) = client(script);

        let out: Map<String, Value> = client.call(&spec(3)).await.expect("call should succeed");

        assert_eq!(out["protein"], json!(["tofu"]));
        assert_eq!(oracle.call_count(INGREDIENTS_TOOL), k as usize + 1);
        let entries = audit.entries();
        assert_eq!(entries.len(), k as usize + 1, "one audit entry per attempt");
        assert!(entries.last().unwrap().success);
        assert!(entries[..k as usize].iter().all(|e| !e.success));
        assert_eq!(
            entries.iter().map(|e| e.attempt).collect::<Vec<_>>(),
            (1..=k + 1).collect::<Vec<_>>()
        );
    }
}

#[tokio::test]
async fn truncation_fails_fast_without_retrying() {
    let script = ScriptedOracle::new()
        .truncated(INGREDIENTS_TOOL)
        .reply(INGREDIENTS_TOOL, json!({}));
    let (client, oracle, audit) = client(script);

    let err = client.call::<Value>(&spec(2)).await.unwrap_err();

    assert!(
        matches!(err, GenerationError::Truncated { max_tokens: 1024, .. }),
        "got {err:?}"
    );
    assert_eq!(oracle.call_count(INGREDIENTS_TOOL), 1);
    assert_eq!(oracle.remaining(), 1);
    assert_eq!(audit.len(), 1);
    assert_eq!(audit.entries()[0].error_kind, Some("truncated"));
}

#[tokio::test]
async fn rate_limits_exhaust_the_budget() {
    let script = ScriptedOracle::new()
        .fail(INGREDIENTS_TOOL, OracleError::RateLimited { retry_after: None })
        .fail(INGREDIENTS_TOOL, OracleError::RateLimited { retry_after: None })
        .fail(INGREDIENTS_TOOL, OracleError::RateLimited { retry_after: None });
    let (client, oracle, audit) = client(script);

    let err = client.call::<Value>(&spec(2)).await.unwrap_err();

    match &err {
        GenerationError::Exhausted { attempts, source } => {
            assert_eq!(*attempts, 3);
            assert!(matches!(source, OracleError::RateLimited { .. }));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(err.failure_reason(), mealgen_core::FailureReason::RateLimited);
    assert_eq!(oracle.call_count(INGREDIENTS_TOOL), 3);
    assert_eq!(audit.len(), 3);
}

#[tokio::test]
async fn audit_entries_reach_postgres() {
    let (pool, db_name) = create_test_db().await;

    let oracle = Arc::new(
        ScriptedOracle::new()
            .fail(INGREDIENTS_TOOL, OracleError::Server { status: 503, body: "busy".into() })
            .reply(INGREDIENTS_TOOL, json!({"protein": []})),
    );
    let sink = PgAuditSink::new(pool.clone());
    let tracker = sink.tracker().clone();
    let client = GenerationClient::new(oracle, Arc::new(sink))
        .with_retry(RetryPolicy::immediate())
        .with_caller("audited-user");

    let _: Value = client.call(&spec(2)).await.expect("second attempt succeeds");

    tracker.close();
    tracker.wait().await;
    let logs = generation_logs::list_for_caller(&pool, "audited-user")
        .await
        .expect("list logs");

    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.prompt_type == "ingredients"));
    assert!(logs.iter().all(|l| l.prompt_sha256.len() == 64));
    assert_eq!(logs.iter().filter(|l| l.success).count(), 1);
    let failed = logs.iter().find(|l| !l.success).unwrap();
    assert_eq!(failed.error_kind.as_deref(), Some("server"));

    drop_test_db(&db_name).await;
}
