//! Integration tests for the plan service: persistence and prep regeneration.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use mealgen_core::GenerationError;
use mealgen_core::client::{GenerationClient, MemoryAuditSink, RetryPolicy};
use mealgen_core::config::ModelConfig;
use mealgen_core::model::{GenerationOptions, PrepSchedule};
use mealgen_core::nutrition::PgNutritionCache;
use mealgen_core::orchestrator::{NoProgress, Orchestrator, TestMode};
use mealgen_core::service::{generate_and_store, regenerate_prep_for_existing_plan};
use mealgen_db::queries::plans;
use mealgen_test_utils::samples::{self, GROCERY_TOOL, INGREDIENTS_TOOL, MEALS_TOOL, PREP_TOOL};
use mealgen_test_utils::{ScriptedOracle, create_test_db, drop_test_db};

fn orchestrator(pool: &sqlx::PgPool, oracle: ScriptedOracle, mode: TestMode) -> Orchestrator {
    let client = GenerationClient::new(Arc::new(oracle), Arc::new(MemoryAuditSink::new()))
        .with_retry(RetryPolicy::immediate());
    Orchestrator::new(
        client,
        Arc::new(PgNutritionCache::new(pool.clone())),
        ModelConfig::default(),
        mode,
    )
}

#[tokio::test]
async fn successful_run_is_persisted_with_every_meal() {
    let (pool, db_name) = create_test_db().await;
    let oracle = ScriptedOracle::new()
        .reply(INGREDIENTS_TOOL, samples::core_reply())
        .reply(MEALS_TOOL, samples::week_reply())
        .reply(GROCERY_TOOL, samples::grocery_reply())
        .reply(PREP_TOOL, samples::prep_reply());
    let orchestrator = orchestrator(&pool, oracle, TestMode::Production);
    let user_id = Uuid::new_v4();

    let stored = generate_and_store(
        &pool,
        &orchestrator,
        user_id,
        &samples::weekly_profile(),
        &GenerationOptions::default(),
        &NoProgress,
    )
    .await
    .expect("generate and store");

    let row = plans::get_plan(&pool, stored.id)
        .await
        .expect("get")
        .expect("plan exists");
    assert_eq!(row.user_id, user_id);
    assert_eq!(row.title, "Balanced week");
    let prep: PrepSchedule = serde_json::from_value(row.prep_schedule.expect("prep stored")).unwrap();
    assert_eq!(prep, stored.plan.prep_schedule);

    let meals = plans::list_meals_for_plan(&pool, stored.id).await.expect("meals");
    assert_eq!(meals.len(), 28);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn failed_run_persists_nothing() {
    let (pool, db_name) = create_test_db().await;
    let oracle = ScriptedOracle::new()
        .reply(INGREDIENTS_TOOL, samples::core_reply())
        .reply(MEALS_TOOL, samples::off_roster_week_reply());
    let orchestrator = orchestrator(&pool, oracle, TestMode::Production);
    let user_id = Uuid::new_v4();

    let err = generate_and_store(
        &pool,
        &orchestrator,
        user_id,
        &samples::weekly_profile(),
        &GenerationOptions::default(),
        &NoProgress,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, GenerationError::Contract(_)));
    let stored = plans::list_plans_for_user(&pool, user_id).await.expect("list");
    assert!(stored.is_empty());

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn prep_regeneration_rebuilds_the_week_from_storage() {
    let (pool, db_name) = create_test_db().await;
    let user_id = Uuid::new_v4();

    let fixture = orchestrator(&pool, ScriptedOracle::new(), TestMode::Fixture);
    let stored = generate_and_store(
        &pool,
        &fixture,
        user_id,
        &samples::weekly_profile(),
        &GenerationOptions::default(),
        &NoProgress,
    )
    .await
    .expect("store fixture plan");

    let reply = json!({
        "sessions": [{
            "day": "saturday",
            "label": "Weekend chicken prep",
            "estimated_minutes": 45,
            "tasks": [{
                "description": "Roast every chicken portion for the week",
                "meals": ["Garlic Chicken with Brown Rice and Broccoli"],
                "portions": 7,
                "storage": "fridge, 4 days"
            }]
        }],
        "tips": []
    });
    let oracle = Arc::new(ScriptedOracle::new().reply(PREP_TOOL, reply));
    let client = GenerationClient::new(oracle.clone(), Arc::new(MemoryAuditSink::new()))
        .with_retry(RetryPolicy::immediate());
    let live = Orchestrator::new(
        client,
        Arc::new(PgNutritionCache::new(pool.clone())),
        ModelConfig::default(),
        TestMode::Production,
    );

    let schedule = regenerate_prep_for_existing_plan(&pool, &live, stored.id, user_id)
        .await
        .expect("regenerate prep");

    assert_eq!(oracle.tools_called(), vec![PREP_TOOL]);
    let prompt = &oracle.requests()[0].prompt;
    for meal in stored.plan.meals() {
        assert!(prompt.contains(&meal.name), "prompt is missing {}", meal.name);
    }
    assert_eq!(schedule.sessions.len(), 1);
    assert_ne!(schedule, stored.plan.prep_schedule);

    let row = plans::get_plan(&pool, stored.id).await.unwrap().unwrap();
    let saved: PrepSchedule = serde_json::from_value(row.prep_schedule.unwrap()).unwrap();
    assert_eq!(saved, schedule);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn prep_regeneration_checks_ownership() {
    let (pool, db_name) = create_test_db().await;
    let fixture = orchestrator(&pool, ScriptedOracle::new(), TestMode::Fixture);
    let owner = Uuid::new_v4();

    let stored = generate_and_store(
        &pool,
        &fixture,
        owner,
        &samples::weekly_profile(),
        &GenerationOptions::default(),
        &NoProgress,
    )
    .await
    .expect("store fixture plan");

    let err = regenerate_prep_for_existing_plan(&pool, &fixture, stored.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Unauthorized));

    let missing = Uuid::new_v4();
    let err = regenerate_prep_for_existing_plan(&pool, &fixture, missing, owner)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::NotFound(id) if id == missing));

    drop_test_db(&db_name).await;
}
