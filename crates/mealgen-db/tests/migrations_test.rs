//! Integration tests for the embedded migrations.

use sqlx::Row;

use mealgen_db::pool;
use mealgen_db::config::DbConfig;
use mealgen_db::pool::Bootstrap;
use mealgen_test_utils::{create_test_db, drop_test_db, pg_url};

#[tokio::test]
async fn migrations_create_expected_tables() {
    let (pool, db_name) = create_test_db().await;

    let counts = pool::table_counts(&pool).await.expect("table counts");
    let names: Vec<&str> = counts.iter().map(|c| c.table).collect();
    assert_eq!(names, pool::TABLES.to_vec());
    assert!(counts.iter().all(|c| c.rows == 0));

    let listed: Vec<String> = sqlx::query_scalar(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' AND tablename <> '_sqlx_migrations' \
         ORDER BY tablename",
    )
    .fetch_all(&pool)
    .await
    .expect("list tables");
    let mut expected: Vec<&str> = pool::TABLES.to_vec();
    expected.sort_unstable();
    assert_eq!(listed, expected);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (pool, db_name) = create_test_db().await;

    // Already applied by create_test_db; a second run must be a no-op.
    pool::run_migrations(&pool).await.expect("second run succeeds");

    let row = sqlx::query("SELECT COUNT(*) AS n FROM _sqlx_migrations")
        .fetch_one(&pool)
        .await
        .expect("query migrations table");
    let applied: i64 = row.get("n");
    assert_eq!(applied, pool::MIGRATOR.iter().count() as i64);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn nutrition_source_check_constraint_rejects_unknown_values() {
    let (pool, db_name) = create_test_db().await;

    let (ingredient_id,): (uuid::Uuid,) = sqlx::query_as(
        "INSERT INTO ingredients (name, normalized_name) VALUES ('Oats', 'oats') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("insert ingredient");

    let result = sqlx::query(
        "INSERT INTO nutrition_cache \
             (ingredient_id, serving_size, serving_unit, calories, protein, carbs, fat, source) \
         VALUES ($1, 40, 'g', 150, 5, 27, 3, 'guessed')",
    )
    .bind(ingredient_id)
    .execute(&pool)
    .await;
    assert!(result.is_err(), "unknown source should violate the check constraint");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn bootstrap_creates_the_database_once() {
    let db_name = format!("mealgen_boot_{}", uuid::Uuid::new_v4().simple());
    let config = DbConfig::new(format!("{}/{db_name}", pg_url().await)).with_max_connections(2);

    let first = pool::ensure_database_exists(&config).await.expect("create");
    assert_eq!(first, Bootstrap::Created);
    let second = pool::ensure_database_exists(&config).await.expect("re-check");
    assert_eq!(second, Bootstrap::AlreadyExisted);

    let pool = pool::create_pool(&config).await.expect("connect");
    pool::run_migrations(&pool).await.expect("migrate");
    assert_eq!(pool::table_counts(&pool).await.expect("counts").len(), 5);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn bootstrap_refuses_unsafe_names_before_connecting() {
    // Nothing listens on port 1; the name check has to fail first.
    let config = DbConfig::new("postgresql://localhost:1/bad-name");
    let err = pool::ensure_database_exists(&config).await.unwrap_err();
    assert!(err.to_string().contains("not a plain identifier"), "{err:#}");
}
