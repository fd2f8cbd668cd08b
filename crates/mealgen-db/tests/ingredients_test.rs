//! Tests for the `ingredients` and `nutrition_cache` query modules.

use mealgen_db::models::NutritionSource;
use mealgen_db::queries::ingredients::{self, InsertOutcome};
use mealgen_db::queries::nutrition_cache::{self, NewNutritionEntry};
use mealgen_test_utils::{create_test_db, drop_test_db};

fn entry(ingredient_id: uuid::Uuid, size: f64, unit: &str) -> NewNutritionEntry {
    NewNutritionEntry {
        ingredient_id,
        serving_size: size,
        serving_unit: unit.to_owned(),
        calories: 280.0,
        protein: 52.0,
        carbs: 0.0,
        fat: 6.0,
        source: NutritionSource::Estimated,
    }
}

#[tokio::test]
async fn insert_then_conflict_on_same_normalized_name() {
    let (pool, db_name) = create_test_db().await;

    let first = ingredients::insert(&pool, "Chicken Breast", "chicken breast")
        .await
        .expect("first insert");
    let InsertOutcome::Inserted(row) = first else {
        panic!("first insert should create a row");
    };
    assert_eq!(row.name, "Chicken Breast");
    assert!(!row.is_deleted());

    let second = ingredients::insert(&pool, "chicken breast", "chicken breast")
        .await
        .expect("second insert should not error");
    assert!(matches!(second, InsertOutcome::Conflict));

    let found = ingredients::find_active(&pool, "chicken breast")
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(found.id, row.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn soft_deleted_row_blocks_reinsert() {
    let (pool, db_name) = create_test_db().await;

    ingredients::insert(&pool, "Tofu", "tofu").await.expect("insert");
    assert!(ingredients::soft_delete(&pool, "tofu").await.expect("delete"));
    assert!(!ingredients::soft_delete(&pool, "tofu").await.expect("second delete is a no-op"));

    assert!(ingredients::find_active(&pool, "tofu").await.expect("lookup").is_none());
    assert!(ingredients::find_deleted(&pool, "tofu").await.expect("lookup").is_some());

    let outcome = ingredients::insert(&pool, "Tofu", "tofu").await.expect("insert");
    assert!(matches!(outcome, InsertOutcome::Conflict));
    assert_eq!(
        ingredients::list_by_normalized_name(&pool, "tofu")
            .await
            .expect("list")
            .len(),
        1
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn nutrition_insert_ignores_duplicate_serving_key() {
    let (pool, db_name) = create_test_db().await;

    let InsertOutcome::Inserted(chicken) =
        ingredients::insert(&pool, "Chicken Breast", "chicken breast")
            .await
            .expect("insert")
    else {
        panic!("expected insert");
    };

    let wrote = nutrition_cache::insert_ignoring_duplicates(&pool, &entry(chicken.id, 6.0, "oz"))
        .await
        .expect("first write");
    assert!(wrote);
    let wrote_again =
        nutrition_cache::insert_ignoring_duplicates(&pool, &entry(chicken.id, 6.0, "oz"))
            .await
            .expect("second write");
    assert!(!wrote_again);

    // A different serving granularity is a separate row.
    nutrition_cache::insert_ignoring_duplicates(&pool, &entry(chicken.id, 100.0, "g"))
        .await
        .expect("gram write");

    let rows = nutrition_cache::list_for_ingredient(&pool, chicken.id)
        .await
        .expect("list");
    assert_eq!(rows.len(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn fetch_skips_deleted_ingredients_and_prefers_reference_rows() {
    let (pool, db_name) = create_test_db().await;

    let InsertOutcome::Inserted(rice) =
        ingredients::insert(&pool, "Brown Rice", "brown rice").await.expect("insert")
    else {
        panic!("expected insert");
    };
    let InsertOutcome::Inserted(lard) =
        ingredients::insert(&pool, "Lard", "lard").await.expect("insert")
    else {
        panic!("expected insert");
    };

    nutrition_cache::insert_ignoring_duplicates(&pool, &entry(rice.id, 1.0, "cup"))
        .await
        .expect("estimated row");
    let mut reference = entry(rice.id, 100.0, "g");
    reference.source = NutritionSource::Reference;
    nutrition_cache::insert_ignoring_duplicates(&pool, &reference)
        .await
        .expect("reference row");
    nutrition_cache::insert_ignoring_duplicates(&pool, &entry(lard.id, 1.0, "tbsp"))
        .await
        .expect("lard row");
    ingredients::soft_delete(&pool, "lard").await.expect("delete");

    let names = vec!["brown rice".to_owned(), "lard".to_owned(), "quinoa".to_owned()];
    let rows = nutrition_cache::fetch_by_normalized_names(&pool, &names)
        .await
        .expect("fetch");

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.normalized_name == "brown rice"));
    assert_eq!(rows[0].source, NutritionSource::Reference);

    let empty = nutrition_cache::fetch_by_normalized_names(&pool, &[])
        .await
        .expect("empty fetch");
    assert!(empty.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}
