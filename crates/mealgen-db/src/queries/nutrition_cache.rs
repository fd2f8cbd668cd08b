//! Database query functions for the `nutrition_cache` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CachedNutrition, NutritionCacheRow, NutritionSource};

/// Parameters for inserting a nutrition observation.
#[derive(Debug, Clone)]
pub struct NewNutritionEntry {
    pub ingredient_id: Uuid,
    pub serving_size: f64,
    pub serving_unit: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub source: NutritionSource,
}

/// Insert a nutrition row keyed by (ingredient, serving size, serving unit).
///
/// Duplicate keys are ignored. Returns `true` when a row was written.
pub async fn insert_ignoring_duplicates(pool: &PgPool, new: &NewNutritionEntry) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO nutrition_cache \
             (ingredient_id, serving_size, serving_unit, calories, protein, carbs, fat, source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (ingredient_id, serving_size, serving_unit) DO NOTHING",
    )
    .bind(new.ingredient_id)
    .bind(new.serving_size)
    .bind(&new.serving_unit)
    .bind(new.calories)
    .bind(new.protein)
    .bind(new.carbs)
    .bind(new.fat)
    .bind(new.source)
    .execute(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert nutrition entry for ingredient {} ({} {})",
            new.ingredient_id, new.serving_size, new.serving_unit
        )
    })?;

    Ok(result.rows_affected() > 0)
}

/// Fetch every cached row whose active ingredient matches one of
/// `normalized_names`, in a single round trip.
///
/// Rows are ordered so that, per name, reference values come before
/// estimates and older observations before newer ones.
pub async fn fetch_by_normalized_names(
    pool: &PgPool,
    normalized_names: &[String],
) -> Result<Vec<CachedNutrition>> {
    if normalized_names.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, CachedNutrition>(
        "SELECT i.normalized_name, n.serving_size, n.serving_unit, \
                n.calories, n.protein, n.carbs, n.fat, n.source \
         FROM nutrition_cache n \
         JOIN ingredients i ON i.id = n.ingredient_id \
         WHERE i.normalized_name = ANY($1) AND i.deleted_at IS NULL \
         ORDER BY i.normalized_name, (n.source = 'reference') DESC, n.created_at ASC",
    )
    .bind(normalized_names)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to fetch nutrition for {} names", normalized_names.len()))?;

    Ok(rows)
}

/// List all nutrition rows for one ingredient.
pub async fn list_for_ingredient(pool: &PgPool, ingredient_id: Uuid) -> Result<Vec<NutritionCacheRow>> {
    let rows = sqlx::query_as::<_, NutritionCacheRow>(
        "SELECT * FROM nutrition_cache WHERE ingredient_id = $1 ORDER BY created_at",
    )
    .bind(ingredient_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list nutrition rows for ingredient {ingredient_id}"))?;

    Ok(rows)
}

/// Count nutrition rows for an ingredient name, across active and deleted
/// ingredient records.
pub async fn count_for_normalized_name(pool: &PgPool, normalized_name: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM nutrition_cache n \
         JOIN ingredients i ON i.id = n.ingredient_id \
         WHERE i.normalized_name = $1",
    )
    .bind(normalized_name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to count nutrition rows for {normalized_name:?}"))?;

    Ok(row.0)
}
