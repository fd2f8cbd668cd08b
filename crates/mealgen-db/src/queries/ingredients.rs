//! Database query functions for the `ingredients` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Ingredient;

/// Result of attempting to insert a new canonical ingredient.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The row was created by this call.
    Inserted(Ingredient),
    /// The unique key on `normalized_name` rejected the insert: another
    /// writer created the row first (or a soft-deleted row holds the name).
    Conflict,
}

/// Fetch the non-deleted ingredient with the given normalized name.
pub async fn find_active(pool: &PgPool, normalized_name: &str) -> Result<Option<Ingredient>> {
    let ingredient = sqlx::query_as::<_, Ingredient>(
        "SELECT * FROM ingredients \
         WHERE normalized_name = $1 AND deleted_at IS NULL",
    )
    .bind(normalized_name)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to look up ingredient {normalized_name:?}"))?;

    Ok(ingredient)
}

/// Fetch the soft-deleted ingredient with the given normalized name, if any.
pub async fn find_deleted(pool: &PgPool, normalized_name: &str) -> Result<Option<Ingredient>> {
    let ingredient = sqlx::query_as::<_, Ingredient>(
        "SELECT * FROM ingredients \
         WHERE normalized_name = $1 AND deleted_at IS NOT NULL",
    )
    .bind(normalized_name)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to look up deleted ingredient {normalized_name:?}"))?;

    Ok(ingredient)
}

/// Insert a canonical ingredient.
///
/// A unique-constraint violation is reported as [`InsertOutcome::Conflict`]
/// rather than an error; every other database failure is an error.
pub async fn insert(pool: &PgPool, name: &str, normalized_name: &str) -> Result<InsertOutcome> {
    let result = sqlx::query_as::<_, Ingredient>(
        "INSERT INTO ingredients (name, normalized_name) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(name)
    .bind(normalized_name)
    .fetch_one(pool)
    .await;

    match result {
        Ok(ingredient) => Ok(InsertOutcome::Inserted(ingredient)),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(InsertOutcome::Conflict)
        }
        Err(e) => Err(e).with_context(|| format!("failed to insert ingredient {normalized_name:?}")),
    }
}

/// Soft-delete the ingredient with the given normalized name.
///
/// Returns `true` if an active row was marked deleted.
pub async fn soft_delete(pool: &PgPool, normalized_name: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE ingredients SET deleted_at = now() \
         WHERE normalized_name = $1 AND deleted_at IS NULL",
    )
    .bind(normalized_name)
    .execute(pool)
    .await
    .with_context(|| format!("failed to soft-delete ingredient {normalized_name:?}"))?;

    Ok(result.rows_affected() > 0)
}

/// List every row (active or deleted) carrying the given normalized name.
pub async fn list_by_normalized_name(
    pool: &PgPool,
    normalized_name: &str,
) -> Result<Vec<Ingredient>> {
    let rows = sqlx::query_as::<_, Ingredient>(
        "SELECT * FROM ingredients WHERE normalized_name = $1 ORDER BY created_at",
    )
    .bind(normalized_name)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list ingredients named {normalized_name:?}"))?;

    Ok(rows)
}
