//! Nutrition cache backed by the `ingredients` and `nutrition_cache` tables.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use mealgen_db::queries::ingredients::{self, InsertOutcome};
use mealgen_db::queries::nutrition_cache::{self, NewNutritionEntry};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    CacheWriteSummary, NutritionCache, NutritionEntry, NutritionItem, lookup_keys, prepare_batch,
};
use crate::model::{Macros, NutritionFacts};

#[derive(Debug, Clone)]
pub struct PgNutritionCache {
    pool: PgPool,
}

impl PgNutritionCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve the canonical ingredient for `normalized`, creating it if
    /// needed. Returns `None` when the name has been soft-deleted.
    ///
    /// 1. active row -> use it
    /// 2. deleted row -> no identity; never recreate
    /// 3. insert; a unique violation means another writer won, so re-read
    pub async fn resolve_ingredient(&self, name: &str, normalized: &str) -> Result<Option<Uuid>> {
        if let Some(active) = ingredients::find_active(&self.pool, normalized).await? {
            return Ok(Some(active.id));
        }
        if ingredients::find_deleted(&self.pool, normalized).await?.is_some() {
            debug!(ingredient = %normalized, "ingredient is soft-deleted, not recreating");
            return Ok(None);
        }
        match ingredients::insert(&self.pool, name.trim(), normalized).await? {
            InsertOutcome::Inserted(created) => Ok(Some(created.id)),
            InsertOutcome::Conflict => {
                // Either a concurrent insert or a concurrent soft delete.
                let winner = ingredients::find_active(&self.pool, normalized).await?;
                Ok(winner.map(|i| i.id))
            }
        }
    }

    async fn write_one(&self, item: &NutritionItem) -> Result<Option<bool>> {
        let normalized = item.normalized_name();
        let Some(ingredient_id) = self.resolve_ingredient(&item.name, &normalized).await? else {
            return Ok(None);
        };
        let written = nutrition_cache::insert_ignoring_duplicates(
            &self.pool,
            &NewNutritionEntry {
                ingredient_id,
                serving_size: item.serving_size,
                serving_unit: item.serving_unit.trim().to_lowercase(),
                calories: item.macros.calories,
                protein: item.macros.protein,
                carbs: item.macros.carbs,
                fat: item.macros.fat,
                source: item.source,
            },
        )
        .await?;
        Ok(Some(written))
    }
}

#[async_trait]
impl NutritionCache for PgNutritionCache {
    async fn fetch_many(&self, names: &[String]) -> Result<HashMap<String, NutritionEntry>> {
        let keys = lookup_keys(names);
        let rows = nutrition_cache::fetch_by_normalized_names(&self.pool, &keys).await?;

        let mut hits = HashMap::with_capacity(rows.len());
        for row in rows {
            // Rows arrive best-first per name; keep the first.
            hits.entry(row.normalized_name.clone())
                .or_insert_with(|| NutritionEntry {
                    normalized_name: row.normalized_name,
                    facts: NutritionFacts {
                        serving_size: row.serving_size,
                        serving_unit: row.serving_unit,
                        macros: Macros::new(row.calories, row.protein, row.carbs, row.fat),
                    },
                    source: row.source,
                });
        }
        Ok(hits)
    }

    async fn cache_many(&self, items: &[NutritionItem]) -> Result<CacheWriteSummary> {
        let (unique, invalid) = prepare_batch(items);
        let mut summary = CacheWriteSummary {
            skipped_invalid: invalid,
            ..Default::default()
        };

        for item in unique {
            match self.write_one(item).await {
                Ok(Some(true)) => summary.written += 1,
                Ok(Some(false)) => summary.duplicates += 1,
                Ok(None) => summary.skipped_deleted += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(ingredient = %item.name, error = %e, "failed to cache nutrition entry");
                }
            }
        }
        Ok(summary)
    }
}
