//! Nutrition Cache: normalized food name -> previously observed macros.
//!
//! The cache is process-wide shared state that outlives any single run.
//! Reads are batched; writes are idempotent and best-effort, normally issued
//! through [`spawn_cache_write`] so no run ever waits on them. The writes are
//! tracked so a process can let them finish before it exits.

pub mod memory;
pub mod postgres;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
pub use mealgen_db::models::NutritionSource;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

pub use memory::MemoryNutritionCache;
pub use postgres::PgNutritionCache;

use crate::model::{Macros, NutritionFacts};

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A cache hit for one normalized name.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionEntry {
    pub normalized_name: String,
    pub facts: NutritionFacts,
    pub source: NutritionSource,
}

/// One observed (ingredient, serving) pair to write.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionItem {
    pub name: String,
    pub serving_size: f64,
    pub serving_unit: String,
    pub macros: Macros,
    pub source: NutritionSource,
}

impl NutritionItem {
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    fn is_cacheable(&self) -> bool {
        !self.normalized_name().is_empty()
            && self.serving_size.is_finite()
            && self.serving_size > 0.0
            && !self.serving_unit.trim().is_empty()
            && self.macros.is_finite_non_negative()
    }
}

/// Outcome counts of one `cache_many` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheWriteSummary {
    /// New nutrition rows stored.
    pub written: usize,
    /// Rows already present under the same key.
    pub duplicates: usize,
    /// Items whose ingredient is soft-deleted.
    pub skipped_deleted: usize,
    /// Items with unusable values (empty name, non-positive serving, ...).
    pub skipped_invalid: usize,
    /// Items whose write failed.
    pub failed: usize,
}

#[async_trait]
pub trait NutritionCache: Send + Sync {
    /// Look up every name in one batch. Misses are simply absent.
    async fn fetch_many(&self, names: &[String]) -> Result<HashMap<String, NutritionEntry>>;

    /// Store every item, skipping duplicates and soft-deleted ingredients.
    async fn cache_many(&self, items: &[NutritionItem]) -> Result<CacheWriteSummary>;
}

/// Normalize and deduplicate a batch of names for lookup.
pub(crate) fn lookup_keys(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| normalize_name(n))
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}

/// Split a write batch into unique cacheable items and an invalid count.
pub(crate) fn prepare_batch(items: &[NutritionItem]) -> (Vec<&NutritionItem>, usize) {
    let mut seen = HashSet::new();
    let mut invalid = 0;
    let mut unique = Vec::new();
    for item in items {
        if !item.is_cacheable() {
            invalid += 1;
            continue;
        }
        let key = (
            item.normalized_name(),
            item.serving_size.to_bits(),
            item.serving_unit.trim().to_lowercase(),
        );
        if seen.insert(key) {
            unique.push(item);
        }
    }
    (unique, invalid)
}

/// Write `items` on a task owned by `background`. Failures are logged, never
/// returned.
pub fn spawn_cache_write(
    background: &TaskTracker,
    cache: Arc<dyn NutritionCache>,
    items: Vec<NutritionItem>,
) -> JoinHandle<()> {
    background.spawn(async move {
        if items.is_empty() {
            return;
        }
        match cache.cache_many(&items).await {
            Ok(summary) => debug!(
                items = items.len(),
                written = summary.written,
                duplicates = summary.duplicates,
                skipped_deleted = summary.skipped_deleted,
                failed = summary.failed,
                "nutrition cache write finished"
            ),
            Err(e) => warn!(items = items.len(), error = %e, "nutrition cache write failed"),
        }
    })
}

/// Fetch without failing: cache faults are logged and read as misses.
pub async fn fetch_or_empty(
    cache: &dyn NutritionCache,
    names: &[String],
) -> HashMap<String, NutritionEntry> {
    match cache.fetch_many(names).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(names = names.len(), error = %e, "nutrition cache lookup failed");
            HashMap::new()
        }
    }
}
