//! In-process nutrition cache with the same soft-delete semantics as the
//! Postgres cache.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{
    CacheWriteSummary, NutritionCache, NutritionEntry, NutritionItem, NutritionSource,
    lookup_keys, normalize_name, prepare_batch,
};
use crate::model::NutritionFacts;

#[derive(Debug, Default)]
struct State {
    /// normalized name -> deleted flag
    ingredients: HashMap<String, bool>,
    /// Insertion-ordered rows.
    entries: Vec<NutritionEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryNutritionCache {
    state: Mutex<State>,
}

impl MemoryNutritionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark an ingredient deleted. Returns `true` if an active one existed.
    pub fn soft_delete(&self, name: &str) -> bool {
        let mut state = self.lock();
        match state.ingredients.get_mut(&normalize_name(name)) {
            Some(deleted) if !*deleted => {
                *deleted = true;
                true
            }
            _ => false,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn entries_for(&self, name: &str) -> Vec<NutritionEntry> {
        let normalized = normalize_name(name);
        self.lock()
            .entries
            .iter()
            .filter(|e| e.normalized_name == normalized)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NutritionCache for MemoryNutritionCache {
    async fn fetch_many(&self, names: &[String]) -> Result<HashMap<String, NutritionEntry>> {
        let state = self.lock();
        let mut hits = HashMap::new();
        for key in lookup_keys(names) {
            if state.ingredients.get(&key) != Some(&false) {
                continue;
            }
            // Reference values first, then oldest.
            let best = state
                .entries
                .iter()
                .filter(|e| e.normalized_name == key)
                .min_by_key(|e| e.source != NutritionSource::Reference);
            if let Some(entry) = best {
                hits.insert(key, entry.clone());
            }
        }
        Ok(hits)
    }

    async fn cache_many(&self, items: &[NutritionItem]) -> Result<CacheWriteSummary> {
        let (unique, invalid) = prepare_batch(items);
        let mut summary = CacheWriteSummary {
            skipped_invalid: invalid,
            ..Default::default()
        };

        let mut state = self.lock();
        for item in unique {
            let normalized = item.normalized_name();
            let deleted = *state.ingredients.entry(normalized.clone()).or_insert(false);
            if deleted {
                summary.skipped_deleted += 1;
                continue;
            }
            let unit = item.serving_unit.trim().to_lowercase();
            let exists = state.entries.iter().any(|e| {
                e.normalized_name == normalized
                    && e.facts.serving_size == item.serving_size
                    && e.facts.serving_unit == unit
            });
            if exists {
                summary.duplicates += 1;
                continue;
            }
            state.entries.push(NutritionEntry {
                normalized_name: normalized,
                facts: NutritionFacts {
                    serving_size: item.serving_size,
                    serving_unit: unit,
                    macros: item.macros,
                },
                source: item.source,
            });
            summary.written += 1;
        }
        Ok(summary)
    }
}
