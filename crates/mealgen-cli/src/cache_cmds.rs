//! `mealgen cache` and `mealgen ingredient` subcommands.

use anyhow::{Result, bail};
use sqlx::PgPool;

use mealgen_core::normalize_name;
use mealgen_core::nutrition::{NutritionCache, PgNutritionCache};
use mealgen_db::queries::ingredients;

use crate::{CacheCommands, IngredientCommands};

pub async fn run_cache_command(command: CacheCommands, pool: &PgPool) -> Result<()> {
    match command {
        CacheCommands::Lookup { names } => cmd_lookup(pool, &names).await,
    }
}

pub async fn run_ingredient_command(command: IngredientCommands, pool: &PgPool) -> Result<()> {
    match command {
        IngredientCommands::Delete { name } => cmd_delete(pool, &name).await,
    }
}

async fn cmd_lookup(pool: &PgPool, names: &[String]) -> Result<()> {
    let cache = PgNutritionCache::new(pool.clone());
    let hits = cache.fetch_many(names).await?;

    for name in names {
        let key = normalize_name(name);
        match hits.get(&key) {
            Some(entry) => {
                let m = entry.facts.macros;
                println!(
                    "{key}: {} {} = {:.0} kcal, {:.1} g protein, {:.1} g carbs, {:.1} g fat ({})",
                    entry.facts.serving_size,
                    entry.facts.serving_unit,
                    m.calories,
                    m.protein,
                    m.carbs,
                    m.fat,
                    entry.source
                );
            }
            None => {
                let deleted = ingredients::find_deleted(pool, &key).await?.is_some();
                if deleted {
                    println!("{key}: deleted");
                } else {
                    println!("{key}: not cached");
                }
            }
        }
    }
    Ok(())
}

async fn cmd_delete(pool: &PgPool, name: &str) -> Result<()> {
    let key = normalize_name(name);
    if key.is_empty() {
        bail!("ingredient name is empty");
    }
    if ingredients::soft_delete(pool, &key).await? {
        println!("Ingredient {key:?} deleted. The pipeline will no longer cache it.");
    } else if ingredients::find_deleted(pool, &key).await?.is_some() {
        println!("Ingredient {key:?} was already deleted.");
    } else {
        bail!("no active ingredient named {key:?}");
    }
    Ok(())
}
