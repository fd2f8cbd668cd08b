//! `mealgen generate` and `mealgen regen-prep`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use mealgen_core::GenerationError;
use mealgen_core::client::{AuditSink, GenerationClient, PgAuditSink, TracingAuditSink};
use mealgen_core::model::{GeneratedPlan, GenerationOptions, PrepSchedule, UserProfile};
use mealgen_core::nutrition::PgNutritionCache;
use mealgen_core::oracle::HttpOracle;
use mealgen_core::orchestrator::{Orchestrator, Phase, ProgressEvent, TestMode};
use mealgen_core::service;

use crate::config::MealgenConfig;

pub struct GenerateArgs {
    pub profile: PathBuf,
    pub options: Option<PathBuf>,
    pub user: Option<String>,
    pub save: bool,
    pub output: Option<PathBuf>,
}

fn build_orchestrator(pool: &PgPool, config: &MealgenConfig) -> Result<Orchestrator> {
    if config.test_mode != TestMode::Fixture && config.oracle_config.api_key.is_none() {
        bail!(
            "oracle API key not found; set MEALGEN_ORACLE_API_KEY or run `mealgen init --api-key <key>`"
        );
    }
    let oracle = HttpOracle::new(config.oracle_config.clone())?;
    // Cache writes and audit inserts share one tracker so a single drain
    // covers both before the pool closes.
    let background = TaskTracker::new();
    // Fixture runs never reach the oracle, so there is nothing to persist.
    let audit: Arc<dyn AuditSink> = match config.test_mode {
        TestMode::Fixture => Arc::new(TracingAuditSink),
        _ => Arc::new(PgAuditSink::new(pool.clone()).with_tracker(background.clone())),
    };
    let client = GenerationClient::new(Arc::new(oracle), audit);
    Ok(Orchestrator::new(
        client,
        Arc::new(PgNutritionCache::new(pool.clone())),
        config.models.clone(),
        config.test_mode,
    )
    .with_background(background))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {what} JSON from {}", path.display()))
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid {what}: {raw}"))
}

/// Lead with the user-facing reason, keep the detail as the cause.
fn run_failure(e: GenerationError) -> anyhow::Error {
    let reason = e.failure_reason();
    anyhow::Error::new(e).context(reason.user_message())
}

fn print_event(event: &ProgressEvent) {
    let marker = match event.phase {
        Phase::Started => "..",
        Phase::Completed => "ok",
    };
    println!("[{marker}] {:<11} {}", event.stage.as_str(), event.message);
}

fn print_plan(plan: &GeneratedPlan) {
    println!();
    println!("{}", plan.title);
    for day in &plan.days {
        let t = day.totals.rounded();
        println!(
            "  {:<9} {:>5} kcal  P {:>4} g  C {:>4} g  F {:>4} g",
            day.day.as_str(),
            t.calories,
            t.protein,
            t.carbs,
            t.fat
        );
        for meal in &day.meals {
            println!("      {:<10} {}", meal.slot, meal.name);
        }
    }
    println!("Grocery list: {} items", plan.grocery_list.len());
    for item in &plan.grocery_list {
        println!("  [{}] {} {} {}", item.category, item.quantity, item.unit, item.name);
    }
    print_prep(&plan.prep_schedule);
}

fn print_prep(schedule: &PrepSchedule) {
    println!(
        "Prep: {} sessions, {} minutes",
        schedule.sessions.len(),
        schedule.total_minutes()
    );
    for session in &schedule.sessions {
        println!(
            "  {} - {} ({} min)",
            session.day.as_str(),
            session.label,
            session.estimated_minutes
        );
        for task in &session.tasks {
            println!("    - {} [{} portions]", task.description, task.portions);
        }
    }
}

pub async fn run_generate(pool: &PgPool, config: &MealgenConfig, args: GenerateArgs) -> Result<()> {
    let profile: UserProfile = read_json(&args.profile, "profile")?;
    let options: GenerationOptions = match &args.options {
        Some(path) => read_json(path, "options")?,
        None => GenerationOptions::default(),
    };
    let user_id = match args.user.as_deref() {
        Some(raw) => parse_uuid(raw, "user ID")?,
        None => Uuid::nil(),
    };
    let orchestrator = build_orchestrator(pool, config)?;

    println!("Generating meal plan ({} mode)...", config.test_mode);

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let result = if args.save {
        service::generate_and_store(pool, &orchestrator, user_id, &profile, &options, &tx)
            .await
            .map(|stored| (Some(stored.id), stored.plan))
    } else {
        orchestrator
            .for_caller(user_id.to_string())
            .run_generation(&profile, &options, &tx)
            .await
            .map(|plan| (None, plan))
    };
    drop(tx);
    let _ = printer.await;
    orchestrator.drain().await;
    let (plan_id, plan) = result.map_err(run_failure)?;

    print_plan(&plan);

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write plan to {}", path.display()))?;
        println!("Plan written to {}", path.display());
    }
    if let Some(id) = plan_id {
        println!("Plan stored with ID {id}");
    }

    Ok(())
}

pub async fn run_regen_prep(
    pool: &PgPool,
    config: &MealgenConfig,
    plan_id: &str,
    user: &str,
) -> Result<()> {
    let plan_id = parse_uuid(plan_id, "plan ID")?;
    let user_id = parse_uuid(user, "user ID")?;
    let orchestrator = build_orchestrator(pool, config)?;

    let result =
        service::regenerate_prep_for_existing_plan(pool, &orchestrator, plan_id, user_id).await;
    orchestrator.drain().await;
    let schedule = result.map_err(run_failure)?;

    println!("Prep schedule regenerated for plan {plan_id}.");
    print_prep(&schedule);
    Ok(())
}
