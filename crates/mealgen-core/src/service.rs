//! Plan service: runs the orchestrator and keeps persisted plans in step.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use mealgen_db::models::PlanMealRow;
use mealgen_db::queries::plans::{self, NewMealPlan, NewPlanMeal};

use crate::error::GenerationError;
use crate::model::{
    CoreIngredients, DayOfWeek, DayPlan, GeneratedPlan, GenerationOptions, Meal, PrepSchedule,
    UserProfile,
};
use crate::orchestrator::{Orchestrator, ProgressSink};

/// A generated plan together with the id it was stored under.
#[derive(Debug, Clone)]
pub struct StoredPlan {
    pub id: Uuid,
    pub plan: GeneratedPlan,
}

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<Value, GenerationError> {
    let json = serde_json::to_value(value).with_context(|| format!("failed to encode {what}"))?;
    Ok(json)
}

/// Flatten a week into plan_meals rows, one per meal occurrence.
fn plan_meal_rows(days: &[DayPlan]) -> Result<Vec<NewPlanMeal>, GenerationError> {
    let mut rows = Vec::new();
    for day in days {
        for (position, meal) in day.meals.iter().enumerate() {
            rows.push(NewPlanMeal {
                day: day.day.as_str().to_owned(),
                position: i32::try_from(position).context("meal position out of range")?,
                meal_type: meal.meal_type.as_str().to_owned(),
                slot: meal.slot.clone(),
                name: meal.name.clone(),
                meal: to_json(meal, "meal")?,
            });
        }
    }
    Ok(rows)
}

/// Rebuild the week from stored rows, Monday first.
fn days_from_rows(rows: Vec<PlanMealRow>) -> Result<Vec<DayPlan>, GenerationError> {
    let mut by_day: BTreeMap<DayOfWeek, Vec<(i32, Meal)>> = BTreeMap::new();
    for row in rows {
        let day: DayOfWeek = row
            .day
            .parse()
            .map_err(|e: String| anyhow::anyhow!("stored meal {}: {e}", row.id))?;
        let meal: Meal = serde_json::from_value(row.meal)
            .with_context(|| format!("stored meal {} is not a valid meal", row.id))?;
        by_day.entry(day).or_default().push((row.position, meal));
    }

    Ok(by_day
        .into_iter()
        .map(|(day, mut meals)| {
            meals.sort_by_key(|(position, _)| *position);
            DayPlan::new(day, meals.into_iter().map(|(_, meal)| meal).collect())
        })
        .collect())
}

/// Run a generation and persist the plan with its meals.
///
/// Nothing is written unless the whole run succeeds; the plan and its meals
/// are inserted in one transaction.
pub async fn generate_and_store(
    pool: &PgPool,
    orchestrator: &Orchestrator,
    user_id: Uuid,
    profile: &UserProfile,
    options: &GenerationOptions,
    progress: &dyn ProgressSink,
) -> Result<StoredPlan, GenerationError> {
    let plan = orchestrator
        .for_caller(user_id.to_string())
        .run_generation(profile, options, progress)
        .await?;

    let new_plan = NewMealPlan {
        user_id,
        title: plan.title.clone(),
        profile: to_json(profile, "profile")?,
        core_ingredients: to_json(&plan.core_ingredients, "core ingredients")?,
        grocery_list: to_json(&plan.grocery_list, "grocery list")?,
        prep_schedule: Some(to_json(&plan.prep_schedule, "prep schedule")?),
    };
    let meals = plan_meal_rows(&plan.days)?;
    let row = plans::insert_plan_with_meals(pool, &new_plan, &meals).await?;

    info!(plan_id = %row.id, %user_id, meals = meals.len(), "meal plan stored");
    Ok(StoredPlan { id: row.id, plan })
}

/// Re-derive the prep schedule of a stored plan from its meals and save it.
pub async fn regenerate_prep_for_existing_plan(
    pool: &PgPool,
    orchestrator: &Orchestrator,
    plan_id: Uuid,
    user_id: Uuid,
) -> Result<PrepSchedule, GenerationError> {
    let row = plans::get_plan(pool, plan_id)
        .await?
        .ok_or(GenerationError::NotFound(plan_id))?;
    if row.user_id != user_id {
        return Err(GenerationError::Unauthorized);
    }

    let profile: UserProfile =
        serde_json::from_value(row.profile).context("stored profile is not valid")?;
    let core: CoreIngredients = serde_json::from_value(row.core_ingredients)
        .context("stored core ingredients are not valid")?;
    let days = days_from_rows(plans::list_meals_for_plan(pool, plan_id).await?)?;

    let schedule = orchestrator
        .for_caller(user_id.to_string())
        .regenerate_prep(&days, &core, &profile)
        .await?;
    plans::update_prep_schedule(pool, plan_id, &to_json(&schedule, "prep schedule")?).await?;

    info!(%plan_id, sessions = schedule.sessions.len(), "prep schedule regenerated");
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::fixture;

    #[test]
    fn rows_roundtrip_through_days() {
        let plan = fixture::sample_plan().unwrap();
        let rows = plan_meal_rows(&plan.days).unwrap();
        assert_eq!(rows.len(), 28);
        assert_eq!(rows[0].day, "monday");
        assert_eq!(rows[3].position, 3);

        // Stored rows are grouped by day name, not weekday; positions reversed too.
        let mut stored: Vec<PlanMealRow> = rows
            .into_iter()
            .map(|r| PlanMealRow {
                id: Uuid::new_v4(),
                plan_id: Uuid::nil(),
                day: r.day,
                position: r.position,
                meal_type: r.meal_type,
                slot: r.slot,
                name: r.name,
                meal: r.meal,
            })
            .collect();
        stored.sort_by(|a, b| a.day.cmp(&b.day).then(b.position.cmp(&a.position)));

        let days = days_from_rows(stored).unwrap();
        assert_eq!(days, plan.days);
    }

    #[test]
    fn unknown_day_is_a_storage_error() {
        let row = PlanMealRow {
            id: Uuid::nil(),
            plan_id: Uuid::nil(),
            day: "funday".to_owned(),
            position: 0,
            meal_type: "lunch".to_owned(),
            slot: "lunch".to_owned(),
            name: "x".to_owned(),
            meal: serde_json::json!({}),
        };
        let err = days_from_rows(vec![row]).unwrap_err();
        assert!(matches!(err, GenerationError::Storage(_)));
    }
}
