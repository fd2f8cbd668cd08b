//! Database query functions for the `meal_plans` and `plan_meals` tables.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{MealPlanRow, PlanMealRow};

/// Parameters for inserting a plan.
#[derive(Debug, Clone)]
pub struct NewMealPlan {
    pub user_id: Uuid,
    pub title: String,
    pub profile: Value,
    pub core_ingredients: Value,
    pub grocery_list: Value,
    pub prep_schedule: Option<Value>,
}

/// Parameters for inserting one meal occurrence.
#[derive(Debug, Clone)]
pub struct NewPlanMeal {
    pub day: String,
    pub position: i32,
    pub meal_type: String,
    pub slot: String,
    pub name: String,
    pub meal: Value,
}

/// Insert a plan and all of its meals in one transaction.
///
/// Either the whole plan is stored or nothing is.
pub async fn insert_plan_with_meals(
    pool: &PgPool,
    plan: &NewMealPlan,
    meals: &[NewPlanMeal],
) -> Result<MealPlanRow> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let row = sqlx::query_as::<_, MealPlanRow>(
        "INSERT INTO meal_plans \
             (user_id, title, profile, core_ingredients, grocery_list, prep_schedule) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(plan.user_id)
    .bind(&plan.title)
    .bind(&plan.profile)
    .bind(&plan.core_ingredients)
    .bind(&plan.grocery_list)
    .bind(&plan.prep_schedule)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert meal plan")?;

    for meal in meals {
        sqlx::query(
            "INSERT INTO plan_meals (plan_id, day, position, meal_type, slot, name, meal) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(&meal.day)
        .bind(meal.position)
        .bind(&meal.meal_type)
        .bind(&meal.slot)
        .bind(&meal.name)
        .bind(&meal.meal)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert meal {:?} on {}", meal.name, meal.day))?;
    }

    tx.commit().await.context("failed to commit meal plan")?;

    Ok(row)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<MealPlanRow>> {
    let plan = sqlx::query_as::<_, MealPlanRow>("SELECT * FROM meal_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch meal plan")?;

    Ok(plan)
}

/// List a user's plans, newest first.
pub async fn list_plans_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<MealPlanRow>> {
    let plans = sqlx::query_as::<_, MealPlanRow>(
        "SELECT * FROM meal_plans WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list meal plans for user {user_id}"))?;

    Ok(plans)
}

/// List the meals of a plan in schedule order.
///
/// Day ordering is applied by the caller; rows come back grouped by day
/// name and ordered by position within a day.
pub async fn list_meals_for_plan(pool: &PgPool, plan_id: Uuid) -> Result<Vec<PlanMealRow>> {
    let meals = sqlx::query_as::<_, PlanMealRow>(
        "SELECT * FROM plan_meals WHERE plan_id = $1 ORDER BY day, position",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list meals for plan {plan_id}"))?;

    Ok(meals)
}

/// Replace the stored prep schedule of a plan.
pub async fn update_prep_schedule(pool: &PgPool, plan_id: Uuid, prep_schedule: &Value) -> Result<()> {
    let result = sqlx::query("UPDATE meal_plans SET prep_schedule = $1 WHERE id = $2")
        .bind(prep_schedule)
        .bind(plan_id)
        .execute(pool)
        .await
        .context("failed to update prep schedule")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("meal plan {plan_id} not found");
    }

    Ok(())
}
