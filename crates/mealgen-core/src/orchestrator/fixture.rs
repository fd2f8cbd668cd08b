//! The recorded plan returned in fixture mode.

use anyhow::Context;
use serde::Deserialize;

use crate::error::GenerationError;
use crate::model::meal::{assemble_days, replicate_day};
use crate::model::{
    CoreIngredients, DayOfWeek, GeneratedPlan, GroceryItem, Meal, MealSlot, PrepSchedule,
};

const SAMPLE_PLAN: &str = include_str!("../../fixtures/sample_plan.json");

#[derive(Debug, Deserialize)]
struct FixturePlan {
    title: String,
    core_ingredients: CoreIngredients,
    /// One representative day, in slot order.
    meals: Vec<Meal>,
    grocery_list: Vec<GroceryItem>,
    prep_schedule: PrepSchedule,
}

fn parse() -> Result<FixturePlan, GenerationError> {
    let plan = serde_json::from_str(SAMPLE_PLAN).context("bundled fixture plan is invalid")?;
    Ok(plan)
}

/// The recorded plan expanded to seven days.
pub fn sample_plan() -> Result<GeneratedPlan, GenerationError> {
    let fixture = parse()?;
    let slots: Vec<MealSlot> = fixture
        .meals
        .iter()
        .map(|m| MealSlot {
            meal_type: m.meal_type,
            label: m.slot.clone(),
        })
        .collect();
    let day = assemble_days(&fixture.meals, &slots, &[DayOfWeek::Monday])
        .map_err(|e| anyhow::anyhow!("bundled fixture plan is invalid: {e}"))?;
    let days = day.first().map(replicate_day).unwrap_or_default();

    Ok(GeneratedPlan {
        title: fixture.title,
        days,
        grocery_list: fixture.grocery_list,
        core_ingredients: fixture.core_ingredients,
        prep_schedule: fixture.prep_schedule,
    })
}

/// The recorded prep schedule alone.
pub fn sample_prep_schedule() -> Result<PrepSchedule, GenerationError> {
    Ok(parse()?.prep_schedule)
}
