//! Stage 3b: turn the week's meals into a batch-cooking schedule.
//!
//! Batch sizes are given to the oracle in cached servings where the nutrition
//! cache knows the ingredient in the unit the meals use.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Value, json};
use tracing::info;

use super::grocery::{self, format_quantity};
use super::join_or_none;
use crate::client::{CallSpec, GenerationClient, PromptKind};
use crate::error::GenerationError;
use crate::model::{
    CoreIngredients, DayOfWeek, DayPlan, NutritionFacts, PrepSchedule, UserProfile,
};
use crate::nutrition::{self, NutritionCache, NutritionEntry, normalize_name};

pub const MAX_TOKENS: u32 = 8_192;

/// Distinct meals of the week with the portions each needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepNeed {
    pub name: String,
    pub prep_time_minutes: u32,
    pub days: Vec<DayOfWeek>,
    /// Household-scaled portions, rounded up.
    pub portions: u32,
}

pub fn prep_needs(days: &[DayPlan], profile: &UserProfile) -> Vec<PrepNeed> {
    let mut needs: BTreeMap<String, (PrepNeed, f64)> = BTreeMap::new();
    for day in days {
        for meal in &day.meals {
            let (need, portions) = needs
                .entry(normalize_name(&meal.name))
                .or_insert_with(|| {
                    (
                        PrepNeed {
                            name: meal.name.clone(),
                            prep_time_minutes: meal.prep_time_minutes,
                            days: Vec::new(),
                            portions: 0,
                        },
                        0.0,
                    )
                });
            need.days.push(day.day);
            *portions += profile.household_multiplier(day.day, meal.meal_type);
        }
    }
    needs
        .into_values()
        .map(|(mut need, portions)| {
            need.portions = portions.ceil() as u32;
            need
        })
        .collect()
}

/// Weekly total of one roster ingredient in one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuantity {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    /// Cached serving in the same unit, when known.
    pub reference: Option<NutritionFacts>,
}

impl BatchQuantity {
    pub fn servings(&self) -> Option<f64> {
        self.reference
            .as_ref()
            .map(|r| self.quantity / r.serving_size)
    }
}

/// Household-scaled roster totals for the week. Seasonings are left out.
pub fn batch_quantities(
    days: &[DayPlan],
    core: &CoreIngredients,
    profile: &UserProfile,
    reference: &HashMap<String, NutritionEntry>,
) -> Vec<BatchQuantity> {
    grocery::aggregate(days, core, profile)
        .into_iter()
        .filter(|item| item.roster_category.is_some())
        .map(|item| {
            let reference = reference
                .get(&item.normalized_name)
                .map(|hit| &hit.facts)
                .filter(|facts| {
                    facts.serving_size > 0.0
                        && facts.serving_unit.trim().eq_ignore_ascii_case(&item.unit)
                })
                .cloned();
            BatchQuantity {
                name: item.name,
                quantity: item.quantity,
                unit: item.unit,
                reference,
            }
        })
        .collect()
}

pub fn build_prompt(
    needs: &[PrepNeed],
    batches: &[BatchQuantity],
    core: &CoreIngredients,
    profile: &UserProfile,
) -> String {
    let mut prompt = String::with_capacity(2048 + needs.len() * 96);
    prompt.push_str(
        "You are planning batch-cooking sessions so a busy household can cook a week of meals \
         in as few sessions as possible.\n\n## Meals\n\n",
    );
    for need in needs {
        let days: Vec<&str> = need.days.iter().map(DayOfWeek::as_str).collect();
        prompt.push_str(&format!(
            "- {} ({} min): {} portions, eaten {}\n",
            need.name,
            need.prep_time_minutes,
            need.portions,
            days.join(", ")
        ));
    }

    let roster: Vec<&str> = core.all_names().collect();
    prompt.push_str(&format!("\n## Ingredients\n\n{}\n\n", join_or_none(&roster)));

    if !batches.is_empty() {
        prompt.push_str("## Batch quantities for the week\n\n");
        for batch in batches {
            prompt.push_str(&format!(
                "- {} {} {}",
                format_quantity(batch.quantity),
                batch.unit,
                batch.name
            ));
            if let (Some(servings), Some(reference)) = (batch.servings(), &batch.reference) {
                prompt.push_str(&format!(
                    " (about {} servings of {} {})",
                    format_quantity(servings.ceil()),
                    format_quantity(reference.serving_size),
                    reference.serving_unit
                ));
            }
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    let restrictions: Vec<&str> = profile
        .dietary_restrictions
        .iter()
        .map(|r| r.describe())
        .collect();
    if !restrictions.is_empty() {
        prompt.push_str(&format!("## Restrictions\n\n{}\n\n", restrictions.join("; ")));
    }

    prompt.push_str(
        "## Output rules\n\n\
         - Group shared work (washing, chopping, cooking grains, roasting proteins) into sessions.\n\
         - Each task lists the exact meal names above that it serves.\n\
         - `portions` is the number of servings the task produces.\n\
         - Size each batch from the weekly quantities above.\n\
         - Note storage and how long food keeps; schedule a mid-week session if food would not keep.\n",
    );
    prompt
}

pub fn output_schema() -> Value {
    let days: Vec<&str> = DayOfWeek::ALL.iter().map(DayOfWeek::as_str).collect();
    json!({
        "type": "object",
        "properties": {
            "sessions": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "day": {"type": "string", "enum": days},
                        "label": {"type": "string"},
                        "estimated_minutes": {"type": "integer", "minimum": 0},
                        "tasks": {
                            "type": "array",
                            "minItems": 1,
                            "items": {
                                "type": "object",
                                "properties": {
                                    "description": {"type": "string", "minLength": 1},
                                    "meals": {"type": "array", "items": {"type": "string"}},
                                    "portions": {"type": "integer", "minimum": 0},
                                    "storage": {"type": "string"}
                                },
                                "required": ["description", "meals"]
                            }
                        }
                    },
                    "required": ["day", "label", "estimated_minutes", "tasks"]
                }
            },
            "tips": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["sessions"]
    })
}

/// Every meal a task references must exist in the week.
pub fn validate(schedule: &PrepSchedule, needs: &[PrepNeed]) -> Result<(), GenerationError> {
    if schedule.sessions.is_empty() {
        return Err(GenerationError::contract("prep schedule has no sessions"));
    }
    let known: HashSet<String> = needs.iter().map(|n| normalize_name(&n.name)).collect();
    for meal in schedule.referenced_meals() {
        if !known.contains(&normalize_name(meal)) {
            return Err(GenerationError::contract(format!(
                "prep task references unknown meal {meal:?}"
            )));
        }
    }
    Ok(())
}

/// Run the stage. Cache faults only cost the serving annotations.
pub async fn schedule(
    client: &GenerationClient,
    cache: &dyn NutritionCache,
    model: &str,
    days: &[DayPlan],
    core: &CoreIngredients,
    profile: &UserProfile,
) -> Result<PrepSchedule, GenerationError> {
    let needs = prep_needs(days, profile);
    if needs.is_empty() {
        return Ok(PrepSchedule::default());
    }

    let roster: Vec<String> = core.all_names().map(str::to_owned).collect();
    let reference = nutrition::fetch_or_empty(cache, &roster).await;
    let batches = batch_quantities(days, core, profile, &reference);

    let spec = CallSpec::new(
        PromptKind::Prep,
        build_prompt(&needs, &batches, core, profile),
        output_schema(),
        model,
        MAX_TOKENS,
    );
    let schedule: PrepSchedule = client.call(&spec).await?;
    validate(&schedule, &needs)?;

    info!(
        caller = %client.caller(),
        sessions = schedule.sessions.len(),
        minutes = schedule.total_minutes(),
        sized_from_cache = batches.iter().filter(|b| b.reference.is_some()).count(),
        "prep schedule written"
    );
    Ok(schedule)
}
