//! Stage 2: synthesize the week's meals from the roster.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::task::TaskTracker;
use tracing::info;

use super::{MACRO_TOLERANCE, describe_macros, join_or_none, macro_properties};
use crate::client::{CallSpec, GenerationClient, PromptKind};
use crate::error::GenerationError;
use crate::model::meal::assemble_days;
use crate::model::{
    Category, Complexity, Consistency, CoreIngredients, DayOfWeek, DayPlan, GenerationOptions, Meal, MealDay,
    MealSlot, MealType, UserProfile,
};
use crate::nutrition::{
    self, NutritionCache, NutritionEntry, NutritionItem, NutritionSource, normalize_name,
    spawn_cache_write,
};

pub const MAX_TOKENS_WEEK: u32 = 32_000;
pub const MAX_TOKENS_SINGLE_DAY: u32 = 8_192;

/// Basic seasonings usable in any meal without being on the roster.
pub const SEASONINGS: &[&str] = &[
    "salt",
    "black pepper",
    "water",
    "garlic powder",
    "onion powder",
    "paprika",
    "cumin",
    "chili flakes",
    "dried oregano",
    "dried basil",
    "cinnamon",
    "vinegar",
    "lemon juice",
];

/// How many days the oracle is asked to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySpan {
    Week,
    /// One representative Monday, replicated by the orchestrator.
    SingleDay,
}

const SINGLE_DAY: [DayOfWeek; 1] = [DayOfWeek::Monday];

impl DaySpan {
    pub fn days(&self) -> &'static [DayOfWeek] {
        match self {
            Self::Week => &DayOfWeek::ALL,
            Self::SingleDay => &SINGLE_DAY,
        }
    }

    pub const fn max_tokens(&self) -> u32 {
        match self {
            Self::Week => MAX_TOKENS_WEEK,
            Self::SingleDay => MAX_TOKENS_SINGLE_DAY,
        }
    }
}

/// Inputs of one synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct MealRequest<'a> {
    pub profile: &'a UserProfile,
    pub core: &'a CoreIngredients,
    pub options: &'a GenerationOptions,
    pub span: DaySpan,
}

impl MealRequest<'_> {
    /// How many meals one slot produces.
    fn meals_for(&self, slot: &MealSlot) -> usize {
        match (self.span, self.profile.consistency_for(slot.meal_type)) {
            (DaySpan::SingleDay, _) | (DaySpan::Week, Consistency::Consistent) => 1,
            (DaySpan::Week, Consistency::Varied) => 7,
        }
    }

    pub fn expected_meal_count(&self) -> usize {
        self.profile.slots().iter().map(|s| self.meals_for(s)).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizedMeals {
    pub title: String,
    pub meals: Vec<Meal>,
}

/// Validated stage output, already laid out by day.
#[derive(Debug, Clone)]
pub struct MealSynthesis {
    pub title: String,
    pub meals: Vec<Meal>,
    pub days: Vec<DayPlan>,
}

pub fn is_seasoning(name: &str) -> bool {
    let normalized = normalize_name(name);
    SEASONINGS.iter().any(|s| *s == normalized)
}

pub fn is_allowed_ingredient(name: &str, core: &CoreIngredients) -> bool {
    core.contains(name) || is_seasoning(name)
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

const ROLE: &str = "You are a registered dietitian writing a meal plan. \
Every meal must be cookable from the ingredient roster below.\n\n";

const PRIORITIES: &str = "## Priorities (highest first)\n\n\
1. Ingredient macros must match standard reference nutrition data for the stated amount. \
Never invent or adjust values to hit a target.\n\
2. Each meal's totals must equal the exact sum of its ingredient macros.\n\
3. Daily totals should approach the targets. An honest plan that falls short of a target \
is better than one with inaccurate numbers.\n\n";

fn roster_section(core: &CoreIngredients) -> String {
    let mut section = String::from("## Ingredient roster (non-negotiable)\n\n");
    section.push_str(
        "Use ONLY these ingredients. This rule outranks every calorie and macro target.\n",
    );
    for category in Category::ALL {
        let names: Vec<&str> = core.bucket(category).iter().map(|c| c.name()).collect();
        section.push_str(&format!("- {category}: {}\n", join_or_none(&names)));
    }
    section.push_str(&format!(
        "\nBasic seasonings allowed in any meal: {}.\n\n",
        SEASONINGS.join(", ")
    ));
    section
}

fn slot_instruction(request: &MealRequest<'_>, slot: &MealSlot) -> String {
    let profile = request.profile;
    let complexity = profile.complexity_for(slot.meal_type);
    let count = match (request.span, profile.consistency_for(slot.meal_type)) {
        (DaySpan::SingleDay, _) => "exactly 1 meal with day \"monday\"".to_owned(),
        (DaySpan::Week, Consistency::Consistent) => {
            "exactly 1 meal with day \"every_day\"; the same meal is eaten all 7 days".to_owned()
        }
        (DaySpan::Week, Consistency::Varied) => {
            "exactly 7 distinct meals, one for each day monday through sunday".to_owned()
        }
    };
    format!(
        "- slot `{}` (meal_type {}): {count}. Complexity {}.\n",
        slot.label,
        slot.meal_type,
        complexity.guidance()
    )
}

/// Build the meal-synthesis prompt.
pub fn build_prompt(
    request: &MealRequest<'_>,
    reference: &HashMap<String, NutritionEntry>,
) -> String {
    let profile = request.profile;
    let slots = profile.slots();
    let mut prompt = String::with_capacity(8192);
    prompt.push_str(ROLE);
    prompt.push_str(&roster_section(request.core));
    prompt.push_str(PRIORITIES);

    prompt.push_str("## Targets\n\n");
    prompt.push_str(&format!(
        "- Daily: {}\n- Per slot ({} slots per day): {}\n\n",
        describe_macros(&profile.targets),
        slots.len(),
        describe_macros(&profile.per_slot_targets())
    ));

    if !profile.dietary_restrictions.is_empty() {
        prompt.push_str("## Dietary restrictions\n\n");
        for r in &profile.dietary_restrictions {
            prompt.push_str(&format!("- {}\n", r.describe()));
        }
        prompt.push('\n');
    }

    prompt.push_str("## Meals to write\n\n");
    for slot in &slots {
        prompt.push_str(&slot_instruction(request, slot));
    }
    if slots.iter().filter(|s| s.meal_type == MealType::Snack).count() > 1 {
        prompt.push_str(
            "Snack slots are distinct: label each snack with its own slot value \
             and do not repeat a snack across slots on the same day.\n",
        );
    }
    prompt.push_str(&format!(
        "Write {} meals in total.\n\n",
        request.expected_meal_count()
    ));

    let options = request.options;
    if !options.liked_meals.is_empty() || !options.disliked_meals.is_empty() {
        prompt.push_str("## Preferences\n\n");
        prompt.push_str(&format!("- Enjoys: {}\n", join_or_none(&options.liked_meals)));
        prompt.push_str(&format!(
            "- Do not repeat or imitate: {}\n\n",
            join_or_none(&options.disliked_meals)
        ));
    }
    if let Some(theme) = &options.theme {
        prompt.push_str(&format!(
            "## Theme\n\nKeep the meals in a {} style. {}\n\n",
            theme.name, theme.description
        ));
    }
    if let Some(focus) = &options.protein_focus {
        prompt.push_str(&format!(
            "## Protein focus\n\nEvery {} must be built around {}.\n\n",
            focus.meal_type, focus.protein
        ));
    }

    if !reference.is_empty() {
        prompt.push_str("## Validated nutrition\n\n");
        prompt.push_str("Use these values, scaled to the amount used:\n");
        let mut names: Vec<&String> = reference.keys().collect();
        names.sort();
        for name in names {
            let facts = &reference[name].facts;
            prompt.push_str(&format!(
                "- {name}: {} {} = {}\n",
                facts.serving_size,
                facts.serving_unit,
                describe_macros(&facts.macros)
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "## Output rules\n\n\
         - Give every ingredient an amount, a unit and its macros for that amount.\n\
         - Use the roster's ingredient names exactly as written.\n\
         - Keep instructions short and ordered.\n",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

pub fn output_schema(request: &MealRequest<'_>) -> Value {
    let slots = request.profile.slots();
    let labels: Vec<&str> = slots.iter().map(|s| s.label.as_str()).collect();
    let mut meal_types: Vec<&str> = slots.iter().map(|s| s.meal_type.as_str()).collect();
    meal_types.dedup();
    let days: Vec<&str> = match request.span {
        DaySpan::SingleDay => vec![MealDay::Monday.as_str()],
        DaySpan::Week => {
            let mut days = vec![MealDay::EveryDay.as_str()];
            days.extend(DayOfWeek::ALL.iter().map(DayOfWeek::as_str));
            days
        }
    };

    let mut ingredient_props = macro_properties();
    ingredient_props.insert("name".into(), json!({"type": "string", "minLength": 1}));
    ingredient_props.insert("amount".into(), json!({"type": "number", "exclusiveMinimum": 0}));
    ingredient_props.insert("unit".into(), json!({"type": "string", "minLength": 1}));

    let count = request.expected_meal_count();
    json!({
        "type": "object",
        "properties": {
            "title": {"type": "string", "minLength": 1},
            "meals": {
                "type": "array",
                "minItems": count,
                "maxItems": count,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "minLength": 1},
                        "meal_type": {"type": "string", "enum": meal_types},
                        "slot": {"type": "string", "enum": labels},
                        "day": {"type": "string", "enum": days},
                        "prep_time_minutes": {"type": "integer", "minimum": 0},
                        "ingredients": {
                            "type": "array",
                            "minItems": 1,
                            "items": {
                                "type": "object",
                                "properties": ingredient_props,
                                "required": ["name", "amount", "unit", "calories", "protein", "carbs", "fat"]
                            }
                        },
                        "instructions": {"type": "array", "items": {"type": "string"}},
                        "totals": {
                            "type": "object",
                            "properties": macro_properties(),
                            "required": ["calories", "protein", "carbs", "fat"]
                        }
                    },
                    "required": ["name", "meal_type", "slot", "day", "prep_time_minutes",
                                 "ingredients", "instructions", "totals"]
                }
            }
        },
        "required": ["title", "meals"]
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Fail on any roster, arithmetic or coverage violation, then lay the meals
/// out by day.
pub fn validate(
    output: SynthesizedMeals,
    request: &MealRequest<'_>,
) -> Result<MealSynthesis, GenerationError> {
    let expected = request.expected_meal_count();
    if output.meals.len() != expected {
        return Err(GenerationError::contract(format!(
            "expected {expected} meals, got {}",
            output.meals.len()
        )));
    }

    let slots = request.profile.slots();
    for meal in &output.meals {
        let slot = slots.iter().find(|s| s.label == meal.slot).ok_or_else(|| {
            GenerationError::contract(format!("meal {:?} uses unknown slot {:?}", meal.name, meal.slot))
        })?;

        let complexity = request.profile.complexity_for(slot.meal_type);
        if meal.prep_time_minutes > complexity.max_prep_minutes() {
            return Err(GenerationError::contract(format!(
                "meal {:?} takes {} minutes, over the {} minute limit for {} {}",
                meal.name,
                meal.prep_time_minutes,
                complexity.max_prep_minutes(),
                complexity.as_str(),
                slot.meal_type.as_str()
            )));
        }

        let consistent = request.profile.consistency_for(slot.meal_type) == Consistency::Consistent;
        match (request.span, consistent, meal.day) {
            (DaySpan::Week, true, day) if day != MealDay::EveryDay => {
                return Err(GenerationError::contract(format!(
                    "consistent slot {} has a meal tagged {}",
                    slot.label,
                    day.as_str()
                )));
            }
            (DaySpan::Week, false, MealDay::EveryDay) => {
                return Err(GenerationError::contract(format!(
                    "varied slot {} has a meal tagged every_day",
                    slot.label
                )));
            }
            _ => {}
        }

        for ingredient in &meal.ingredients {
            if !is_allowed_ingredient(&ingredient.name, request.core) {
                return Err(GenerationError::contract(format!(
                    "meal {:?} uses {:?}, which is not on the roster",
                    meal.name, ingredient.name
                )));
            }
            if !ingredient.macros.is_finite_non_negative() || !(ingredient.amount > 0.0) {
                return Err(GenerationError::contract(format!(
                    "meal {:?} has invalid values for {:?}",
                    meal.name, ingredient.name
                )));
            }
        }

        if !meal.totals_match(MACRO_TOLERANCE) {
            return Err(GenerationError::contract(format!(
                "meal {:?} reports {} but its ingredients sum to {}",
                meal.name,
                describe_macros(&meal.totals),
                describe_macros(&meal.ingredient_sum())
            )));
        }
    }

    let days = assemble_days(&output.meals, &slots, request.span.days())
        .map_err(GenerationError::Contract)?;

    Ok(MealSynthesis {
        title: output.title,
        meals: output.meals,
        days,
    })
}

/// Every unique roster (ingredient, amount, unit) observed in `meals`.
pub fn observed_nutrition(meals: &[Meal]) -> Vec<NutritionItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for ingredient in meals.iter().flat_map(|m| m.ingredients.iter()) {
        if is_seasoning(&ingredient.name) {
            continue;
        }
        let key = (
            normalize_name(&ingredient.name),
            ingredient.amount.to_bits(),
            ingredient.unit.trim().to_lowercase(),
        );
        if seen.insert(key) {
            items.push(NutritionItem {
                name: ingredient.name.clone(),
                serving_size: ingredient.amount,
                serving_unit: ingredient.unit.clone(),
                macros: ingredient.macros,
                source: NutritionSource::Estimated,
            });
        }
    }
    items
}

/// Run the stage. Observed nutrition is cached on a task owned by
/// `background`; the result never waits for it.
pub async fn synthesize(
    client: &GenerationClient,
    cache: Arc<dyn NutritionCache>,
    background: &TaskTracker,
    model: &str,
    request: &MealRequest<'_>,
) -> Result<MealSynthesis, GenerationError> {
    let roster: Vec<String> = request.core.all_names().map(str::to_owned).collect();
    let reference = nutrition::fetch_or_empty(cache.as_ref(), &roster).await;

    let spec = CallSpec::new(
        PromptKind::Meals,
        build_prompt(request, &reference),
        output_schema(request),
        model,
        request.span.max_tokens(),
    );
    let output: SynthesizedMeals = client.call(&spec).await?;
    let synthesis = validate(output, request)?;

    let observed = observed_nutrition(&synthesis.meals);
    info!(
        caller = %client.caller(),
        meals = synthesis.meals.len(),
        days = synthesis.days.len(),
        observed = observed.len(),
        "meals synthesized"
    );
    spawn_cache_write(background, cache, observed);
    Ok(synthesis)
}
