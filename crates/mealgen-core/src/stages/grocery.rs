//! Stage 3a: consolidate the week's meals into a shopping list.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::client::{CallSpec, GenerationClient, PromptKind};
use crate::error::GenerationError;
use crate::model::{Category, CoreIngredients, DayPlan, GroceryCategory, GroceryItem, UserProfile};
use crate::nutrition::{self, NutritionCache, normalize_name};

pub const MAX_TOKENS: u32 = 8_192;

/// One ingredient's total need for the week in a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedItem {
    /// Display name as first seen in the meals.
    pub name: String,
    pub normalized_name: String,
    pub unit: String,
    /// Total quantity, scaled by household size.
    pub quantity: f64,
    /// Meal occurrences using the ingredient.
    pub uses: usize,
    pub roster_category: Option<Category>,
}

/// Sum ingredient amounts over the week by (normalized name, unit), each
/// occurrence scaled by the household multiplier of its day and meal type.
pub fn aggregate(
    days: &[DayPlan],
    core: &CoreIngredients,
    profile: &UserProfile,
) -> Vec<AggregatedItem> {
    let mut totals: BTreeMap<(String, String), AggregatedItem> = BTreeMap::new();
    for day in days {
        for meal in &day.meals {
            let multiplier = profile.household_multiplier(day.day, meal.meal_type);
            for ingredient in &meal.ingredients {
                let normalized = normalize_name(&ingredient.name);
                let unit = ingredient.unit.trim().to_lowercase();
                let item = totals
                    .entry((normalized.clone(), unit.clone()))
                    .or_insert_with(|| AggregatedItem {
                        name: ingredient.name.trim().to_owned(),
                        roster_category: core.category_of(&normalized),
                        normalized_name: normalized,
                        unit,
                        quantity: 0.0,
                        uses: 0,
                    });
                item.quantity += ingredient.amount * multiplier;
                item.uses += 1;
            }
        }
    }
    totals.into_values().collect()
}

pub(crate) fn format_quantity(q: f64) -> String {
    let rounded = (q * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded}")
    }
}

pub fn build_prompt(items: &[AggregatedItem], profile: &UserProfile) -> String {
    let mut prompt = String::with_capacity(2048 + items.len() * 64);
    prompt.push_str(
        "You are preparing a grocery list for one week of home cooking. \
         Below is everything the week's recipes use, already totalled",
    );
    if profile.household.is_some() {
        prompt.push_str(" and scaled for everyone in the household");
    }
    prompt.push_str(".\n\n## Weekly needs\n\n");
    for item in items {
        let category = item
            .roster_category
            .map_or_else(|| "seasoning".to_owned(), |c| c.to_string());
        prompt.push_str(&format!(
            "- {} {} {} ({category}, used {} times)\n",
            format_quantity(item.quantity),
            item.unit,
            item.name,
            item.uses
        ));
    }
    prompt.push_str(&format!(
        "\n## Output rules\n\n\
         - Merge lines that are the same food in different units into one purchase.\n\
         - Express quantities in the units a shopper buys (lb, bunch, dozen, bag, bottle, ...) \
           and never buy less than the week needs.\n\
         - Put the recipe amount in `note` when the purchase unit hides it.\n\
         - Seasonings the household likely owns may be listed once under pantry.\n\
         - `category` must be one of: {}.\n",
        GroceryCategory::ALL.map(|c| c.as_str()).join(", ")
    ));
    prompt
}

pub fn output_schema() -> Value {
    let categories: Vec<&str> = GroceryCategory::ALL.iter().map(GroceryCategory::as_str).collect();
    json!({
        "type": "object",
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "minLength": 1},
                        "quantity": {"type": "number", "exclusiveMinimum": 0},
                        "unit": {"type": "string", "minLength": 1},
                        "category": {"type": "string", "enum": categories},
                        "note": {"type": "string"}
                    },
                    "required": ["name", "quantity", "unit", "category"]
                }
            }
        },
        "required": ["items"]
    })
}

#[derive(Debug, Deserialize)]
struct RawGroceryList {
    items: Vec<RawGroceryItem>,
}

#[derive(Debug, Deserialize)]
struct RawGroceryItem {
    name: String,
    quantity: f64,
    unit: String,
    category: String,
    #[serde(default)]
    note: Option<String>,
}

fn validate(raw: RawGroceryList) -> Result<Vec<GroceryItem>, GenerationError> {
    raw.items
        .into_iter()
        .map(|item| {
            let category = GroceryCategory::from_str(item.category.trim())
                .map_err(GenerationError::Contract)?;
            if item.name.trim().is_empty() {
                return Err(GenerationError::contract("grocery item without a name"));
            }
            if !(item.quantity.is_finite() && item.quantity > 0.0) {
                return Err(GenerationError::contract(format!(
                    "grocery item {:?} has quantity {}",
                    item.name, item.quantity
                )));
            }
            Ok(GroceryItem {
                name: item.name.trim().to_owned(),
                quantity: item.quantity,
                unit: item.unit,
                category,
                note: item.note.filter(|n| !n.trim().is_empty()),
                nutrition: None,
            })
        })
        .collect()
}

/// Run the stage: aggregate, let the oracle phrase purchases, annotate with
/// cached nutrition.
pub async fn consolidate(
    client: &GenerationClient,
    cache: &dyn NutritionCache,
    model: &str,
    core: &CoreIngredients,
    days: &[DayPlan],
    profile: &UserProfile,
) -> Result<Vec<GroceryItem>, GenerationError> {
    let aggregated = aggregate(days, core, profile);
    if aggregated.is_empty() {
        return Ok(Vec::new());
    }

    let spec = CallSpec::new(
        PromptKind::Grocery,
        build_prompt(&aggregated, profile),
        output_schema(),
        model,
        MAX_TOKENS,
    );
    let raw: RawGroceryList = client.call(&spec).await?;
    let mut items = validate(raw)?;

    let names: Vec<String> = items.iter().map(|i| i.name.clone()).collect();
    let hits = nutrition::fetch_or_empty(cache, &names).await;
    for item in &mut items {
        if let Some(hit) = hits.get(&normalize_name(&item.name)) {
            item.nutrition = Some(hit.facts.clone());
        }
    }

    info!(
        caller = %client.caller(),
        needs = aggregated.len(),
        items = items.len(),
        annotated = items.iter().filter(|i| i.nutrition.is_some()).count(),
        "grocery list consolidated"
    );
    Ok(items)
}
