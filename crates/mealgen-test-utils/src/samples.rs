//! Sample profiles and canned oracle replies that pass stage validation.
//!
//! Meal totals are computed from their ingredient lines so the replies
//! always satisfy the totals invariant.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Value, json};

use mealgen_core::client::PromptKind;
use mealgen_core::model::{
    Consistency, CoreIngredients, DayOfWeek, Macros, MealType, UserProfile, VarietyCounts,
};

pub const INGREDIENTS_TOOL: &str = PromptKind::Ingredients.tool_name();
pub const MEALS_TOOL: &str = PromptKind::Meals.tool_name();
pub const GROCERY_TOOL: &str = PromptKind::Grocery.tool_name();
pub const PREP_TOOL: &str = PromptKind::Prep.tool_name();

/// Three meals and a snack per day, a consistent breakfast and the default
/// 4/4/3/2/2/2 roster.
pub fn weekly_profile() -> UserProfile {
    UserProfile {
        targets: Macros::new(2000.0, 150.0, 200.0, 67.0),
        dietary_restrictions: BTreeSet::new(),
        meal_types: vec![MealType::Breakfast, MealType::Lunch, MealType::Dinner],
        snack_count: 1,
        complexity: BTreeMap::new(),
        consistency: BTreeMap::from([(MealType::Breakfast, Consistency::Consistent)]),
        variety: VarietyCounts::default(),
        household: None,
    }
}

pub fn core() -> CoreIngredients {
    let names = |items: &[&str]| items.iter().map(|s| (*s).into()).collect();
    CoreIngredients {
        protein: names(&["chicken breast", "salmon", "eggs", "black beans"]),
        vegetable: names(&["broccoli", "spinach", "bell pepper", "zucchini"]),
        fruit: names(&["banana", "blueberries", "apple"]),
        grain: names(&["oats", "brown rice"]),
        fat: names(&["olive oil", "almonds"]),
        dairy: names(&["greek yogurt", "cheddar cheese"]),
    }
}

pub fn core_reply() -> Value {
    serde_json::to_value(core()).expect("core ingredients serialize")
}

/// (name, amount, unit, [calories, protein, carbs, fat])
pub type Line<'a> = (&'a str, f64, &'a str, [f64; 4]);

const CHICKEN: Line<'static> = ("chicken breast", 6.0, "oz", [280.0, 52.0, 0.0, 6.0]);
const SALMON: Line<'static> = ("salmon", 5.0, "oz", [290.0, 31.0, 0.0, 18.0]);
const EGGS: Line<'static> = ("eggs", 2.0, "large", [144.0, 12.0, 1.0, 10.0]);
const BEANS: Line<'static> = ("black beans", 0.5, "cup", [114.0, 8.0, 20.0, 0.0]);
const BROCCOLI: Line<'static> = ("broccoli", 150.0, "g", [51.0, 4.0, 10.0, 1.0]);
const SPINACH: Line<'static> = ("spinach", 60.0, "g", [14.0, 2.0, 2.0, 0.0]);
const PEPPER: Line<'static> = ("bell pepper", 1.0, "medium", [31.0, 1.0, 7.0, 0.0]);
const ZUCCHINI: Line<'static> = ("zucchini", 1.0, "medium", [33.0, 2.0, 6.0, 1.0]);
const BLUEBERRIES: Line<'static> = ("blueberries", 75.0, "g", [43.0, 1.0, 11.0, 0.0]);
const APPLE: Line<'static> = ("apple", 1.0, "medium", [95.0, 0.0, 25.0, 0.0]);
const OATS: Line<'static> = ("oats", 60.0, "g", [228.0, 8.0, 40.0, 4.0]);
const RICE: Line<'static> = ("brown rice", 1.0, "cup", [216.0, 5.0, 45.0, 2.0]);
const OLIVE_OIL: Line<'static> = ("olive oil", 1.0, "tbsp", [119.0, 0.0, 0.0, 14.0]);
const ALMONDS: Line<'static> = ("almonds", 28.0, "g", [164.0, 6.0, 6.0, 14.0]);
const YOGURT: Line<'static> = ("greek yogurt", 170.0, "g", [100.0, 17.0, 6.0, 1.0]);
const CHEDDAR: Line<'static> = ("cheddar cheese", 28.0, "g", [113.0, 7.0, 0.0, 9.0]);
const SALT: Line<'static> = ("salt", 1.0, "pinch", [0.0, 0.0, 0.0, 0.0]);

/// A meal whose totals are the exact sum of `lines`.
pub fn meal(name: &str, meal_type: &str, slot: &str, day: &str, minutes: u32, lines: &[Line<'_>]) -> Value {
    let mut totals = [0.0_f64; 4];
    let ingredients: Vec<Value> = lines
        .iter()
        .map(|(name, amount, unit, m)| {
            for (total, v) in totals.iter_mut().zip(m) {
                *total += v;
            }
            json!({
                "name": name, "amount": amount, "unit": unit,
                "calories": m[0], "protein": m[1], "carbs": m[2], "fat": m[3]
            })
        })
        .collect();
    json!({
        "name": name,
        "meal_type": meal_type,
        "slot": slot,
        "day": day,
        "prep_time_minutes": minutes,
        "ingredients": ingredients,
        "instructions": ["Prepare the ingredients.", "Cook and serve."],
        "totals": {
            "calories": totals[0], "protein": totals[1], "carbs": totals[2], "fat": totals[3]
        }
    })
}

fn breakfast(day: &str) -> Value {
    meal("Blueberry overnight oats", "breakfast", "breakfast", day, 5, &[OATS, BLUEBERRIES, YOGURT])
}

fn lunch(day: &str) -> Value {
    meal(
        &format!("Salmon rice bowl ({day})"),
        "lunch",
        "lunch",
        day,
        20,
        &[SALMON, RICE, SPINACH],
    )
}

fn dinner(day: &str) -> Value {
    meal(
        &format!("Chicken stir fry ({day})"),
        "dinner",
        "dinner",
        day,
        30,
        &[CHICKEN, BROCCOLI, PEPPER, ZUCCHINI, OLIVE_OIL, SALT],
    )
}

fn snack(day: &str) -> Value {
    meal(&format!("Apple and almonds ({day})"), "snack", "snack", day, 2, &[APPLE, ALMONDS])
}

/// A full week for [`weekly_profile`]: one `every_day` breakfast plus seven
/// each of lunch, dinner and snack (22 meals).
pub fn week_reply() -> Value {
    let mut meals = vec![breakfast("every_day")];
    for day in DayOfWeek::ALL {
        let day = day.as_str();
        meals.extend([lunch(day), dinner(day), snack(day)]);
    }
    json!({"title": "Balanced week", "meals": meals})
}

/// One Monday for [`weekly_profile`] under single-day synthesis.
pub fn single_day_reply() -> Value {
    json!({
        "title": "Balanced day",
        "meals": [breakfast("monday"), lunch("monday"), dinner("monday"), snack("monday")]
    })
}

/// Meals built from proteins outside the roster: a contract violation.
pub fn off_roster_week_reply() -> Value {
    let mut reply = week_reply();
    reply["meals"][3] = meal("Tofu scramble", "lunch", "lunch", "monday", 10, &[
        ("tofu", 150.0, "g", [120.0, 13.0, 3.0, 7.0]),
        EGGS,
        CHEDDAR,
        BEANS,
    ]);
    reply
}

pub fn grocery_reply() -> Value {
    json!({
        "items": [
            {"name": "chicken breast", "quantity": 3, "unit": "lb", "category": "protein"},
            {"name": "salmon fillets", "quantity": 7, "unit": "fillets", "category": "protein"},
            {"name": "broccoli", "quantity": 3, "unit": "heads", "category": "produce"},
            {"name": "spinach", "quantity": 1, "unit": "bag", "category": "produce"},
            {"name": "bell pepper", "quantity": 7, "unit": "whole", "category": "produce"},
            {"name": "zucchini", "quantity": 7, "unit": "whole", "category": "produce"},
            {"name": "blueberries", "quantity": 2, "unit": "pints", "category": "produce"},
            {"name": "apple", "quantity": 7, "unit": "whole", "category": "produce"},
            {"name": "oats", "quantity": 1, "unit": "canister", "category": "grains"},
            {"name": "brown rice", "quantity": 1, "unit": "bag", "category": "grains"},
            {"name": "olive oil", "quantity": 1, "unit": "bottle", "category": "pantry"},
            {"name": "almonds", "quantity": 1, "unit": "bag", "category": "pantry", "note": "about 200 g"},
            {"name": "greek yogurt", "quantity": 2, "unit": "tubs", "category": "dairy"}
        ]
    })
}

/// Valid for both [`week_reply`] and [`single_day_reply`].
pub fn prep_reply() -> Value {
    json!({
        "sessions": [
            {
                "day": "sunday",
                "label": "Sunday batch cook",
                "estimated_minutes": 120,
                "tasks": [
                    {
                        "description": "Cook a large pot of brown rice",
                        "meals": ["Salmon rice bowl (monday)"],
                        "portions": 7,
                        "storage": "fridge, 4 days"
                    },
                    {
                        "description": "Assemble overnight oats jars",
                        "meals": ["Blueberry overnight oats"],
                        "portions": 4,
                        "storage": "fridge"
                    }
                ]
            },
            {
                "day": "wednesday",
                "label": "Midweek refresh",
                "estimated_minutes": 30,
                "tasks": [{
                    "description": "Assemble the remaining oats jars",
                    "meals": ["Blueberry overnight oats"],
                    "portions": 3,
                    "storage": "fridge"
                }]
            }
        ],
        "tips": ["Slice peppers and zucchini together on Sunday."]
    })
}
