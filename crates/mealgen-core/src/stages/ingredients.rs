//! Stage 1: choose the fixed-size core ingredient roster.

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use tracing::info;

use super::{describe_macros, join_or_none};
use crate::client::{CallSpec, GenerationClient, PromptKind};
use crate::error::GenerationError;
use crate::model::{Category, CoreIngredients, GenerationOptions, IngredientChoice, UserProfile};
use crate::nutrition::{self, NutritionCache, NutritionEntry, normalize_name};

pub const MAX_TOKENS: u32 = 4096;

/// Everyday foods whose cached values anchor the oracle's estimates.
pub const ANCHOR_FOODS: &[&str] = &[
    "chicken breast",
    "eggs",
    "salmon",
    "tofu",
    "greek yogurt",
    "oats",
    "brown rice",
    "sweet potato",
    "broccoli",
    "spinach",
    "banana",
    "olive oil",
    "almonds",
];

const ROLE: &str = "You are a registered dietitian planning one week of home cooking. \
Choose the small set of core ingredients the whole week will be built from.\n\n";

const OUTPUT_RULES: &str = "## Output rules\n\n\
- Call the tool exactly once with every bucket filled.\n\
- Each bucket must contain exactly the number of items requested above, no more and no fewer.\n\
- Use plain grocery names (\"chicken breast\", not \"organic free-range chicken breast fillets\").\n\
- Never list the same ingredient twice.\n\
- If a restriction rules out an obvious choice, pick a compliant alternative and mark it \
`{\"name\": ..., \"substituted\": true}`.\n";

/// Number of roster items a theme requires from its pool.
pub fn theme_minimum(min_proportion: f64, roster_size: usize) -> usize {
    let share = min_proportion.clamp(0.0, 1.0);
    (share * roster_size as f64).ceil() as usize
}

/// Build the ingredient-selection prompt.
pub fn build_prompt(
    profile: &UserProfile,
    options: &GenerationOptions,
    anchors: &HashMap<String, NutritionEntry>,
) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(ROLE);

    prompt.push_str("## Weekly budget\n\n");
    prompt.push_str(&format!(
        "- Daily targets: {}\n- Weekly totals (daily x 7): {}\n\n",
        describe_macros(&profile.targets),
        describe_macros(&profile.weekly_targets())
    ));
    prompt.push_str(
        "Pick ingredients that together can reach these totals across the week's meals \
         without relying on foods outside the roster.\n\n",
    );

    prompt.push_str("## Dietary restrictions\n\n");
    if profile.dietary_restrictions.is_empty() {
        prompt.push_str("None.\n\n");
    } else {
        for r in &profile.dietary_restrictions {
            prompt.push_str(&format!("- {} (mandatory)\n", r.describe()));
        }
        prompt.push('\n');
    }

    prompt.push_str("## Roster size\n\n");
    for category in Category::ALL {
        prompt.push_str(&format!(
            "- {}: exactly {}\n",
            category,
            profile.variety.get(category)
        ));
    }
    prompt.push('\n');

    if !options.recent_meal_names.is_empty() {
        prompt.push_str("## Variety\n\n");
        prompt.push_str(&format!(
            "Recent plans featured: {}. Favour ingredients that lead to different meals.\n\n",
            join_or_none(&options.recent_meal_names)
        ));
    }

    let has_preferences = !options.liked_ingredients.is_empty()
        || !options.disliked_ingredients.is_empty()
        || !options.liked_meals.is_empty()
        || !options.disliked_meals.is_empty();
    if has_preferences {
        prompt.push_str("## Preferences\n\n");
        prompt.push_str(&format!(
            "- Include where possible: {}\n",
            join_or_none(&options.liked_ingredients)
        ));
        prompt.push_str(&format!(
            "- Never include: {}\n",
            join_or_none(&options.disliked_ingredients)
        ));
        prompt.push_str(&format!(
            "- Meals the user enjoys: {}\n",
            join_or_none(&options.liked_meals)
        ));
        prompt.push_str(&format!(
            "- Meals the user dislikes (avoid their key ingredients): {}\n\n",
            join_or_none(&options.disliked_meals)
        ));
    }

    if let Some(theme) = &options.theme {
        let minimum = theme_minimum(theme.min_proportion, profile.variety.total());
        prompt.push_str(&format!("## Theme: {}\n\n", theme.name));
        if !theme.description.is_empty() {
            prompt.push_str(&format!("{}\n\n", theme.description));
        }
        prompt.push_str(&format!(
            "At least {minimum} of the {} roster items must come from this pool: {}.\n\n",
            profile.variety.total(),
            join_or_none(&theme.ingredient_pool)
        ));
    }

    if let Some(focus) = &options.protein_focus {
        prompt.push_str("## Protein focus\n\n");
        prompt.push_str(&format!(
            "The protein bucket must include {}; it will be the main protein of every {}.\n\n",
            focus.protein, focus.meal_type
        ));
    }

    if !anchors.is_empty() {
        prompt.push_str("## Reference nutrition\n\n");
        prompt.push_str("Known values for common foods, for calibration only:\n");
        let mut names: Vec<&String> = anchors.keys().collect();
        names.sort();
        for name in names {
            let entry = &anchors[name];
            prompt.push_str(&format!(
                "- {name}: {} {} = {}\n",
                entry.facts.serving_size,
                entry.facts.serving_unit,
                describe_macros(&entry.facts.macros)
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(OUTPUT_RULES);
    prompt
}

/// Tool input schema fixing each bucket to its requested size.
pub fn output_schema(profile: &UserProfile) -> Value {
    let choice = json!({
        "anyOf": [
            {"type": "string", "minLength": 1},
            {
                "type": "object",
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "substituted": {"type": "boolean"}
                },
                "required": ["name"]
            }
        ]
    });

    let mut properties = Map::new();
    for category in Category::ALL {
        let n = profile.variety.get(category);
        properties.insert(
            category.as_str().to_owned(),
            json!({"type": "array", "items": choice, "minItems": n, "maxItems": n}),
        );
    }
    let required: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// Map raw bucket labels onto the canonical six.
///
/// Unknown labels, repeated buckets and non-list values are contract
/// violations; nothing is guessed.
pub fn normalize_output(raw: Map<String, Value>) -> Result<CoreIngredients, GenerationError> {
    let mut core = CoreIngredients::default();
    let mut seen = Vec::with_capacity(Category::ALL.len());

    for (label, value) in raw {
        let category = Category::from_label(&label).ok_or_else(|| {
            GenerationError::contract(format!("unrecognized ingredient category {label:?}"))
        })?;
        if seen.contains(&category) {
            return Err(GenerationError::contract(format!(
                "ingredient category {category} given more than once (label {label:?})"
            )));
        }
        seen.push(category);

        let choices: Vec<IngredientChoice> = serde_json::from_value(value).map_err(|e| {
            GenerationError::contract(format!("bucket {label:?} is not a list of ingredients: {e}"))
        })?;
        *core.bucket_mut(category) = choices;
    }
    Ok(core)
}

/// Check bucket sizes, names and the protein focus.
pub fn validate(
    core: &CoreIngredients,
    profile: &UserProfile,
    options: &GenerationOptions,
) -> Result<(), GenerationError> {
    for category in Category::ALL {
        let bucket = core.bucket(category);
        let wanted = profile.variety.get(category);
        if bucket.len() != wanted {
            return Err(GenerationError::contract(format!(
                "{category} bucket has {} items, expected {wanted}",
                bucket.len()
            )));
        }
        let mut names = Vec::with_capacity(bucket.len());
        for choice in bucket {
            let normalized = normalize_name(choice.name());
            if normalized.is_empty() {
                return Err(GenerationError::contract(format!(
                    "{category} bucket contains an empty name"
                )));
            }
            if names.contains(&normalized) {
                return Err(GenerationError::contract(format!(
                    "{category} bucket lists {normalized:?} twice"
                )));
            }
            names.push(normalized);
        }
    }

    if let Some(focus) = &options.protein_focus {
        let wanted = normalize_name(&focus.protein);
        let present = core
            .protein
            .iter()
            .any(|c| normalize_name(c.name()) == wanted);
        if !present {
            return Err(GenerationError::contract(format!(
                "protein focus {:?} missing from protein bucket",
                focus.protein
            )));
        }
    }
    Ok(())
}

/// Run the stage.
pub async fn select(
    client: &GenerationClient,
    cache: &dyn NutritionCache,
    model: &str,
    profile: &UserProfile,
    options: &GenerationOptions,
) -> Result<CoreIngredients, GenerationError> {
    let anchor_names: Vec<String> = ANCHOR_FOODS.iter().map(|s| (*s).to_owned()).collect();
    let anchors = nutrition::fetch_or_empty(cache, &anchor_names).await;

    let spec = CallSpec::new(
        PromptKind::Ingredients,
        build_prompt(profile, options, &anchors),
        output_schema(profile),
        model,
        MAX_TOKENS,
    );
    let raw: Map<String, Value> = client.call(&spec).await?;
    let core = normalize_output(raw)?;
    validate(&core, profile, options)?;

    info!(
        caller = %client.caller(),
        roster = core.len(),
        anchors = anchors.len(),
        "core ingredients selected"
    );
    Ok(core)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::{MemoryAuditSink, RetryPolicy};
    use crate::model::{DietaryRestriction, MealType, ProteinFocus, Theme};
    use crate::nutrition::{MemoryNutritionCache, NutritionItem, NutritionSource};
    use crate::stages::testing::{self, ToolOracle};

    #[test]
    fn schema_pins_bucket_sizes() {
        let profile = testing::profile();
        let schema = output_schema(&profile);
        assert_eq!(schema["properties"]["protein"]["minItems"], 2);
        assert_eq!(schema["properties"]["protein"]["maxItems"], 2);
        assert_eq!(schema["properties"]["dairy"]["maxItems"], 1);
        assert_eq!(schema["required"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn prompt_carries_budget_and_constraints() {
        let mut profile = testing::profile();
        profile.dietary_restrictions.insert(DietaryRestriction::DairyFree);
        let options = GenerationOptions {
            recent_meal_names: vec!["Beef chili".into()],
            disliked_ingredients: vec!["mushrooms".into()],
            theme: Some(Theme {
                name: "Mediterranean".into(),
                description: String::new(),
                ingredient_pool: vec!["chickpeas".into(), "feta".into()],
                min_proportion: 0.25,
            }),
            protein_focus: Some(ProteinFocus {
                protein: "salmon".into(),
                meal_type: MealType::Dinner,
            }),
            ..Default::default()
        };

        let prompt = build_prompt(&profile, &options, &HashMap::new());
        assert!(prompt.contains("Weekly totals (daily x 7): 14000 kcal, 1050 g protein"));
        assert!(prompt.contains("dairy-free"));
        assert!(prompt.contains("- protein: exactly 2"));
        assert!(prompt.contains("Beef chili"));
        assert!(prompt.contains("Never include: mushrooms"));
        assert!(prompt.contains("At least 2 of the 8 roster items"));
        assert!(prompt.contains("must include salmon"));
        assert!(!prompt.contains("Reference nutrition"));
    }

    #[test]
    fn theme_minimum_rounds_up() {
        assert_eq!(theme_minimum(0.5, 17), 9);
        assert_eq!(theme_minimum(0.0, 17), 0);
        assert_eq!(theme_minimum(1.5, 4), 4);
    }

    #[test]
    fn legacy_labels_are_normalized() {
        let raw = json!({
            "proteins": ["chicken breast"],
            "veggies": ["broccoli"],
            "fruits": [],
            "carbohydrates": [{"name": "quinoa", "substituted": true}],
            "healthy_fats": ["avocado"],
            "dairy_alternatives": ["oat milk"]
        });
        let core = normalize_output(raw.as_object().unwrap().clone()).unwrap();
        assert_eq!(core.protein[0].name(), "chicken breast");
        assert!(core.grain[0].is_substituted());
        assert_eq!(core.dairy[0].name(), "oat milk");
    }

    #[test]
    fn unknown_or_repeated_labels_are_contract_violations() {
        let raw = json!({"protein": ["eggs"], "legumes": ["lentils"]});
        let err = normalize_output(raw.as_object().unwrap().clone()).unwrap_err();
        assert!(matches!(err, GenerationError::Contract(ref m) if m.contains("legumes")));

        let raw = json!({"protein": ["eggs"], "proteins": ["tofu"]});
        let err = normalize_output(raw.as_object().unwrap().clone()).unwrap_err();
        assert!(matches!(err, GenerationError::Contract(ref m) if m.contains("more than once")));

        let raw = json!({"protein": "eggs"});
        assert!(normalize_output(raw.as_object().unwrap().clone()).is_err());
    }

    #[test]
    fn validate_checks_sizes_duplicates_and_focus() {
        let profile = testing::profile();
        let options = GenerationOptions::default();
        assert!(validate(&testing::core(), &profile, &options).is_ok());

        let mut short = testing::core();
        short.vegetable.pop();
        let err = validate(&short, &profile, &options).unwrap_err();
        assert!(err.to_string().contains("vegetable bucket has 1 items, expected 2"));

        let mut dup = testing::core();
        dup.protein[1] = "Chicken  Breast".into();
        assert!(validate(&dup, &profile, &options).is_err());

        let focused = GenerationOptions {
            protein_focus: Some(ProteinFocus {
                protein: "salmon".into(),
                meal_type: MealType::Dinner,
            }),
            ..Default::default()
        };
        assert!(validate(&testing::core(), &profile, &focused).is_err());
    }

    #[tokio::test]
    async fn select_uses_cache_anchors_and_returns_roster() {
        let oracle = Arc::new(ToolOracle::new().reply("select_core_ingredients", testing::core_reply()));
        let client = GenerationClient::new(oracle.clone(), Arc::new(MemoryAuditSink::new()))
            .with_retry(RetryPolicy::immediate());
        let cache = MemoryNutritionCache::new();
        cache
            .cache_many(&[NutritionItem {
                name: "Eggs".into(),
                serving_size: 1.0,
                serving_unit: "large".into(),
                macros: crate::model::Macros::new(72.0, 6.0, 0.4, 5.0),
                source: NutritionSource::Reference,
            }])
            .await
            .unwrap();

        let core = select(
            &client,
            &cache,
            "planner",
            &testing::profile(),
            &GenerationOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(core, testing::core());
        let prompt = oracle.prompt_for("select_core_ingredients").unwrap();
        assert!(prompt.contains("- eggs: 1 large = 72 kcal"));
    }
}
