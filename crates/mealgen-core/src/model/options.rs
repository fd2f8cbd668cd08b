//! Optional per-run steering passed alongside the profile.

use serde::{Deserialize, Serialize};

use super::profile::MealType;

/// A themed ingredient pool, e.g. "Mediterranean week".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ingredient_pool: Vec<String>,
    /// Minimum share of roster items drawn from `ingredient_pool`, in `0..=1`.
    #[serde(default = "Theme::default_min_proportion")]
    pub min_proportion: f64,
}

impl Theme {
    fn default_min_proportion() -> f64 {
        0.5
    }
}

/// Require one protein to dominate one meal type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinFocus {
    pub protein: String,
    pub meal_type: MealType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Meals from recent plans to avoid repeating.
    pub recent_meal_names: Vec<String>,
    pub liked_meals: Vec<String>,
    pub disliked_meals: Vec<String>,
    pub liked_ingredients: Vec<String>,
    pub disliked_ingredients: Vec<String>,
    pub theme: Option<Theme>,
    pub protein_focus: Option<ProteinFocus>,
}
