//! Consolidated shopping list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::macros::NutritionFacts;

/// Store section a grocery item is shelved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroceryCategory {
    Produce,
    Protein,
    Dairy,
    Grains,
    Pantry,
    Frozen,
    Other,
}

impl GroceryCategory {
    pub const ALL: [GroceryCategory; 7] = [
        Self::Produce,
        Self::Protein,
        Self::Dairy,
        Self::Grains,
        Self::Pantry,
        Self::Frozen,
        Self::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Produce => "produce",
            Self::Protein => "protein",
            Self::Dairy => "dairy",
            Self::Grains => "grains",
            Self::Pantry => "pantry",
            Self::Frozen => "frozen",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for GroceryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroceryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("invalid grocery category: {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: GroceryCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Cached per-serving reference values, when the cache knows the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionFacts>,
}
