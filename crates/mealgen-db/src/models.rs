use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where a cached nutrition value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NutritionSource {
    /// Observed in oracle output; plausible but unverified.
    Estimated,
    /// Seeded from a reference nutrition database.
    Reference,
}

impl fmt::Display for NutritionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Estimated => "estimated",
            Self::Reference => "reference",
        };
        f.write_str(s)
    }
}

impl FromStr for NutritionSource {
    type Err = NutritionSourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "estimated" => Ok(Self::Estimated),
            "reference" => Ok(Self::Reference),
            other => Err(NutritionSourceParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`NutritionSource`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid nutrition source: {0:?}")]
pub struct NutritionSourceParseError(pub String);

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A canonical ingredient record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Ingredient {
    /// Whether an administrator has soft-deleted this record.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One nutrition observation for an ingredient at a given serving size.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NutritionCacheRow {
    pub id: Uuid,
    pub ingredient_id: Uuid,
    pub serving_size: f64,
    pub serving_unit: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub source: NutritionSource,
    pub created_at: DateTime<Utc>,
}

/// A nutrition row joined with its ingredient's normalized name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CachedNutrition {
    pub normalized_name: String,
    pub serving_size: f64,
    pub serving_unit: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub source: NutritionSource,
}

/// One audit entry for a single oracle attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GenerationLog {
    pub id: i64,
    pub caller: String,
    pub prompt_type: String,
    pub model: String,
    pub attempt: i32,
    pub success: bool,
    pub error_kind: Option<String>,
    pub output_chars: i32,
    pub output_tokens: Option<i32>,
    pub duration_ms: i32,
    pub prompt_sha256: String,
    pub recorded_at: DateTime<Utc>,
}

/// A persisted weekly plan. Structured parts are stored as JSON documents
/// owned by the core crate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPlanRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub profile: serde_json::Value,
    pub core_ingredients: serde_json::Value,
    pub grocery_list: serde_json::Value,
    pub prep_schedule: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// One meal occurrence within a persisted plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanMealRow {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub day: String,
    pub position: i32,
    pub meal_type: String,
    pub slot: String,
    pub name: String,
    pub meal: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
