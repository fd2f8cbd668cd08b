//! Domain types shared by every stage of a generation run.

pub mod grocery;
pub mod ingredients;
pub mod macros;
pub mod meal;
pub mod options;
pub mod prep;
pub mod profile;

pub use grocery::{GroceryCategory, GroceryItem};
pub use ingredients::{Category, CoreIngredients, IngredientChoice};
pub use macros::{Macros, NutritionFacts};
pub use meal::{DayPlan, GeneratedPlan, Meal, MealDay, MealIngredient};
pub use options::{GenerationOptions, ProteinFocus, Theme};
pub use prep::{PrepSchedule, PrepSession, PrepTask};
pub use profile::{
    Complexity, Consistency, DayOfWeek, DietaryRestriction, Household, MealSlot, MealType,
    Servings, UserProfile, VarietyCounts,
};
