//! The user's nutritional profile: the immutable input of a generation run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ingredients::Category;
use super::macros::Macros;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of meal occupying a slot in the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            "snack" => Ok(Self::Snack),
            other => Err(format!("invalid meal type: {other:?}")),
        }
    }
}

/// Day of the week, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("invalid day of week: {s:?}"))
    }
}

/// Dietary restriction tags a plan must honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryRestriction {
    Vegetarian,
    Vegan,
    Pescatarian,
    GlutenFree,
    DairyFree,
    NutFree,
    EggFree,
    SoyFree,
    ShellfishFree,
    LowCarb,
    Keto,
    Paleo,
    Halal,
    Kosher,
}

impl DietaryRestriction {
    /// Phrase used when describing the restriction to the oracle.
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Vegetarian => "vegetarian (no meat, poultry or fish)",
            Self::Vegan => "vegan (no animal products of any kind)",
            Self::Pescatarian => "pescatarian (fish and seafood allowed, no other meat)",
            Self::GlutenFree => "gluten-free (no wheat, barley, rye or derivatives)",
            Self::DairyFree => "dairy-free (use dairy alternatives only)",
            Self::NutFree => "nut-free (no tree nuts or peanuts)",
            Self::EggFree => "egg-free",
            Self::SoyFree => "soy-free",
            Self::ShellfishFree => "shellfish-free",
            Self::LowCarb => "low-carb (keep carbohydrate-dense foods minimal)",
            Self::Keto => "ketogenic (very low carbohydrate, high fat)",
            Self::Paleo => "paleo (no grains, legumes, dairy or refined sugar)",
            Self::Halal => "halal",
            Self::Kosher => "kosher",
        }
    }
}

/// How much cooking effort a meal type may demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Quick,
    #[default]
    Moderate,
    Elaborate,
}

impl Complexity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Moderate => "moderate",
            Self::Elaborate => "elaborate",
        }
    }

    /// Upper bound on preparation time for one meal, in minutes.
    pub const fn max_prep_minutes(&self) -> u32 {
        match self {
            Self::Quick => 15,
            Self::Moderate => 35,
            Self::Elaborate => 75,
        }
    }

    pub const fn guidance(&self) -> &'static str {
        match self {
            Self::Quick => "quick: at most 5 ingredients, minimal cooking, no more than 15 minutes",
            Self::Moderate => "moderate: standard home cooking, no more than 35 minutes",
            Self::Elaborate => "elaborate: multi-step recipes are welcome, up to 75 minutes",
        }
    }
}

/// Whether a meal type repeats all week or changes daily.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    /// One meal reused on all seven days.
    Consistent,
    /// A distinct meal every day.
    #[default]
    Varied,
}

// ---------------------------------------------------------------------------
// Variety and household
// ---------------------------------------------------------------------------

/// Requested roster size per ingredient category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarietyCounts {
    pub protein: u8,
    pub vegetable: u8,
    pub fruit: u8,
    pub grain: u8,
    pub fat: u8,
    pub dairy: u8,
}

impl Default for VarietyCounts {
    fn default() -> Self {
        Self {
            protein: 4,
            vegetable: 4,
            fruit: 3,
            grain: 2,
            fat: 2,
            dairy: 2,
        }
    }
}

impl VarietyCounts {
    pub const MAX_PER_CATEGORY: u8 = 12;

    pub const fn get(&self, category: Category) -> usize {
        let n = match category {
            Category::Protein => self.protein,
            Category::Vegetable => self.vegetable,
            Category::Fruit => self.fruit,
            Category::Grain => self.grain,
            Category::Fat => self.fat,
            Category::Dairy => self.dairy,
        };
        n as usize
    }

    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Extra people eating a given meal, beyond the profile owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Servings {
    pub additional_adults: u8,
    pub children: u8,
}

impl Servings {
    /// Portion of an adult serving a child eats.
    pub const CHILD_PORTION: f64 = 0.5;

    /// Portion multiplier relative to a single adult.
    pub fn multiplier(&self) -> f64 {
        1.0 + f64::from(self.additional_adults) + f64::from(self.children) * Self::CHILD_PORTION
    }
}

/// Household serving counts with optional per-day, per-meal overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Household {
    pub default: Servings,
    pub overrides: BTreeMap<DayOfWeek, BTreeMap<MealType, Servings>>,
}

impl Household {
    pub fn servings(&self, day: DayOfWeek, meal_type: MealType) -> Servings {
        self.overrides
            .get(&day)
            .and_then(|by_meal| by_meal.get(&meal_type))
            .copied()
            .unwrap_or(self.default)
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// One meal position in a day, e.g. `lunch` or `snack_2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSlot {
    pub meal_type: MealType,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A user's nutritional profile. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Daily targets.
    pub targets: Macros,
    #[serde(default)]
    pub dietary_restrictions: BTreeSet<DietaryRestriction>,
    /// Main meals eaten each day. Snacks are counted by `snack_count`.
    pub meal_types: Vec<MealType>,
    #[serde(default)]
    pub snack_count: u8,
    #[serde(default)]
    pub complexity: BTreeMap<MealType, Complexity>,
    #[serde(default)]
    pub consistency: BTreeMap<MealType, Consistency>,
    #[serde(default)]
    pub variety: VarietyCounts,
    #[serde(default)]
    pub household: Option<Household>,
}

impl UserProfile {
    pub const MAX_SNACKS: u8 = 4;

    /// The day's meal slots in serving order: main meals, then snacks.
    ///
    /// A single snack is labelled `snack`; several are numbered `snack_1`,
    /// `snack_2`, ... so later stages can tell them apart.
    pub fn slots(&self) -> Vec<MealSlot> {
        let mut mains: Vec<MealType> = self
            .meal_types
            .iter()
            .copied()
            .filter(|t| *t != MealType::Snack)
            .collect();
        mains.sort();
        mains.dedup();

        let mut slots: Vec<MealSlot> = mains
            .into_iter()
            .map(|meal_type| MealSlot {
                meal_type,
                label: meal_type.as_str().to_owned(),
            })
            .collect();

        match self.snack_count {
            0 => {}
            1 => slots.push(MealSlot {
                meal_type: MealType::Snack,
                label: "snack".to_owned(),
            }),
            n => slots.extend((1..=n).map(|i| MealSlot {
                meal_type: MealType::Snack,
                label: format!("snack_{i}"),
            })),
        }
        slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots().len()
    }

    /// Targets for one slot: daily targets split evenly across slots.
    pub fn per_slot_targets(&self) -> Macros {
        let count = self.slot_count().max(1);
        self.targets / count as f64
    }

    pub fn weekly_targets(&self) -> Macros {
        self.targets * 7.0
    }

    pub fn consistency_for(&self, meal_type: MealType) -> Consistency {
        self.consistency.get(&meal_type).copied().unwrap_or_default()
    }

    pub fn complexity_for(&self, meal_type: MealType) -> Complexity {
        self.complexity.get(&meal_type).copied().unwrap_or_default()
    }

    /// Portion multiplier for one meal occurrence; `1.0` without a household.
    pub fn household_multiplier(&self, day: DayOfWeek, meal_type: MealType) -> f64 {
        self.household
            .as_ref()
            .map_or(1.0, |h| h.servings(day, meal_type).multiplier())
    }

    /// Check the profile before any oracle call is made.
    pub fn validate(&self) -> Result<(), String> {
        let t = &self.targets;
        if !(t.calories > 0.0 && t.calories.is_finite()) {
            return Err(format!("daily calorie target must be positive, got {}", t.calories));
        }
        if !t.is_finite_non_negative() {
            return Err("macro targets must be finite and non-negative".to_owned());
        }
        if self.snack_count > Self::MAX_SNACKS {
            return Err(format!(
                "snack count {} exceeds the maximum of {}",
                self.snack_count,
                Self::MAX_SNACKS
            ));
        }
        if self.slot_count() == 0 {
            return Err("profile selects no meals and no snacks".to_owned());
        }
        for category in Category::ALL {
            let n = self.variety.get(category);
            if n > usize::from(VarietyCounts::MAX_PER_CATEGORY) {
                return Err(format!(
                    "{category} variety {n} exceeds the maximum of {}",
                    VarietyCounts::MAX_PER_CATEGORY
                ));
            }
            let required = matches!(
                category,
                Category::Protein | Category::Vegetable | Category::Grain
            );
            if required && n == 0 {
                return Err(format!("{category} variety must be at least 1"));
            }
        }
        Ok(())
    }
}
