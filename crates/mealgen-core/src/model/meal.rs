//! Meals, days and the assembled weekly plan.

use serde::{Deserialize, Serialize};

use super::grocery::GroceryItem;
use super::ingredients::CoreIngredients;
use super::macros::Macros;
use super::prep::PrepSchedule;
use super::profile::{DayOfWeek, MealSlot, MealType};

/// The day a synthesized meal is served: one weekday, or every day for
/// consistent meal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealDay {
    EveryDay,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl MealDay {
    pub fn covers(&self, day: DayOfWeek) -> bool {
        match self {
            Self::EveryDay => true,
            other => *other == Self::from(day),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EveryDay => "every_day",
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

impl From<DayOfWeek> for MealDay {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Self::Monday,
            DayOfWeek::Tuesday => Self::Tuesday,
            DayOfWeek::Wednesday => Self::Wednesday,
            DayOfWeek::Thursday => Self::Thursday,
            DayOfWeek::Friday => Self::Friday,
            DayOfWeek::Saturday => Self::Saturday,
            DayOfWeek::Sunday => Self::Sunday,
        }
    }
}

/// One ingredient line of a meal with its macro snapshot for `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealIngredient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
    #[serde(flatten)]
    pub macros: Macros,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    pub meal_type: MealType,
    /// Slot label, e.g. `dinner` or `snack_2`.
    pub slot: String,
    pub day: MealDay,
    pub prep_time_minutes: u32,
    pub ingredients: Vec<MealIngredient>,
    pub instructions: Vec<String>,
    pub totals: Macros,
}

impl Meal {
    pub fn ingredient_sum(&self) -> Macros {
        self.ingredients.iter().map(|i| i.macros).sum()
    }

    /// Whether the reported totals equal the ingredient sum within `tolerance`.
    pub fn totals_match(&self, tolerance: f64) -> bool {
        self.totals.within(&self.ingredient_sum(), tolerance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: DayOfWeek,
    pub meals: Vec<Meal>,
    pub totals: Macros,
}

impl DayPlan {
    pub fn new(day: DayOfWeek, meals: Vec<Meal>) -> Self {
        let totals = meals.iter().map(|m| m.totals).sum();
        Self { day, meals, totals }
    }
}

/// The result of a complete generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPlan {
    pub title: String,
    pub days: Vec<DayPlan>,
    pub grocery_list: Vec<GroceryItem>,
    pub core_ingredients: CoreIngredients,
    pub prep_schedule: PrepSchedule,
}

impl GeneratedPlan {
    pub fn meals(&self) -> impl Iterator<Item = &Meal> {
        self.days.iter().flat_map(|d| d.meals.iter())
    }
}

/// Lay synthesized meals out over `days` in slot order.
///
/// Every (slot, day) pair must be covered by exactly one meal, either one
/// tagged with that day or one tagged `every_day`.
pub fn assemble_days(
    meals: &[Meal],
    slots: &[MealSlot],
    days: &[DayOfWeek],
) -> Result<Vec<DayPlan>, String> {
    let mut plans = Vec::with_capacity(days.len());
    for &day in days {
        let mut day_meals = Vec::with_capacity(slots.len());
        for slot in slots {
            let mut matching = meals
                .iter()
                .filter(|m| m.slot == slot.label && m.day.covers(day));
            let meal = matching
                .next()
                .ok_or_else(|| format!("no meal for slot {} on {day}", slot.label))?;
            if matching.next().is_some() {
                return Err(format!("more than one meal for slot {} on {day}", slot.label));
            }
            if meal.meal_type != slot.meal_type {
                return Err(format!(
                    "meal {:?} in slot {} has meal type {}, expected {}",
                    meal.name, slot.label, meal.meal_type, slot.meal_type
                ));
            }
            let mut meal = meal.clone();
            meal.day = MealDay::from(day);
            day_meals.push(meal);
        }
        plans.push(DayPlan::new(day, day_meals));
    }
    Ok(plans)
}

/// Expand one representative day into a full week.
pub fn replicate_day(template: &DayPlan) -> Vec<DayPlan> {
    DayOfWeek::ALL
        .into_iter()
        .map(|day| {
            let meals = template
                .meals
                .iter()
                .cloned()
                .map(|mut m| {
                    m.day = MealDay::from(day);
                    m
                })
                .collect();
            DayPlan::new(day, meals)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal(name: &str, slot: &str, meal_type: MealType, day: MealDay) -> Meal {
        Meal {
            name: name.to_owned(),
            meal_type,
            slot: slot.to_owned(),
            day,
            prep_time_minutes: 10,
            ingredients: vec![
                MealIngredient {
                    name: "oats".to_owned(),
                    amount: 50.0,
                    unit: "g".to_owned(),
                    macros: Macros::new(190.0, 6.5, 33.0, 3.5),
                },
                MealIngredient {
                    name: "greek yogurt".to_owned(),
                    amount: 150.0,
                    unit: "g".to_owned(),
                    macros: Macros::new(146.0, 15.0, 6.0, 7.0),
                },
            ],
            instructions: vec!["Mix.".to_owned()],
            totals: Macros::new(336.0, 21.5, 39.0, 10.5),
        }
    }

    fn slots() -> Vec<MealSlot> {
        vec![
            MealSlot {
                meal_type: MealType::Breakfast,
                label: "breakfast".to_owned(),
            },
            MealSlot {
                meal_type: MealType::Dinner,
                label: "dinner".to_owned(),
            },
        ]
    }

    #[test]
    fn totals_match_within_tolerance() {
        let mut m = meal("Overnight oats", "breakfast", MealType::Breakfast, MealDay::EveryDay);
        assert!(m.totals_match(1.0));
        m.totals.calories += 0.9;
        assert!(m.totals_match(1.0));
        m.totals.calories += 5.0;
        assert!(!m.totals_match(1.0));
    }

    #[test]
    fn assemble_days_reuses_every_day_meals() {
        let mut meals = vec![meal(
            "Overnight oats",
            "breakfast",
            MealType::Breakfast,
            MealDay::EveryDay,
        )];
        for day in DayOfWeek::ALL {
            meals.push(meal(
                &format!("Dinner {day}"),
                "dinner",
                MealType::Dinner,
                MealDay::from(day),
            ));
        }

        let week = assemble_days(&meals, &slots(), &DayOfWeek::ALL).unwrap();
        assert_eq!(week.len(), 7);
        assert!(week.iter().all(|d| d.meals[0].name == "Overnight oats"));
        assert_eq!(week[4].meals[1].name, "Dinner friday");
        assert_eq!(week[4].meals[0].day, MealDay::Friday);
        assert_eq!(week[0].totals.calories, 672.0);
    }

    #[test]
    fn assemble_days_rejects_gaps_and_duplicates() {
        let meals = vec![meal("Oats", "breakfast", MealType::Breakfast, MealDay::EveryDay)];
        let err = assemble_days(&meals, &slots(), &[DayOfWeek::Monday]).unwrap_err();
        assert!(err.contains("no meal for slot dinner"));

        let meals = vec![
            meal("Oats", "breakfast", MealType::Breakfast, MealDay::EveryDay),
            meal("Eggs", "breakfast", MealType::Breakfast, MealDay::Monday),
            meal("Stew", "dinner", MealType::Dinner, MealDay::EveryDay),
        ];
        let err = assemble_days(&meals, &slots(), &[DayOfWeek::Monday]).unwrap_err();
        assert!(err.contains("more than one meal"));
    }

    #[test]
    fn replicate_day_fills_the_week() {
        let day = DayPlan::new(
            DayOfWeek::Monday,
            vec![meal("Oats", "breakfast", MealType::Breakfast, MealDay::Monday)],
        );
        let week = replicate_day(&day);
        assert_eq!(week.len(), 7);
        assert_eq!(week[6].day, DayOfWeek::Sunday);
        assert_eq!(week[6].meals[0].day, MealDay::Sunday);
        assert_eq!(week[6].totals, day.totals);
    }
}
