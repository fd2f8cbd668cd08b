//! Macro-nutrient arithmetic.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul};

use serde::{Deserialize, Serialize};

/// Energy and macro-nutrient amounts: kcal and grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub const fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    /// Whether every component differs from `other` by at most `tolerance`.
    pub fn within(&self, other: &Macros, tolerance: f64) -> bool {
        (self.calories - other.calories).abs() <= tolerance
            && (self.protein - other.protein).abs() <= tolerance
            && (self.carbs - other.carbs).abs() <= tolerance
            && (self.fat - other.fat).abs() <= tolerance
    }

    /// Round every component to the nearest whole unit.
    pub fn rounded(self) -> Self {
        Self::new(
            self.calories.round(),
            self.protein.round(),
            self.carbs.round(),
            self.fat.round(),
        )
    }

    pub fn is_finite_non_negative(&self) -> bool {
        [self.calories, self.protein, self.carbs, self.fat]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros::new(
            self.calories + rhs.calories,
            self.protein + rhs.protein,
            self.carbs + rhs.carbs,
            self.fat + rhs.fat,
        )
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

impl Mul<f64> for Macros {
    type Output = Macros;

    fn mul(self, factor: f64) -> Macros {
        Macros::new(
            self.calories * factor,
            self.protein * factor,
            self.carbs * factor,
            self.fat * factor,
        )
    }
}

impl Div<f64> for Macros {
    type Output = Macros;

    fn div(self, divisor: f64) -> Macros {
        self * (1.0 / divisor)
    }
}

impl Sum for Macros {
    fn sum<I: Iterator<Item = Macros>>(iter: I) -> Macros {
        iter.fold(Macros::default(), Add::add)
    }
}

impl<'a> Sum<&'a Macros> for Macros {
    fn sum<I: Iterator<Item = &'a Macros>>(iter: I) -> Macros {
        iter.copied().sum()
    }
}

/// Macros for one serving of a food at a stated size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub serving_size: f64,
    pub serving_unit: String,
    #[serde(flatten)]
    pub macros: Macros,
}
