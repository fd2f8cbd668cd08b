//! The ingredient roster chosen by the first stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::nutrition::normalize_name;

/// One of the six canonical roster buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Protein,
    Vegetable,
    Fruit,
    Grain,
    Fat,
    Dairy,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Protein,
        Self::Vegetable,
        Self::Fruit,
        Self::Grain,
        Self::Fat,
        Self::Dairy,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Protein => "protein",
            Self::Vegetable => "vegetable",
            Self::Fruit => "fruit",
            Self::Grain => "grain",
            Self::Fat => "fat",
            Self::Dairy => "dairy",
        }
    }

    /// Map a canonical or legacy bucket label onto a category.
    ///
    /// Returns `None` for anything unrecognised; callers treat that as a
    /// contract violation rather than guessing.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let category = match label.as_str() {
            "protein" | "proteins" => Self::Protein,
            "vegetable" | "vegetables" | "veggies" => Self::Vegetable,
            "fruit" | "fruits" => Self::Fruit,
            "grain" | "grains" | "carbs" | "carbohydrates" | "starches" => Self::Grain,
            "fat" | "fats" | "healthy_fats" | "oils" => Self::Fat,
            "dairy" | "dairy_alternatives" => Self::Dairy,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("invalid ingredient category: {s:?}"))
    }
}

/// A roster entry: a bare name, or a name flagged as a substitution for a
/// preferred ingredient the profile's restrictions ruled out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientChoice {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        substituted: bool,
    },
}

impl IngredientChoice {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }

    pub fn is_substituted(&self) -> bool {
        matches!(self, Self::Detailed { substituted: true, .. })
    }
}

impl From<&str> for IngredientChoice {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

/// Six named buckets of ingredient names. Produced once per run; read-only
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreIngredients {
    pub protein: Vec<IngredientChoice>,
    pub vegetable: Vec<IngredientChoice>,
    pub fruit: Vec<IngredientChoice>,
    pub grain: Vec<IngredientChoice>,
    pub fat: Vec<IngredientChoice>,
    pub dairy: Vec<IngredientChoice>,
}

impl CoreIngredients {
    pub fn bucket(&self, category: Category) -> &[IngredientChoice] {
        match category {
            Category::Protein => &self.protein,
            Category::Vegetable => &self.vegetable,
            Category::Fruit => &self.fruit,
            Category::Grain => &self.grain,
            Category::Fat => &self.fat,
            Category::Dairy => &self.dairy,
        }
    }

    pub fn bucket_mut(&mut self, category: Category) -> &mut Vec<IngredientChoice> {
        match category {
            Category::Protein => &mut self.protein,
            Category::Vegetable => &mut self.vegetable,
            Category::Fruit => &mut self.fruit,
            Category::Grain => &mut self.grain,
            Category::Fat => &mut self.fat,
            Category::Dairy => &mut self.dairy,
        }
    }

    /// Every roster name, bucket by bucket.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        Category::ALL
            .into_iter()
            .flat_map(move |c| self.bucket(c).iter().map(IngredientChoice::name))
    }

    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.bucket(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `name` normalized-matches a roster entry.
    pub fn contains(&self, name: &str) -> bool {
        let wanted = normalize_name(name);
        self.all_names().any(|n| normalize_name(n) == wanted)
    }

    /// Category of the roster entry matching `name`, if any.
    pub fn category_of(&self, name: &str) -> Option<Category> {
        let wanted = normalize_name(name);
        Category::ALL.into_iter().find(|c| {
            self.bucket(*c)
                .iter()
                .any(|choice| normalize_name(choice.name()) == wanted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_labels_map_to_canonical_buckets() {
        assert_eq!(Category::from_label("Proteins"), Some(Category::Protein));
        assert_eq!(Category::from_label("veggies"), Some(Category::Vegetable));
        assert_eq!(Category::from_label("carbohydrates"), Some(Category::Grain));
        assert_eq!(Category::from_label("Healthy Fats"), Some(Category::Fat));
        assert_eq!(Category::from_label("dairy-alternatives"), Some(Category::Dairy));
        assert_eq!(Category::from_label("legumes"), None);
    }

    #[test]
    fn choices_deserialize_from_strings_and_records() {
        let core: CoreIngredients = serde_json::from_str(
            r#"{"protein": ["Chicken Breast", {"name": "tofu", "substituted": true}]}"#,
        )
        .unwrap();
        assert_eq!(core.protein[0].name(), "Chicken Breast");
        assert!(core.protein[1].is_substituted());
        assert!(core.vegetable.is_empty());
    }

    #[test]
    fn contains_matches_normalized_names() {
        let core = CoreIngredients {
            protein: vec!["Chicken  Breast".into()],
            grain: vec!["brown rice".into()],
            ..Default::default()
        };
        assert!(core.contains("chicken breast"));
        assert!(core.contains(" Brown Rice "));
        assert!(!core.contains("salmon"));
        assert_eq!(core.category_of("BROWN RICE"), Some(Category::Grain));
        assert_eq!(core.len(), 2);
    }
}
