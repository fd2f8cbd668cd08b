//! Model selection for each stage family.

pub const PLANNING_MODEL_ENV: &str = "MEALGEN_PLANNING_MODEL";
pub const UTILITY_MODEL_ENV: &str = "MEALGEN_UTILITY_MODEL";
pub const FAST_MODEL_ENV: &str = "MEALGEN_FAST_MODEL";

pub const DEFAULT_PLANNING_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_UTILITY_MODEL: &str = "claude-haiku-4-5";
pub const DEFAULT_FAST_MODEL: &str = "claude-haiku-4-5";

/// Which model each kind of call uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Ingredient selection and meal synthesis.
    pub planning: String,
    /// Grocery consolidation and prep scheduling.
    pub utility: String,
    /// Substituted for both in reduced test modes.
    pub fast: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            planning: DEFAULT_PLANNING_MODEL.to_owned(),
            utility: DEFAULT_UTILITY_MODEL.to_owned(),
            fast: DEFAULT_FAST_MODEL.to_owned(),
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (testable without env vars).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, fallback: String| {
            lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
        };
        Self {
            planning: pick(PLANNING_MODEL_ENV, defaults.planning),
            utility: pick(UTILITY_MODEL_ENV, defaults.utility),
            fast: pick(FAST_MODEL_ENV, defaults.fast),
        }
    }
}
