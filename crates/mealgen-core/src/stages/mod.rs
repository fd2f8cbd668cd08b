//! The four pipeline stages.
//!
//! Each stage builds a prompt and a strict output schema, calls the
//! [`GenerationClient`](crate::client::GenerationClient), then validates the
//! result and fails on any contract breach instead of repairing it.
//!
//! ```text
//! ingredients::select -> meals::synthesize -> { grocery::consolidate, prep::schedule }
//! ```

pub mod grocery;
pub mod ingredients;
pub mod meals;
pub mod prep;

use serde_json::{Value, json};

use crate::model::Macros;

/// Tolerance, in kcal or grams, when comparing reported and summed macros.
pub const MACRO_TOLERANCE: f64 = 1.0;

/// Render macros for a prompt, e.g. `2100 kcal, 150 g protein, ...`.
pub(crate) fn describe_macros(m: &Macros) -> String {
    format!(
        "{:.0} kcal, {:.0} g protein, {:.0} g carbs, {:.0} g fat",
        m.calories, m.protein, m.carbs, m.fat
    )
}

/// Render a comma-separated list, or `none`.
pub(crate) fn join_or_none<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        "none".to_owned()
    } else {
        items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

/// Schema properties for the four macro fields.
pub(crate) fn macro_properties() -> serde_json::Map<String, Value> {
    let mut props = serde_json::Map::new();
    for field in ["calories", "protein", "carbs", "fat"] {
        props.insert(field.to_owned(), json!({"type": "number", "minimum": 0}));
    }
    props
}
