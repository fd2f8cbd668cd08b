//! Query functions, one module per table family.

pub mod generation_logs;
pub mod ingredients;
pub mod nutrition_cache;
pub mod plans;
