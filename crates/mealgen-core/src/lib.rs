//! Multi-stage constrained generation of weekly meal plans.
//!
//! A run turns a [`model::UserProfile`] into a [`model::GeneratedPlan`] by
//! calling a generative oracle once per stage:
//!
//! ```text
//! ingredients -> meals -> { grocery, prep }
//! ```
//!
//! Every oracle call goes through the [`client::GenerationClient`], which
//! forces structured output, retries transient faults and writes an audit
//! entry per attempt. Nutrition values observed in meal output accumulate in
//! the shared [`nutrition::NutritionCache`].

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod nutrition;
pub mod oracle;
pub mod orchestrator;
pub mod service;
pub mod stages;

pub use error::{FailureReason, GenerationError};
pub use nutrition::normalize_name;
