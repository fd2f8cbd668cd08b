//! Batch-cooking schedule.

use serde::{Deserialize, Serialize};

use super::profile::DayOfWeek;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepSchedule {
    pub sessions: Vec<PrepSession>,
    #[serde(default)]
    pub tips: Vec<String>,
}

impl PrepSchedule {
    pub fn total_minutes(&self) -> u32 {
        self.sessions.iter().map(|s| s.estimated_minutes).sum()
    }

    /// Every meal name referenced by any task.
    pub fn referenced_meals(&self) -> impl Iterator<Item = &str> {
        self.sessions
            .iter()
            .flat_map(|s| s.tasks.iter())
            .flat_map(|t| t.meals.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepSession {
    pub day: DayOfWeek,
    pub label: String,
    pub estimated_minutes: u32,
    pub tasks: Vec<PrepTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepTask {
    pub description: String,
    /// Names of the meals this task prepares for.
    #[serde(default)]
    pub meals: Vec<String>,
    /// Portions produced, already scaled by household size.
    #[serde(default)]
    pub portions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}
