//! Run modes and the strategy each one selects.
//!
//! The mode is read once (normally from `MEALGEN_TEST_MODE`) and turned into
//! a [`RunStrategy`] injected into the orchestrator. Stages never look at the
//! mode themselves.

use std::fmt;
use std::str::FromStr;

use crate::client::ModelPolicy;
use crate::config::ModelConfig;
use crate::stages::meals::DaySpan;

pub const TEST_MODE_ENV: &str = "MEALGEN_TEST_MODE";

/// Token ceiling applied to every call in `fast_single_day` mode.
pub const FAST_TOKEN_CAP: u32 = 4_096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TestMode {
    #[default]
    Production,
    /// Return the recorded plan; no oracle calls at all.
    Fixture,
    /// Full week, fast model.
    FastModel,
    /// One day replicated across the week, configured models.
    SingleDay,
    /// One day replicated, fast model, capped ceilings.
    FastSingleDay,
}

impl TestMode {
    pub const ALL: [TestMode; 5] = [
        Self::Production,
        Self::Fixture,
        Self::FastModel,
        Self::SingleDay,
        Self::FastSingleDay,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Fixture => "fixture",
            Self::FastModel => "fast_model",
            Self::SingleDay => "single_day",
            Self::FastSingleDay => "fast_single_day",
        }
    }

    /// Read `MEALGEN_TEST_MODE`; unset or empty means production.
    pub fn from_env() -> Result<Self, String> {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.trim().parse(),
            _ => Ok(Self::Production),
        }
    }

    pub fn strategy(&self, models: &ModelConfig) -> RunStrategy {
        let fast = |token_cap| ModelPolicy::Override {
            model: models.fast.clone(),
            token_cap,
        };
        match self {
            Self::Production => RunStrategy::Live {
                policy: ModelPolicy::PassThrough,
                span: DaySpan::Week,
            },
            Self::Fixture => RunStrategy::Fixture,
            Self::FastModel => RunStrategy::Live {
                policy: fast(None),
                span: DaySpan::Week,
            },
            Self::SingleDay => RunStrategy::Live {
                policy: ModelPolicy::PassThrough,
                span: DaySpan::SingleDay,
            },
            Self::FastSingleDay => RunStrategy::Live {
                policy: fast(Some(FAST_TOKEN_CAP)),
                span: DaySpan::SingleDay,
            },
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(TestMode::as_str).collect();
                format!("invalid test mode {s:?} (expected one of: {})", known.join(", "))
            })
    }
}

/// What a run does, decided once per orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStrategy {
    Fixture,
    Live { policy: ModelPolicy, span: DaySpan },
}

impl RunStrategy {
    /// Substitution layer the generation client applies to every call.
    pub fn policy(&self) -> ModelPolicy {
        match self {
            Self::Fixture => ModelPolicy::Disabled,
            Self::Live { policy, .. } => policy.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse() {
        for mode in TestMode::ALL {
            assert_eq!(mode.as_str().parse::<TestMode>(), Ok(mode));
        }
        let err = "turbo".parse::<TestMode>().unwrap_err();
        assert!(err.contains("fast_single_day"));
    }

    #[test]
    fn strategies() {
        let models = ModelConfig::default();
        assert_eq!(TestMode::Fixture.strategy(&models), RunStrategy::Fixture);
        assert_eq!(TestMode::Fixture.strategy(&models).policy(), ModelPolicy::Disabled);
        assert_eq!(
            TestMode::Production.strategy(&models),
            RunStrategy::Live {
                policy: ModelPolicy::PassThrough,
                span: DaySpan::Week
            }
        );
        match TestMode::FastSingleDay.strategy(&models) {
            RunStrategy::Live {
                policy: ModelPolicy::Override { model, token_cap },
                span,
            } => {
                assert_eq!(model, models.fast);
                assert_eq!(token_cap, Some(FAST_TOKEN_CAP));
                assert_eq!(span, DaySpan::SingleDay);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }
}
