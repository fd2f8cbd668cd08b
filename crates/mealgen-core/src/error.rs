//! Error taxonomy of a generation run.

use std::fmt;

use uuid::Uuid;

use crate::oracle::OracleError;

/// Every way a generation run, or a stage within it, can fail.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The oracle ran out of output budget. Retrying with the same ceiling
    /// fails identically, so this is never retried.
    #[error("{prompt_type} output truncated at max_tokens={max_tokens}; raise the token ceiling")]
    Truncated {
        prompt_type: &'static str,
        max_tokens: u32,
    },

    #[error("oracle call failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: OracleError,
    },

    #[error("oracle rejected the request: {0}")]
    Rejected(#[source] OracleError),

    #[error("oracle calls are disabled in the current run mode")]
    OracleDisabled,

    #[error("oracle output violated its contract: {0}")]
    Contract(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("meal plan {0} not found")]
    NotFound(Uuid),

    #[error("meal plan belongs to another user")]
    Unauthorized,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl GenerationError {
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    /// The user-visible reason this error maps to.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Exhausted { source, .. } if matches!(source, OracleError::RateLimited { .. }) => {
                FailureReason::RateLimited
            }
            Self::Exhausted { .. } => FailureReason::Transient,
            Self::Truncated { .. }
            | Self::Rejected(_)
            | Self::Contract(_)
            | Self::InvalidProfile(_) => FailureReason::ValidationFailed,
            Self::NotFound(_) => FailureReason::NotFound,
            Self::Unauthorized => FailureReason::Unauthorized,
            Self::OracleDisabled | Self::Storage(_) => FailureReason::Internal,
        }
    }

    /// Stable tag recorded in audit entries and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Truncated { .. } => "truncated",
            Self::Exhausted { .. } => "exhausted",
            Self::Rejected(_) => "rejected",
            Self::OracleDisabled => "oracle_disabled",
            Self::Contract(_) => "contract",
            Self::InvalidProfile(_) => "invalid_profile",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Storage(_) => "storage",
        }
    }
}

/// The small set of actionable reasons shown to an end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    RateLimited,
    ValidationFailed,
    Transient,
    NotFound,
    Unauthorized,
    Internal,
}

impl FailureReason {
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => "The planner is busy right now. Please try again later.",
            Self::ValidationFailed => {
                "The generated plan failed validation. Please contact support if this persists."
            }
            Self::Transient => "Plan generation hit a temporary problem. Please retry.",
            Self::NotFound => "That meal plan could not be found.",
            Self::Unauthorized => "You do not have access to that meal plan.",
            Self::Internal => "Something went wrong while generating your plan.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons() {
        let rate_limited = GenerationError::Exhausted {
            attempts: 3,
            source: OracleError::RateLimited { retry_after: None },
        };
        assert_eq!(rate_limited.failure_reason(), FailureReason::RateLimited);

        let timeout = GenerationError::Exhausted {
            attempts: 3,
            source: OracleError::Timeout,
        };
        assert_eq!(timeout.failure_reason(), FailureReason::Transient);

        let truncated = GenerationError::Truncated {
            prompt_type: "meals",
            max_tokens: 10,
        };
        assert_eq!(truncated.failure_reason(), FailureReason::ValidationFailed);
        assert_eq!(
            GenerationError::contract("bad label").failure_reason(),
            FailureReason::ValidationFailed
        );
        assert_eq!(GenerationError::Unauthorized.failure_reason(), FailureReason::Unauthorized);
        assert_eq!(
            GenerationError::from(anyhow::anyhow!("db down")).failure_reason(),
            FailureReason::Internal
        );
    }

    #[test]
    fn truncation_message_names_the_prompt() {
        let err = GenerationError::Truncated {
            prompt_type: "meals",
            max_tokens: 512,
        };
        assert_eq!(
            err.to_string(),
            "meals output truncated at max_tokens=512; raise the token ceiling"
        );
        assert_eq!(err.kind(), "truncated");
    }
}
