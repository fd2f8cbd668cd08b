//! Model substitution and retry backoff policies.

use std::time::Duration;

use rand::Rng;

/// Substitution layer applied to every call before it reaches the oracle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ModelPolicy {
    /// Use the model and ceiling the stage asked for.
    #[default]
    PassThrough,
    /// Replace the model; clamp the token ceiling when `token_cap` is set.
    Override {
        model: String,
        token_cap: Option<u32>,
    },
    /// Refuse every call before any network I/O.
    Disabled,
}

impl ModelPolicy {
    /// The `(model, max_tokens)` actually sent, or `None` when calls are
    /// disabled.
    pub fn apply(&self, model: &str, max_tokens: u32) -> Option<(String, u32)> {
        match self {
            Self::PassThrough => Some((model.to_owned(), max_tokens)),
            Self::Override { model, token_cap } => {
                let ceiling = token_cap.map_or(max_tokens, |cap| max_tokens.min(cap));
                Some((model.clone(), ceiling))
            }
            Self::Disabled => None,
        }
    }
}

/// Exponential backoff with jitter.
///
/// The delay before retry `n` (0-based) is `min(base * 2^n, max)` plus a
/// uniform jitter in `0..=jitter`, raised to any server-provided hint. The
/// hint itself is capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// No waiting at all; for tests.
    pub const fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        let delay = backoff + jitter;
        hint.map_or(delay, |h| delay.max(h.min(self.max_delay)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_replaces_model_and_clamps_ceiling() {
        let policy = ModelPolicy::Override {
            model: "fast".to_owned(),
            token_cap: Some(2000),
        };
        assert_eq!(policy.apply("planner", 8000), Some(("fast".to_owned(), 2000)));
        assert_eq!(policy.apply("planner", 500), Some(("fast".to_owned(), 500)));
        assert_eq!(
            ModelPolicy::PassThrough.apply("planner", 8000),
            Some(("planner".to_owned(), 8000))
        );
        assert_eq!(ModelPolicy::Disabled.apply("planner", 8000), None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(5));
    }

    #[test]
    fn jitter_and_hint_bound_the_delay() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(100),
        };
        for _ in 0..20 {
            let d = policy.delay_for(0, None);
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_millis(1100));
        }
        let hinted = policy.delay_for(0, Some(Duration::from_secs(8)));
        assert!(hinted >= Duration::from_secs(8));
    }

    #[test]
    fn oversized_hint_is_capped_at_max_delay() {
        let policy = RetryPolicy::default();
        let d = policy.delay_for(0, Some(Duration::from_secs(86_400)));
        assert_eq!(d, policy.max_delay);

        let immediate = RetryPolicy::immediate();
        assert_eq!(
            immediate.delay_for(2, Some(Duration::from_secs(60))),
            Duration::ZERO
        );
    }
}
