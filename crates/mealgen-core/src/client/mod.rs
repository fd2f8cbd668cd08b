//! Generation Client: the single choke point for oracle calls.
//!
//! Every call:
//! 1. passes through the [`ModelPolicy`] substitution layer,
//! 2. forces the oracle to answer through one tool whose schema is the only
//!    accepted output shape,
//! 3. fails fast on truncation, retries transient faults with backoff,
//! 4. records one [`AuditEntry`] per attempt.

pub mod audit;
pub mod policy;

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

pub use audit::{
    AuditEntry, AuditSink, MemoryAuditSink, PgAuditSink, TracingAuditSink, prompt_fingerprint,
};
pub use policy::{ModelPolicy, RetryPolicy};

use crate::error::GenerationError;
use crate::oracle::{Oracle, OracleError, OracleRequest, StopReason, ToolSpec};

/// Retries after the first attempt unless a stage asks otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// The four prompt families; also the audit log's prompt-type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Ingredients,
    Meals,
    Grocery,
    Prep,
}

impl PromptKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ingredients => "ingredients",
            Self::Meals => "meals",
            Self::Grocery => "grocery",
            Self::Prep => "prep",
        }
    }

    pub const fn tool_name(&self) -> &'static str {
        match self {
            Self::Ingredients => "select_core_ingredients",
            Self::Meals => "synthesize_meals",
            Self::Grocery => "consolidate_grocery_list",
            Self::Prep => "schedule_meal_prep",
        }
    }

    const fn tool_description(&self) -> &'static str {
        match self {
            Self::Ingredients => "Return the weekly core ingredient roster.",
            Self::Meals => "Return the week's meals built only from the roster.",
            Self::Grocery => "Return the consolidated grocery list.",
            Self::Prep => "Return the batch-cooking prep schedule.",
        }
    }
}

/// One structured-output request.
#[derive(Debug, Clone)]
pub struct CallSpec {
    pub kind: PromptKind,
    pub prompt: String,
    pub schema: Value,
    pub model: String,
    pub max_tokens: u32,
    pub max_retries: u32,
}

impl CallSpec {
    pub fn new(
        kind: PromptKind,
        prompt: String,
        schema: Value,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            kind,
            prompt,
            schema,
            model: model.into(),
            max_tokens,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

enum AttemptFailure {
    Truncated,
    Oracle(OracleError),
}

/// Calls the oracle on behalf of one caller. Cheap to clone.
#[derive(Clone)]
pub struct GenerationClient {
    oracle: Arc<dyn Oracle>,
    audit: Arc<dyn AuditSink>,
    policy: ModelPolicy,
    retry: RetryPolicy,
    caller: String,
}

impl GenerationClient {
    pub fn new(oracle: Arc<dyn Oracle>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            oracle,
            audit,
            policy: ModelPolicy::default(),
            retry: RetryPolicy::default(),
            caller: "system".to_owned(),
        }
    }

    pub fn with_policy(mut self, policy: ModelPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A copy that attributes audit entries to `caller`.
    pub fn with_caller(&self, caller: impl Into<String>) -> Self {
        let mut client = self.clone();
        client.caller = caller.into();
        client
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn policy(&self) -> &ModelPolicy {
        &self.policy
    }

    /// Issue `spec` and decode the forced tool input as `T`.
    ///
    /// Makes at most `spec.max_retries + 1` attempts. Truncation and
    /// non-transient rejections end the call immediately.
    pub async fn call<T: DeserializeOwned>(&self, spec: &CallSpec) -> Result<T, GenerationError> {
        let Some((model, max_tokens)) = self.policy.apply(&spec.model, spec.max_tokens) else {
            return Err(GenerationError::OracleDisabled);
        };

        let request = OracleRequest {
            model,
            max_tokens,
            prompt: spec.prompt.clone(),
            tool: ToolSpec {
                name: spec.kind.tool_name().to_owned(),
                description: spec.kind.tool_description().to_owned(),
                input_schema: spec.schema.clone(),
            },
        };
        let fingerprint = prompt_fingerprint(&spec.prompt);
        let attempts = spec.max_retries.saturating_add(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = self.attempt::<T>(&request).await;

            let (success, error_kind, output_chars, output_tokens) = match &outcome {
                Ok((_, chars, tokens)) => (true, None, *chars, Some(*tokens)),
                Err(AttemptFailure::Truncated) => (false, Some("truncated"), 0, None),
                Err(AttemptFailure::Oracle(e)) => (false, Some(e.kind()), 0, None),
            };
            self.audit.record(AuditEntry {
                caller: self.caller.clone(),
                prompt_type: spec.kind.as_str(),
                model: request.model.clone(),
                attempt,
                success,
                error_kind,
                output_chars,
                output_tokens,
                duration: started.elapsed(),
                prompt_sha256: fingerprint.clone(),
            });

            match outcome {
                Ok((value, _, _)) => {
                    debug!(
                        caller = %self.caller,
                        prompt_type = spec.kind.as_str(),
                        attempt,
                        "oracle call succeeded"
                    );
                    return Ok(value);
                }
                Err(AttemptFailure::Truncated) => {
                    return Err(GenerationError::Truncated {
                        prompt_type: spec.kind.as_str(),
                        max_tokens: request.max_tokens,
                    });
                }
                Err(AttemptFailure::Oracle(e)) if !e.is_transient() => {
                    return Err(GenerationError::Rejected(e));
                }
                Err(AttemptFailure::Oracle(e)) if attempt >= attempts => {
                    return Err(GenerationError::Exhausted {
                        attempts,
                        source: e,
                    });
                }
                Err(AttemptFailure::Oracle(e)) => {
                    let delay = self.retry.delay_for(attempt - 1, e.retry_after());
                    warn!(
                        caller = %self.caller,
                        prompt_type = spec.kind.as_str(),
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "oracle call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        request: &OracleRequest,
    ) -> Result<(T, usize, u32), AttemptFailure> {
        let reply = self
            .oracle
            .invoke(request)
            .await
            .map_err(AttemptFailure::Oracle)?;

        if reply.stop_reason == StopReason::MaxTokens {
            return Err(AttemptFailure::Truncated);
        }

        let input = reply.tool_input.ok_or_else(|| {
            AttemptFailure::Oracle(OracleError::Malformed(format!(
                "reply did not call tool {}",
                request.tool.name
            )))
        })?;
        let output_chars = input.to_string().len();
        let value = serde_json::from_value::<T>(input).map_err(|e| {
            AttemptFailure::Oracle(OracleError::Malformed(format!(
                "tool input does not match {}: {e}",
                request.tool.name
            )))
        })?;
        Ok((value, output_chars, reply.output_tokens))
    }
}
