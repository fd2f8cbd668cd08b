//! Request, reply and error types for oracle calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single tool the oracle is forced to call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool input: the only accepted output shape.
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub model: String,
    pub max_tokens: u32,
    pub prompt: String,
    pub tool: ToolSpec,
}

/// Why the oracle stopped producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    /// Output budget exhausted; the reply is truncated.
    MaxTokens,
    Other,
}

impl StopReason {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("end_turn") => Self::EndTurn,
            Some("tool_use") => Self::ToolUse,
            Some("max_tokens") => Self::MaxTokens,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleReply {
    /// Input of the forced tool call, absent if the oracle answered in text.
    pub tool_input: Option<Value>,
    pub stop_reason: StopReason,
    pub output_tokens: u32,
}

/// Faults raised by an oracle adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("rate limited by oracle")]
    RateLimited { retry_after: Option<Duration> },

    #[error("oracle request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("oracle server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("oracle rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// Stable tag recorded in the audit log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Server { .. } => "server",
            Self::Rejected { .. } => "rejected",
            Self::Malformed(_) => "malformed",
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
