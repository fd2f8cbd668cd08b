//! An oracle that plays back scripted replies per tool.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use mealgen_core::oracle::{Oracle, OracleError, OracleReply, OracleRequest, StopReason};

type Step = Result<OracleReply, OracleError>;

/// Replies come from a per-tool queue in the order they were scripted. A
/// tool with an empty queue is answered with a non-transient rejection so a
/// test fails loudly instead of retrying.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<OracleRequest>>,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, tool: &str, step: Step) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(tool.to_owned())
            .or_default()
            .push_back(step);
        self
    }

    /// Answer the next call to `tool` with `input`.
    pub fn reply(self, tool: &str, input: Value) -> Self {
        self.push(
            tool,
            Ok(OracleReply {
                tool_input: Some(input),
                stop_reason: StopReason::ToolUse,
                output_tokens: 512,
            }),
        )
    }

    /// Report that the next call to `tool` ran out of output budget.
    pub fn truncated(self, tool: &str) -> Self {
        self.push(
            tool,
            Ok(OracleReply {
                tool_input: None,
                stop_reason: StopReason::MaxTokens,
                output_tokens: 0,
            }),
        )
    }

    /// Fail the next call to `tool` with `error`.
    pub fn fail(self, tool: &str, error: OracleError) -> Self {
        self.push(tool, Err(error))
    }

    /// Sleep before every reply, to make concurrent branches overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tools_called(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.tool.name)
            .collect()
    }

    pub fn call_count(&self, tool: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tool.name == tool)
            .count()
    }

    /// Replies scripted but never consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let step = self
            .script
            .lock()
            .unwrap()
            .get_mut(&request.tool.name)
            .and_then(VecDeque::pop_front);
        step.unwrap_or_else(|| {
            Err(OracleError::Rejected {
                status: 400,
                body: format!("no scripted reply for {}", request.tool.name),
            })
        })
    }
}
