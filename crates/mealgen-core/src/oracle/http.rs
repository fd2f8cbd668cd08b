//! HTTP adapter speaking the Messages API with a forced tool call.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::trait_def::Oracle;
use super::types::{OracleError, OracleReply, OracleRequest, StopReason};

pub const BASE_URL_ENV: &str = "MEALGEN_ORACLE_BASE_URL";
pub const API_KEY_ENV: &str = "MEALGEN_ORACLE_API_KEY";
pub const TIMEOUT_ENV: &str = "MEALGEN_ORACLE_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Longest slice of an error body kept in an `OracleError`.
const ERROR_BODY_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OracleConfig {
    /// Read `MEALGEN_ORACLE_BASE_URL`, `MEALGEN_ORACLE_API_KEY` and
    /// `MEALGEN_ORACLE_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        let timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [WireMessage<'a>; 1],
    tools: [WireTool<'a>; 1],
    tool_choice: ToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    output_tokens: u32,
}

fn build_body(request: &OracleRequest) -> MessagesRequest<'_> {
    MessagesRequest {
        model: &request.model,
        max_tokens: request.max_tokens,
        messages: [WireMessage {
            role: "user",
            content: &request.prompt,
        }],
        tools: [WireTool {
            name: &request.tool.name,
            description: &request.tool.description,
            input_schema: &request.tool.input_schema,
        }],
        tool_choice: ToolChoice {
            kind: "tool",
            name: &request.tool.name,
        },
    }
}

/// Decode a successful response body, picking out the named tool call.
fn parse_reply(body: &str, tool_name: &str) -> Result<OracleReply, OracleError> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::Malformed(format!("undecodable response body: {e}")))?;

    let tool_input = response.content.into_iter().find_map(|block| match block {
        ContentBlock::ToolUse { name, input } if name == tool_name => Some(input),
        _ => None,
    });

    Ok(OracleReply {
        tool_input,
        stop_reason: StopReason::parse(response.stop_reason.as_deref()),
        output_tokens: response.usage.map_or(0, |u| u.output_tokens),
    })
}

/// Map a non-success HTTP status onto the oracle error taxonomy.
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> OracleError {
    let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    match status.as_u16() {
        429 | 529 => OracleError::RateLimited { retry_after },
        408 => OracleError::Timeout,
        code if status.is_server_error() => OracleError::Server { status: code, body },
        code => OracleError::Rejected { status: code, body },
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Oracle backed by an HTTP Messages endpoint.
pub struct HttpOracle {
    client: Client,
    config: OracleConfig,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.timeout)
            .build()
            .context("failed to build oracle HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        let mut http_request = self
            .client
            .post(self.config.messages_url())
            .header("anthropic-version", API_VERSION)
            .json(&build_body(request));
        if let Some(ref key) = self.config.api_key {
            http_request = http_request.header("x-api-key", key);
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else if e.is_connect() {
                OracleError::Network(format!(
                    "cannot connect to oracle at {}: {e}",
                    self.config.base_url
                ))
            } else {
                OracleError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Network(format!("failed to read oracle response: {e}"))
            }
        })?;

        if !status.is_success() {
            return Err(classify_status(status, retry_after, &body));
        }

        let reply = parse_reply(&body, &request.tool.name)?;
        debug!(
            model = %request.model,
            tool = %request.tool.name,
            stop_reason = ?reply.stop_reason,
            output_tokens = reply.output_tokens,
            "oracle replied"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::oracle::types::ToolSpec;

    fn request() -> OracleRequest {
        OracleRequest {
            model: "planner-1".to_owned(),
            max_tokens: 4096,
            prompt: "Pick ingredients.".to_owned(),
            tool: ToolSpec {
                name: "select_core_ingredients".to_owned(),
                description: "Return the roster.".to_owned(),
                input_schema: json!({"type": "object"}),
            },
        }
    }

    #[test]
    fn body_forces_the_tool() {
        let req = request();
        let body = serde_json::to_value(build_body(&req)).unwrap();
        assert_eq!(
            body["tool_choice"],
            json!({"type": "tool", "name": "select_core_ingredients"})
        );
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn reply_extracts_tool_input_and_stop_reason() {
        let body = json!({
            "content": [
                {"type": "text", "text": "thinking"},
                {"type": "tool_use", "id": "t1", "name": "select_core_ingredients", "input": {"protein": []}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 42}
        })
        .to_string();
        let reply = parse_reply(&body, "select_core_ingredients").unwrap();
        assert_eq!(reply.tool_input, Some(json!({"protein": []})));
        assert_eq!(reply.stop_reason, StopReason::ToolUse);
        assert_eq!(reply.output_tokens, 42);
    }

    #[test]
    fn truncated_reply_without_tool_is_reported() {
        let body = json!({
            "content": [{"type": "thinking", "thinking": "..."}],
            "stop_reason": "max_tokens"
        })
        .to_string();
        let reply = parse_reply(&body, "select_core_ingredients").unwrap();
        assert_eq!(reply.tool_input, None);
        assert_eq!(reply.stop_reason, StopReason::MaxTokens);
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = parse_reply("not json", "x").unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn status_classification() {
        let secs = Some(Duration::from_secs(7));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, secs, ""),
            OracleError::RateLimited { retry_after: Some(d) } if d.as_secs() == 7
        ));
        assert!(matches!(
            classify_status(StatusCode::from_u16(529).unwrap(), None, ""),
            OracleError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, "oops"),
            OracleError::Server { status: 502, .. }
        ));
        let rejected = classify_status(StatusCode::BAD_REQUEST, None, &"x".repeat(2000));
        match rejected {
            OracleError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn messages_url_trims_trailing_slash() {
        let config = OracleConfig {
            base_url: "http://localhost:8080/".to_owned(),
            ..Default::default()
        };
        assert_eq!(config.messages_url(), "http://localhost:8080/v1/messages");
    }
}
