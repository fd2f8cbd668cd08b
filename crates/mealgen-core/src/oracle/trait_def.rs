//! The `Oracle` trait: one call primitive over a generative model.

use async_trait::async_trait;

use super::types::{OracleError, OracleReply, OracleRequest};

/// A generative model that answers a prompt by calling the supplied tool.
///
/// Implementations must not retry on their own; retry policy belongs to the
/// [`crate::client::GenerationClient`].
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Short name used in logs (e.g. "http").
    fn name(&self) -> &str;

    /// Issue one request and return the raw reply.
    async fn invoke(&self, request: &OracleRequest) -> Result<OracleReply, OracleError>;
}

// Compile-time assertion: Oracle must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Oracle) {}
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::oracle::types::{StopReason, ToolSpec};

    struct EchoOracle;

    #[async_trait]
    impl Oracle for EchoOracle {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
            Ok(OracleReply {
                tool_input: Some(json!({ "prompt": request.prompt })),
                stop_reason: StopReason::ToolUse,
                output_tokens: 3,
            })
        }
    }

    #[tokio::test]
    async fn oracle_is_usable_as_trait_object() {
        let oracle: Arc<dyn Oracle> = Arc::new(EchoOracle);
        let request = OracleRequest {
            model: "m".to_owned(),
            max_tokens: 100,
            prompt: "hello".to_owned(),
            tool: ToolSpec {
                name: "echo".to_owned(),
                description: String::new(),
                input_schema: json!({"type": "object"}),
            },
        };
        let reply = oracle.invoke(&request).await.unwrap();
        assert_eq!(oracle.name(), "echo");
        assert_eq!(reply.tool_input, Some(json!({"prompt": "hello"})));
    }
}
