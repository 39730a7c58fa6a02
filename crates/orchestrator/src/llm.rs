use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::ChatMessage;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(String),

    #[error("llm response timed out")]
    Timeout,

    #[error("llm returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// A tool definition exposed to the model, annotated step 2:
/// `[Risk: X] [Category: Y] [Requires Approval]?` folded into `description`.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub instance_id: String,
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

#[derive(Debug, Clone)]
pub struct LlmToolCall {
    pub id: String,
    pub tool_name: String,
    pub parameters: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<LlmToolCall>,
}

/// The target-language LLM client contract, modeled on
/// `nexus::protocols::adapter::ProtocolAdapter`'s translate-then-forward
/// shape: a single async entry point that turns a unified request into a
/// unified response, with the wire format an implementation detail.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError>;
}
