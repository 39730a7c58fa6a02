use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llm::{LlmClient, LlmError, LlmResponse, ToolDefinition};
use crate::types::ChatMessage;

/// Deterministic, scripted LLM client for tests: returns queued responses
/// in order, erroring once the queue runs dry.
pub struct FakeLlmClient {
    scripted: Mutex<VecDeque<LlmResponse>>,
}

impl FakeLlmClient {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self { scripted: Mutex::new(responses.into()) }
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn chat(&self, _messages: &[ChatMessage], _tools: &[ToolDefinition]) -> Result<LlmResponse, LlmError> {
        self.scripted
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::Request("fake llm client has no scripted responses left".to_string()))
    }
}
