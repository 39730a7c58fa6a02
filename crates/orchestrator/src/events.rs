use crate::types::{ChatMessage, ToolCall, ToolCallResult};
use warden_approval::ApprovalRequest;

/// One item of the orchestrator's ordered event stream. The
/// non-streaming HTTP endpoint collects a full turn's events into one
/// response; a streaming endpoint would emit them as they occur.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Message(ChatMessage),
    Typing,
    ToolExecution(ToolCall),
    ToolResult(ToolCallResult),
    ApprovalRequired(ApprovalRequest),
    Error(String),
}
