//! Chat orchestrator driving the user/LLM/plugin-tool loop:
//! session bootstrap with a plugin-aware system prompt, the per-turn
//! tool-calling algorithm, and the feedback follow-up path.

mod events;
mod fake_client;
mod feedback;
mod llm;
mod openai_client;
mod orchestrator;
mod types;

pub use events::ChatEvent;
pub use fake_client::FakeLlmClient;
pub use feedback::{parse_feedback_response, run_feedback_followup, FeedbackRequest, FeedbackResponse};
pub use llm::{LlmClient, LlmError, LlmResponse, LlmToolCall, ToolDefinition};
pub use openai_client::OpenAiClient;
pub use orchestrator::{ChatOrchestrator, OrchestratorError};
pub use types::{ChatMessage, ChatRole, ChatSession, SessionStatus, ToolCall, ToolCallResult};
