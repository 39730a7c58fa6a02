use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use warden_approval::{ApprovalManager, ApprovalRequest, AuditLog, AuditStatus, CreateRequest, LogOperation};
use warden_registry::{InstanceRegistry, PluginTypeRegistry, RiskLevel, ToolContext};

use crate::events::ChatEvent;
use crate::llm::{LlmClient, ToolDefinition};
use crate::types::{ChatMessage, ChatRole, ChatSession, SessionStatus, ToolCall, ToolCallResult};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("chat session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} is not active")]
    SessionNotActive(String),

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),
}

fn tool_annotation(risk: RiskLevel, category: warden_registry::ToolCategory, requires_approval: bool) -> String {
    let approval = if requires_approval { " [Requires Approval]" } else { "" };
    format!("[Risk: {:?}] [Category: {:?}]{}", risk, category, approval)
}

/// Drives the user/LLM/plugin-tool loop for one or many chat sessions
///. `instances`/`plugin_types` supply tool definitions and
/// dispatch tool calls; `approvals` gates anything `executeTool` flags as
/// requiring human sign-off.
pub struct ChatOrchestrator {
    plugin_types: Arc<PluginTypeRegistry>,
    instances: Arc<InstanceRegistry>,
    approvals: Arc<ApprovalManager>,
    audit: Arc<AuditLog>,
    llm: Arc<dyn LlmClient>,
    sessions: RwLock<HashMap<String, ChatSession>>,
    messages: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl ChatOrchestrator {
    pub fn new(
        plugin_types: Arc<PluginTypeRegistry>,
        instances: Arc<InstanceRegistry>,
        approvals: Arc<ApprovalManager>,
        audit: Arc<AuditLog>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            plugin_types,
            instances,
            approvals,
            audit,
            llm,
            sessions: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
        }
    }

    fn build_system_prompt(&self, plugin_instance_ids: &[String]) -> String {
        let mut lines = vec![
            "You are Warden's operations assistant. You can call tools exposed by the \
             plugin instances attached to this session. Tools marked [Requires Approval] \
             will not execute until a human approves the request; you will be told the \
             outcome in a follow-up turn."
                .to_string(),
        ];
        for instance_id in plugin_instance_ids {
            if let Some(instance) = self.instances.get(instance_id) {
                if let Some(descriptor) = self.plugin_types.get(&instance.plugin_id).map(|b| b.descriptor()) {
                    lines.push(format!(
                        "- instance {} uses plugin '{}' ({}): {}",
                        instance_id, descriptor.name, descriptor.plugin_type, descriptor.description
                    ));
                }
            }
        }
        lines.join("\n")
    }

    pub fn create_session(
        &self,
        server_id: impl Into<String>,
        title: impl Into<String>,
        plugin_instance_ids: Vec<String>,
        created_by: Option<String>,
    ) -> ChatSession {
        let now = Utc::now();
        let system_context = self.build_system_prompt(&plugin_instance_ids);
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            server_id: server_id.into(),
            title: title.into(),
            status: SessionStatus::Active,
            plugin_instance_ids,
            system_context: Some(system_context.clone()),
            created_at: now,
            updated_at: now,
            closed_at: None,
            created_by,
        };

        let system_message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            role: ChatRole::System,
            content: system_context,
            tool_calls: None,
            tool_results: None,
            metadata: None,
            created_at: now,
        };

        self.sessions.write().insert(session.id.clone(), session.clone());
        self.messages.write().insert(session.id.clone(), vec![system_message]);
        session
    }

    pub fn get_session(&self, session_id: &str) -> Option<ChatSession> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn list_sessions(&self, server_id: &str) -> Vec<ChatSession> {
        self.sessions.read().values().filter(|s| s.server_id == server_id).cloned().collect()
    }

    /// `POST /api/sessions/:sid/close`: terminal, irreversible.
    pub fn close_session(&self, session_id: &str) -> Result<ChatSession, OrchestratorError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;
        session.status = SessionStatus::Closed;
        session.closed_at = Some(Utc::now());
        Ok(session.clone())
    }

    /// Feedback follow-up path: a separate code path from
    /// the tool-calling turn loop, using the same LLM client.
    pub async fn feedback_followup(
        &self,
        request: crate::feedback::FeedbackRequest,
    ) -> Result<crate::feedback::FeedbackResponse, OrchestratorError> {
        crate::feedback::run_feedback_followup(self.llm.as_ref(), request)
            .await
            .map_err(OrchestratorError::from)
    }

    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.messages.read().get(session_id).cloned().unwrap_or_default()
    }

    fn collect_tool_definitions(&self, plugin_instance_ids: &[String]) -> Vec<(String, ToolDefinition)> {
        let mut definitions = Vec::new();
        for instance_id in plugin_instance_ids {
            let Some(tools) = self.instances.get_instance_tools(instance_id) else { continue };
            for tool in tools {
                let description = format!(
                    "{} {}",
                    tool.description,
                    tool_annotation(tool.risk_level, tool.category, tool.requires_approval)
                );
                let parameters_schema = json!({
                    "type": "object",
                    "properties": tool.parameters.iter().map(|p| {
                        (p.name.clone(), json!({ "type": format!("{:?}", p.param_type).to_lowercase() }))
                    }).collect::<serde_json::Map<_, _>>(),
                    "required": tool.parameters.iter().filter(|p| p.required).map(|p| p.name.clone()).collect::<Vec<_>>(),
                });
                definitions.push((
                    instance_id.clone(),
                    ToolDefinition {
                        instance_id: instance_id.clone(),
                        name: tool.name.clone(),
                        description,
                        parameters_schema,
                    },
                ));
            }
        }
        definitions
    }

    fn push_message(&self, session_id: &str, message: ChatMessage) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.updated_at = message.created_at;
        }
        self.messages.write().entry(session_id.to_string()).or_default().push(message);
    }

    /// One user turn of the six-step gather/call/dispatch/reprompt
    /// algorithm. Returns the ordered event sequence for this turn; the
    /// HTTP layer either collects it into one response or forwards events
    /// as they're produced.
    pub async fn run_turn(
        &self,
        session_id: &str,
        user_input: &str,
        user_id: Option<String>,
    ) -> Result<Vec<ChatEvent>, OrchestratorError> {
        let session = self
            .get_session(session_id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;
        if session.status != SessionStatus::Active {
            return Err(OrchestratorError::SessionNotActive(session_id.to_string()));
        }

        let mut events = Vec::new();
        let now = Utc::now();

        // Step 1: append user message.
        let user_message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: ChatRole::User,
            content: user_input.to_string(),
            tool_calls: None,
            tool_results: None,
            metadata: None,
            created_at: now,
        };
        self.push_message(session_id, user_message.clone());
        events.push(ChatEvent::Message(user_message));

        // Step 2: compose tool definitions from every attached instance.
        let tool_defs = self.collect_tool_definitions(&session.plugin_instance_ids);
        let tools: Vec<ToolDefinition> = tool_defs.iter().map(|(_, t)| t.clone()).collect();

        events.push(ChatEvent::Typing);

        // Step 3: call the LLM with full history and tool set.
        let history = self.history(session_id);
        let response = self.llm.chat(&history, &tools).await?;

        if response.tool_calls.is_empty() {
            let assistant_message = ChatMessage {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                role: ChatRole::Assistant,
                content: response.content,
                tool_calls: None,
                tool_results: None,
                metadata: None,
                created_at: Utc::now(),
            };
            self.push_message(session_id, assistant_message.clone());
            events.push(ChatEvent::Message(assistant_message));
            return Ok(events);
        }

        // Step 4: dispatch every tool call, collecting results and any
        // approval sentinels.
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();
        for call in &response.tool_calls {
            let Some((instance_id, _)) = tool_defs.iter().find(|(_, t)| t.name == call.tool_name) else {
                tool_results.push(ToolCallResult {
                    tool_call_id: call.id.clone(),
                    success: false,
                    output: None,
                    error: Some(format!("no attached instance exposes tool '{}'", call.tool_name)),
                    requires_approval: false,
                    approval_id: None,
                });
                continue;
            };

            let tool_call = ToolCall {
                id: call.id.clone(),
                instance_id: instance_id.clone(),
                tool_name: call.tool_name.clone(),
                parameters: call.parameters.clone(),
            };
            events.push(ChatEvent::ToolExecution(tool_call.clone()));

            let context = ToolContext {
                server_id: session.server_id.clone(),
                session_id: Some(session_id.to_string()),
                user_id: user_id.clone(),
                approval_id: None,
            };

            let real_plugin_id =
                self.instances.get(instance_id).map(|i| i.plugin_id.clone()).unwrap_or_else(|| instance_id.clone());
            let risk_level = self
                .instances
                .get_instance_tools(instance_id)
                .and_then(|tools| tools.into_iter().find(|t| t.name == call.tool_name).map(|t| t.risk_level))
                .unwrap_or(RiskLevel::Low);

            let started = std::time::Instant::now();
            let result = self
                .instances
                .execute_tool(instance_id, &call.tool_name, call.parameters.clone(), context)
                .await;

            let call_result = match result {
                Ok(outcome) if outcome.requires_approval => {
                    let pending = outcome.approval_request.expect("requires_approval implies approval_request");
                    let approval = self.approvals.create_request(
                        CreateRequest {
                            server_id: session.server_id.clone(),
                            session_id: Some(session_id.to_string()),
                            plugin_id: real_plugin_id,
                            instance_id: instance_id.clone(),
                            message_id: None,
                            operation: pending.operation.clone(),
                            parameters: pending.parameters.clone(),
                            risk_level: pending.risk_level,
                            reason: pending.reason.clone(),
                            expires_at: None,
                        },
                        Utc::now(),
                    );
                    events.push(ChatEvent::ApprovalRequired(approval.clone()));
                    ToolCallResult {
                        tool_call_id: call.id.clone(),
                        success: false,
                        output: None,
                        error: None,
                        requires_approval: true,
                        approval_id: Some(approval.id),
                    }
                }
                Ok(outcome) => {
                    self.audit.log_operation(
                        LogOperation {
                            server_id: session.server_id.clone(),
                            plugin_id: real_plugin_id,
                            session_id: Some(session_id.to_string()),
                            approval_id: None,
                            operation: call.tool_name.clone(),
                            parameters: call.parameters.clone(),
                            risk_level,
                            status: if outcome.success { AuditStatus::Success } else { AuditStatus::Failed },
                            result: outcome.output.clone(),
                            error: outcome.error.clone(),
                            executed_by: user_id.clone().unwrap_or_else(|| "chat".to_string()),
                            execution_time_ms: started.elapsed().as_millis() as u64,
                        },
                        Utc::now(),
                    );
                    ToolCallResult {
                        tool_call_id: call.id.clone(),
                        success: outcome.success,
                        output: outcome.output,
                        error: outcome.error,
                        requires_approval: false,
                        approval_id: None,
                    }
                }
                Err(err) => ToolCallResult {
                    tool_call_id: call.id.clone(),
                    success: false,
                    output: None,
                    error: Some(err.to_string()),
                    requires_approval: false,
                    approval_id: None,
                },
            };
            events.push(ChatEvent::ToolResult(call_result.clone()));
            tool_calls.push(tool_call);
            tool_results.push(call_result);
        }

        // Step 5: one assistant message carrying all calls/results, plus one
        // `tool` message per result for the follow-up LLM call.
        let assistant_message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: ChatRole::Assistant,
            content: response.content,
            tool_calls: Some(tool_calls),
            tool_results: Some(tool_results.clone()),
            metadata: None,
            created_at: Utc::now(),
        };
        self.push_message(session_id, assistant_message.clone());
        events.push(ChatEvent::Message(assistant_message));

        for result in &tool_results {
            let tool_message = ChatMessage {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                role: ChatRole::Tool,
                content: serialize_tool_result(result),
                tool_calls: None,
                tool_results: None,
                metadata: None,
                created_at: Utc::now(),
            };
            self.push_message(session_id, tool_message.clone());
            events.push(ChatEvent::Message(tool_message));
        }

        // Step 6: a single follow-up call, without tool bindings, to let the
        // model narrate the results.
        let history = self.history(session_id);
        let followup = self.llm.chat(&history, &[]).await?;
        let followup_message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: ChatRole::Assistant,
            content: followup.content,
            tool_calls: None,
            tool_results: None,
            metadata: None,
            created_at: Utc::now(),
        };
        self.push_message(session_id, followup_message.clone());
        events.push(ChatEvent::Message(followup_message));

        Ok(events)
    }

    /// Approval resolution: re-invoke the tool with
    /// `context.approvalId` set so the registry skips the approval check,
    /// bind the outcome to the approval id.
    pub async fn resolve_approved_tool_call(
        &self,
        approval: &ApprovalRequest,
    ) -> Result<warden_registry::ToolResult, OrchestratorError> {
        let context = ToolContext {
            server_id: approval.server_id.clone(),
            session_id: approval.session_id.clone(),
            user_id: None,
            approval_id: Some(approval.id.clone()),
        };
        let result = self
            .instances
            .execute_tool(&approval.instance_id, &approval.operation, approval.parameters.clone(), context)
            .await
            .map_err(|e| crate::llm::LlmError::Request(e.to_string()))?;
        Ok(result)
    }
}

fn serialize_tool_result(result: &ToolCallResult) -> String {
    let payload = json!({
        "success": result.success,
        "output": result.output,
        "error": result.error,
    });
    payload.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_client::FakeLlmClient;
    use crate::llm::{LlmResponse, LlmToolCall};
    use std::collections::HashMap as StdHashMap;
    use warden_registry::plugins::filesystem::FilesystemStatsPlugin;
    use warden_vault::{Vault, VaultKey};

    async fn harness(llm_responses: Vec<LlmResponse>) -> (ChatOrchestrator, String) {
        let plugin_types = Arc::new(PluginTypeRegistry::new());
        plugin_types.register(Arc::new(FilesystemStatsPlugin::new())).unwrap();
        let vault = Arc::new(Vault::new(VaultKey::from_hex(&"22".repeat(32)).unwrap()));
        let instances = Arc::new(InstanceRegistry::with_health_interval(
            plugin_types.clone(),
            vault,
            std::time::Duration::from_secs(3600),
        ));
        let instance = instances.create_instance("server-1", "filesystem-stats", StdHashMap::new()).await.unwrap();
        let approvals = Arc::new(ApprovalManager::new());
        let audit = Arc::new(AuditLog::new());
        let llm = Arc::new(FakeLlmClient::new(llm_responses));
        let orchestrator = ChatOrchestrator::new(plugin_types, instances, approvals, audit, llm);
        (orchestrator, instance.id)
    }

    #[tokio::test]
    async fn turn_without_tool_calls_appends_single_assistant_message() {
        let (orchestrator, instance_id) =
            harness(vec![LlmResponse { content: "all good".to_string(), tool_calls: vec![] }]).await;
        let session = orchestrator.create_session("server-1", "chat", vec![instance_id], None);

        let events = orchestrator.run_turn(&session.id, "how's disk usage?", None).await.unwrap();
        let messages: Vec<_> = events
            .into_iter()
            .filter_map(|e| if let ChatEvent::Message(m) = e { Some(m) } else { None })
            .collect();
        assert_eq!(messages.len(), 2); // user + assistant
        assert_eq!(messages[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn read_only_tool_call_executes_and_triggers_followup() {
        let mut params = StdHashMap::new();
        params.insert("path".to_string(), json!("/"));
        let (orchestrator, instance_id) = harness(vec![
            LlmResponse {
                content: "checking disk".to_string(),
                tool_calls: vec![LlmToolCall { id: "call-1".to_string(), tool_name: "disk_usage".to_string(), parameters: params }],
            },
            LlmResponse { content: "disk looks healthy".to_string(), tool_calls: vec![] },
        ])
        .await;
        let session = orchestrator.create_session("server-1", "chat", vec![instance_id], None);

        let events = orchestrator.run_turn(&session.id, "check disk", None).await.unwrap();
        assert!(events.iter().any(|e| matches!(e, ChatEvent::ToolExecution(_))));
        assert!(events.iter().any(|e| matches!(e, ChatEvent::ToolResult(r) if r.success)));
        let last_message = orchestrator.history(&session.id).last().cloned().unwrap();
        assert_eq!(last_message.content, "disk looks healthy");
    }

    #[tokio::test]
    async fn admin_tool_call_creates_approval_request() {
        let mut params = StdHashMap::new();
        params.insert("path".to_string(), json!("/tmp/orphan"));
        let (orchestrator, instance_id) = harness(vec![
            LlmResponse {
                content: "deleting orphan".to_string(),
                tool_calls: vec![LlmToolCall { id: "call-1".to_string(), tool_name: "delete_path".to_string(), parameters: params }],
            },
            LlmResponse { content: "awaiting approval".to_string(), tool_calls: vec![] },
        ])
        .await;
        let session = orchestrator.create_session("server-1", "chat", vec![instance_id], None);

        let events = orchestrator.run_turn(&session.id, "clean up /tmp/orphan", None).await.unwrap();
        assert!(events.iter().any(|e| matches!(e, ChatEvent::ApprovalRequired(_))));
    }

    #[tokio::test]
    async fn turn_on_unknown_session_fails() {
        let (orchestrator, _instance_id) = harness(vec![]).await;
        let err = orchestrator.run_turn("missing", "hi", None).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionNotFound(_)));
    }
}
