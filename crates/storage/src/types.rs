use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Active,
    Offline,
}

/// "Server (agent identity)". Created once at bootstrap; deleted
/// only by an external operator, never by the agent itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub hostname: String,
    pub ip: String,
    pub os: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: ServerStatus,
}

/// An LLM analysis of an issue. Schema is
/// illustrative, not normative; this is the minimal shape the core writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub id: String,
    pub server_id: String,
    pub issue_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentActionStatus {
    Proposed,
    Executed,
    Rejected,
}

/// A remediation action proposed alongside an `AgentResponse`, tying back
/// to the tool call and approval (if any) that carried it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    pub id: String,
    pub response_id: String,
    pub description: String,
    pub tool_call_id: Option<String>,
    pub approval_id: Option<String>,
    pub status: AgentActionStatus,
    pub created_at: DateTime<Utc>,
}
