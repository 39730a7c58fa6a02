use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Read,
    Optimize,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    #[serde(rename = "enum")]
    pub allowed_values: Option<Vec<String>>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginTool {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub risk_level: RiskLevel,
    pub requires_approval: bool,
    pub category: ToolCategory,
    pub examples: Option<Vec<String>>,
}

/// "Plugin (type)" — registered once at startup, immutable until
/// process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub tools: Vec<PluginTool>,
    pub risk_levels: Vec<RiskLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Active,
    Inactive,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// "PluginInstance" — a per-server, configured, live connection.
/// `config` is stored already vault-encrypted; the registry never holds
/// plaintext secrets longer than the call that constructed the instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInstance {
    pub id: String,
    pub server_id: String,
    pub plugin_id: String,
    pub config: HashMap<String, Value>,
    pub status: InstanceStatus,
    pub health_status: HealthStatus,
    pub health_message: Option<String>,
    pub enabled: bool,
    pub last_health_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Caller context threaded through `executeTool`.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub server_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    /// Set when a human has already approved this exact invocation; makes
    /// the registry skip the approval-requirement check.
    pub approval_id: Option<String>,
}

/// Outcome of one `executeTool` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub requires_approval: bool,
    pub approval_request: Option<PendingApproval>,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            requires_approval: false,
            approval_request: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            requires_approval: false,
            approval_request: None,
        }
    }

    pub fn needs_approval(request: PendingApproval) -> Self {
        Self {
            success: false,
            output: None,
            error: None,
            requires_approval: true,
            approval_request: Some(request),
        }
    }
}

/// The approval-shaped sentinel `executeTool` returns when a tool requires
/// human sign-off before it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    pub operation: String,
    pub parameters: HashMap<String, Value>,
    pub reason: String,
    pub risk_level: RiskLevel,
}
