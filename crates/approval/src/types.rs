use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use warden_registry::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// "ApprovalRequest".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub server_id: String,
    pub session_id: Option<String>,
    pub plugin_id: String,
    pub instance_id: String,
    pub message_id: Option<String>,
    pub operation: String,
    pub parameters: HashMap<String, Value>,
    pub risk_level: RiskLevel,
    pub reason: String,
    pub status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by: Option<String>,
    pub response_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
    Denied,
    Cancelled,
}

/// "AuditLogEntry". `parameters` is always the redacted view;
/// the plaintext form never reaches this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub server_id: String,
    pub plugin_id: String,
    pub session_id: Option<String>,
    pub approval_id: Option<String>,
    pub operation: String,
    pub parameters: HashMap<String, Value>,
    pub risk_level: RiskLevel,
    pub status: AuditStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub executed_by: String,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub server_id: Option<String>,
    pub plugin_id: Option<String>,
    pub session_id: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub status: Option<AuditStatus>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: usize,
    pub by_status: HashMap<String, usize>,
    pub by_risk_level: HashMap<String, usize>,
    pub last_24_hours: usize,
}
