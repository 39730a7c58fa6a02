use async_trait::async_trait;

use warden_alerts::Alert;
use warden_approval::{ApprovalRequest, AuditLogEntry};
use warden_collector::MetricSample;
use warden_issues::{Issue, IssueComment};
use warden_orchestrator::{ChatMessage, ChatSession};
use warden_registry::{Plugin, PluginInstance};

use crate::error::StorageError;
use crate::types::{AgentAction, AgentResponse, Server};

/// One method per durable entity family the core writes. The schema behind any implementation is illustrative, not
/// normative — any store providing equivalent queries is acceptable.
#[async_trait]
pub trait StorageAdaptor: Send + Sync {
    async fn upsert_server(&self, server: &Server) -> Result<(), StorageError>;

    async fn insert_alert(&self, server_id: &str, alert: &Alert) -> Result<(), StorageError>;
    async fn resolve_alert(&self, alert_id: &str) -> Result<(), StorageError>;
    async fn acknowledge_alert(&self, alert_id: &str) -> Result<(), StorageError>;

    async fn insert_agent_response(&self, response: &AgentResponse) -> Result<(), StorageError>;
    async fn insert_agent_action(&self, action: &AgentAction) -> Result<(), StorageError>;

    /// Called on every Nth sample; the caller is responsible
    /// for the downsampling decision, not this trait.
    async fn insert_metrics_snapshot(&self, server_id: &str, sample: &MetricSample) -> Result<(), StorageError>;

    async fn upsert_issue(&self, issue: &Issue) -> Result<(), StorageError>;
    async fn insert_issue_comment(&self, comment: &IssueComment) -> Result<(), StorageError>;

    async fn upsert_plugin(&self, plugin: &Plugin) -> Result<(), StorageError>;
    async fn upsert_plugin_instance(&self, instance: &PluginInstance) -> Result<(), StorageError>;
    async fn remove_plugin_instance(&self, instance_id: &str) -> Result<(), StorageError>;

    async fn upsert_chat_session(&self, session: &ChatSession) -> Result<(), StorageError>;
    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), StorageError>;

    async fn upsert_approval_request(&self, request: &ApprovalRequest) -> Result<(), StorageError>;
    async fn insert_audit_log_entry(&self, entry: &AuditLogEntry) -> Result<(), StorageError>;
}
