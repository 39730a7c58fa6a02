use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use warden_alerts::Alert;
use warden_approval::{ApprovalRequest, AuditLogEntry};
use warden_collector::MetricSample;
use warden_issues::{Issue, IssueComment};
use warden_orchestrator::{ChatMessage, ChatSession};
use warden_registry::{Plugin, PluginInstance};

use crate::adaptor::StorageAdaptor;
use crate::error::StorageError;
use crate::types::{AgentAction, AgentResponse, Server};

#[derive(Default)]
struct Tables {
    servers: HashMap<String, Server>,
    alerts: HashMap<String, Alert>,
    agent_responses: Vec<AgentResponse>,
    agent_actions: Vec<AgentAction>,
    metrics_snapshots: Vec<(String, MetricSample)>,
    issues: HashMap<String, Issue>,
    issue_comments: Vec<IssueComment>,
    plugins: HashMap<String, Plugin>,
    plugin_instances: HashMap<String, PluginInstance>,
    chat_sessions: HashMap<String, ChatSession>,
    chat_messages: Vec<ChatMessage>,
    approval_requests: HashMap<String, ApprovalRequest>,
    audit_log: Vec<AuditLogEntry>,
}

/// In-memory `StorageAdaptor` for tests and local development — no
/// persistence across restarts.
#[derive(Default)]
pub struct MemoryAdaptor {
    tables: Mutex<Tables>,
}

impl MemoryAdaptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert_count(&self) -> usize {
        self.tables.lock().alerts.len()
    }

    pub fn issue_count(&self) -> usize {
        self.tables.lock().issues.len()
    }

    pub fn metrics_snapshot_count(&self) -> usize {
        self.tables.lock().metrics_snapshots.len()
    }

    pub fn chat_message_count(&self) -> usize {
        self.tables.lock().chat_messages.len()
    }

    pub fn audit_log_count(&self) -> usize {
        self.tables.lock().audit_log.len()
    }
}

#[async_trait]
impl StorageAdaptor for MemoryAdaptor {
    async fn upsert_server(&self, server: &Server) -> Result<(), StorageError> {
        self.tables.lock().servers.insert(server.id.clone(), server.clone());
        Ok(())
    }

    async fn insert_alert(&self, _server_id: &str, alert: &Alert) -> Result<(), StorageError> {
        self.tables.lock().alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.lock();
        let alert = tables.alerts.get_mut(alert_id).ok_or_else(|| StorageError::NotFound(alert_id.to_string()))?;
        alert.resolved_at = Some(Utc::now());
        Ok(())
    }

    async fn acknowledge_alert(&self, alert_id: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.lock();
        let alert = tables.alerts.get_mut(alert_id).ok_or_else(|| StorageError::NotFound(alert_id.to_string()))?;
        alert.acknowledged = true;
        Ok(())
    }

    async fn insert_agent_response(&self, response: &AgentResponse) -> Result<(), StorageError> {
        self.tables.lock().agent_responses.push(response.clone());
        Ok(())
    }

    async fn insert_agent_action(&self, action: &AgentAction) -> Result<(), StorageError> {
        self.tables.lock().agent_actions.push(action.clone());
        Ok(())
    }

    async fn insert_metrics_snapshot(&self, server_id: &str, sample: &MetricSample) -> Result<(), StorageError> {
        self.tables.lock().metrics_snapshots.push((server_id.to_string(), sample.clone()));
        Ok(())
    }

    async fn upsert_issue(&self, issue: &Issue) -> Result<(), StorageError> {
        self.tables.lock().issues.insert(issue.id.clone(), issue.clone());
        Ok(())
    }

    async fn insert_issue_comment(&self, comment: &IssueComment) -> Result<(), StorageError> {
        self.tables.lock().issue_comments.push(comment.clone());
        Ok(())
    }

    async fn upsert_plugin(&self, plugin: &Plugin) -> Result<(), StorageError> {
        self.tables.lock().plugins.insert(plugin.id.clone(), plugin.clone());
        Ok(())
    }

    async fn upsert_plugin_instance(&self, instance: &PluginInstance) -> Result<(), StorageError> {
        self.tables.lock().plugin_instances.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn remove_plugin_instance(&self, instance_id: &str) -> Result<(), StorageError> {
        self.tables.lock().plugin_instances.remove(instance_id);
        Ok(())
    }

    async fn upsert_chat_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        self.tables.lock().chat_sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), StorageError> {
        self.tables.lock().chat_messages.push(message.clone());
        Ok(())
    }

    async fn upsert_approval_request(&self, request: &ApprovalRequest) -> Result<(), StorageError> {
        self.tables.lock().approval_requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn insert_audit_log_entry(&self, entry: &AuditLogEntry) -> Result<(), StorageError> {
        self.tables.lock().audit_log.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerStatus;

    fn sample_server() -> Server {
        Server {
            id: "server-1".to_string(),
            hostname: "host-a".to_string(),
            ip: "10.0.0.1".to_string(),
            os: "linux".to_string(),
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
            status: ServerStatus::Active,
        }
    }

    #[tokio::test]
    async fn upsert_server_then_alert_round_trips() {
        let adaptor = MemoryAdaptor::new();
        adaptor.upsert_server(&sample_server()).await.unwrap();

        let alert = Alert {
            id: "alert-1".to_string(),
            fingerprint: "f".repeat(64),
            severity: warden_rules::Severity::Critical,
            message: "cpu high".to_string(),
            metric: "cpu.usage".to_string(),
            current_value: 95.0,
            threshold: 90.0,
            created_at: Utc::now(),
            resolved_at: None,
            acknowledged: false,
            source: "rules".to_string(),
            metadata: Default::default(),
        };
        adaptor.insert_alert("server-1", &alert).await.unwrap();
        assert_eq!(adaptor.alert_count(), 1);

        adaptor.acknowledge_alert("alert-1").await.unwrap();
        adaptor.resolve_alert("alert-1").await.unwrap();
    }

    #[tokio::test]
    async fn resolve_unknown_alert_returns_not_found() {
        let adaptor = MemoryAdaptor::new();
        let err = adaptor.resolve_alert("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
