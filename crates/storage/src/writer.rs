use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use warden_alerts::Alert;
use warden_approval::{ApprovalRequest, AuditLogEntry};
use warden_collector::MetricSample;
use warden_issues::{Issue, IssueComment};
use warden_orchestrator::{ChatMessage, ChatSession};
use warden_registry::PluginInstance;

use crate::adaptor::StorageAdaptor;
use crate::types::{AgentAction, AgentResponse, Server};

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// One durable write, queued off the collector/chat critical path: writes
/// are treated as best-effort and never block the subsystem that produced
/// them.
pub enum WriteJob {
    UpsertServer(Server),
    InsertAlert { server_id: String, alert: Alert },
    ResolveAlert(String),
    AcknowledgeAlert(String),
    InsertAgentResponse(AgentResponse),
    InsertAgentAction(AgentAction),
    InsertMetricsSnapshot { server_id: String, sample: MetricSample },
    UpsertIssue(Issue),
    InsertIssueComment(IssueComment),
    UpsertPluginInstance(PluginInstance),
    RemovePluginInstance(String),
    UpsertChatSession(ChatSession),
    InsertChatMessage(ChatMessage),
    UpsertApprovalRequest(ApprovalRequest),
    InsertAuditLogEntry(AuditLogEntry),
}

/// Handle held by producers (collector tick, alert/issue managers, chat
/// orchestrator, approval manager) to enqueue a write without awaiting it.
#[derive(Clone)]
pub struct StorageWriter {
    sender: mpsc::Sender<WriteJob>,
}

impl StorageWriter {
    /// Best-effort enqueue: a full queue drops the write and logs a
    /// warning rather than applying backpressure to the caller.
    pub fn enqueue(&self, job: WriteJob) {
        if let Err(err) = self.sender.try_send(job) {
            warn!(error = %err, "storage writer queue full, dropping write");
        }
    }
}

/// Spawns the dedicated writer task draining a bounded queue into the
/// given adaptor, and returns a cheaply-cloneable handle to enqueue jobs.
pub fn spawn_writer(adaptor: Arc<dyn StorageAdaptor>) -> (StorageWriter, tokio::task::JoinHandle<()>) {
    spawn_writer_with_capacity(adaptor, DEFAULT_QUEUE_CAPACITY)
}

pub fn spawn_writer_with_capacity(
    adaptor: Arc<dyn StorageAdaptor>,
    capacity: usize,
) -> (StorageWriter, tokio::task::JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel(capacity);

    let handle = tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            let result = match job {
                WriteJob::UpsertServer(server) => adaptor.upsert_server(&server).await,
                WriteJob::InsertAlert { server_id, alert } => adaptor.insert_alert(&server_id, &alert).await,
                WriteJob::ResolveAlert(id) => adaptor.resolve_alert(&id).await,
                WriteJob::AcknowledgeAlert(id) => adaptor.acknowledge_alert(&id).await,
                WriteJob::InsertAgentResponse(response) => adaptor.insert_agent_response(&response).await,
                WriteJob::InsertAgentAction(action) => adaptor.insert_agent_action(&action).await,
                WriteJob::InsertMetricsSnapshot { server_id, sample } => {
                    adaptor.insert_metrics_snapshot(&server_id, &sample).await
                }
                WriteJob::UpsertIssue(issue) => adaptor.upsert_issue(&issue).await,
                WriteJob::InsertIssueComment(comment) => adaptor.insert_issue_comment(&comment).await,
                WriteJob::UpsertPluginInstance(instance) => adaptor.upsert_plugin_instance(&instance).await,
                WriteJob::RemovePluginInstance(id) => adaptor.remove_plugin_instance(&id).await,
                WriteJob::UpsertChatSession(session) => adaptor.upsert_chat_session(&session).await,
                WriteJob::InsertChatMessage(message) => adaptor.insert_chat_message(&message).await,
                WriteJob::UpsertApprovalRequest(request) => adaptor.upsert_approval_request(&request).await,
                WriteJob::InsertAuditLogEntry(entry) => adaptor.insert_audit_log_entry(&entry).await,
            };
            if let Err(err) = result {
                warn!(error = %err, "durable storage write failed");
            }
        }
    });

    (StorageWriter { sender }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAdaptor;
    use crate::types::ServerStatus;
    use chrono::Utc;

    #[tokio::test]
    async fn enqueued_server_upsert_reaches_the_adaptor() {
        let adaptor = Arc::new(MemoryAdaptor::new());
        let (writer, handle) = spawn_writer(adaptor.clone());

        writer.enqueue(WriteJob::UpsertServer(Server {
            id: "server-1".to_string(),
            hostname: "host-a".to_string(),
            ip: "10.0.0.1".to_string(),
            os: "linux".to_string(),
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
            status: ServerStatus::Active,
        }));

        drop(writer);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_write_without_blocking_producer() {
        let adaptor = Arc::new(MemoryAdaptor::new());
        let (writer, _handle) = spawn_writer_with_capacity(adaptor, 1);

        for _ in 0..10 {
            writer.enqueue(WriteJob::AcknowledgeAlert("whatever".to_string()));
        }
    }
}
