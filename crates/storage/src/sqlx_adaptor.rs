use sqlx::{Pool, Postgres, Sqlite};

use warden_alerts::Alert;
use warden_approval::{ApprovalRequest, AuditLogEntry};
use warden_collector::MetricSample;
use warden_issues::{Issue, IssueComment};
use warden_orchestrator::{ChatMessage, ChatSession};
use warden_registry::{Plugin, PluginInstance};

use async_trait::async_trait;

use crate::adaptor::StorageAdaptor;
use crate::error::StorageError;
use crate::types::{AgentAction, AgentResponse, Server};

/// Either backend sqlx is configured for in the workspace dependency
/// (`postgres`, `sqlite` features), mirrored on the enum-over-pool pattern
/// used by the pack's own SQL tool connection manager. SQLite accepts the
/// same `$N` placeholder syntax as Postgres, so every statement below is
/// written once and bound identically against whichever pool is live.
enum DatabasePool {
    Postgres(Pool<Postgres>),
    Sqlite(Pool<Sqlite>),
}

/// Reference `StorageAdaptor`: every write is a single parameterized
/// upsert/insert statement against a loosely-typed schema. Complex fields
/// (parameters, metadata, tool calls) are stored as serialized JSON text
/// columns.
pub struct SqlxAdaptor {
    pool: DatabasePool,
}

impl SqlxAdaptor {
    pub async fn connect_postgres(database_url: &str) -> Result<Self, StorageError> {
        let pool = Pool::<Postgres>::connect(database_url).await?;
        Ok(Self { pool: DatabasePool::Postgres(pool) })
    }

    pub async fn connect_sqlite(database_url: &str) -> Result<Self, StorageError> {
        let pool = Pool::<Sqlite>::connect(database_url).await?;
        Ok(Self { pool: DatabasePool::Sqlite(pool) })
    }
}

fn json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Runs one parameterized statement against whichever pool is live.
/// `$sql` must use `$1`, `$2`, ... placeholders (both backends accept
/// this syntax); binds are applied in the given order.
macro_rules! exec {
    ($self:expr, $sql:expr $(, $bind:expr)* $(,)?) => {{
        match &$self.pool {
            DatabasePool::Postgres(pool) => {
                sqlx::query($sql) $(.bind($bind))* .execute(pool).await?;
            }
            DatabasePool::Sqlite(pool) => {
                sqlx::query($sql) $(.bind($bind))* .execute(pool).await?;
            }
        }
        Ok(())
    }};
}

#[async_trait]
impl StorageAdaptor for SqlxAdaptor {
    async fn upsert_server(&self, server: &Server) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO servers (id, data) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
            server.id.as_str(),
            json(server)
        )
    }

    async fn insert_alert(&self, server_id: &str, alert: &Alert) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO alerts (id, server_id, data) VALUES ($1, $2, $3)",
            alert.id.as_str(),
            server_id,
            json(alert)
        )
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<(), StorageError> {
        exec!(self, "UPDATE alerts SET resolved_at = now() WHERE id = $1", alert_id)
    }

    async fn acknowledge_alert(&self, alert_id: &str) -> Result<(), StorageError> {
        exec!(self, "UPDATE alerts SET acknowledged = true WHERE id = $1", alert_id)
    }

    async fn insert_agent_response(&self, response: &AgentResponse) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO agent_responses (id, issue_id, data) VALUES ($1, $2, $3)",
            response.id.as_str(),
            response.issue_id.as_str(),
            json(response)
        )
    }

    async fn insert_agent_action(&self, action: &AgentAction) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO agent_actions (id, response_id, data) VALUES ($1, $2, $3)",
            action.id.as_str(),
            action.response_id.as_str(),
            json(action)
        )
    }

    async fn insert_metrics_snapshot(&self, server_id: &str, sample: &MetricSample) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO metrics_snapshots (server_id, data) VALUES ($1, $2)",
            server_id,
            json(sample)
        )
    }

    async fn upsert_issue(&self, issue: &Issue) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO issues (id, server_id, fingerprint, data) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
            issue.id.as_str(),
            issue.server_id.as_str(),
            issue.fingerprint.as_str(),
            json(issue)
        )
    }

    async fn insert_issue_comment(&self, comment: &IssueComment) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO issue_comments (id, issue_id, data) VALUES ($1, $2, $3)",
            comment.id.as_str(),
            comment.issue_id.as_str(),
            json(comment)
        )
    }

    async fn upsert_plugin(&self, plugin: &Plugin) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO plugins (id, data) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
            plugin.id.as_str(),
            json(plugin)
        )
    }

    async fn upsert_plugin_instance(&self, instance: &PluginInstance) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO agent_plugins (id, server_id, plugin_id, data) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
            instance.id.as_str(),
            instance.server_id.as_str(),
            instance.plugin_id.as_str(),
            json(instance)
        )
    }

    async fn remove_plugin_instance(&self, instance_id: &str) -> Result<(), StorageError> {
        exec!(self, "DELETE FROM agent_plugins WHERE id = $1", instance_id)
    }

    async fn upsert_chat_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO chat_sessions (id, server_id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
            session.id.as_str(),
            session.server_id.as_str(),
            json(session)
        )
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO chat_messages (id, session_id, data) VALUES ($1, $2, $3)",
            message.id.as_str(),
            message.session_id.as_str(),
            json(message)
        )
    }

    async fn upsert_approval_request(&self, request: &ApprovalRequest) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO approval_requests (id, server_id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
            request.id.as_str(),
            request.server_id.as_str(),
            json(request)
        )
    }

    async fn insert_audit_log_entry(&self, entry: &AuditLogEntry) -> Result<(), StorageError> {
        exec!(
            self,
            "INSERT INTO plugin_audit_log (id, server_id, data) VALUES ($1, $2, $3)",
            entry.id.as_str(),
            entry.server_id.as_str(),
            json(entry)
        )
    }
}
