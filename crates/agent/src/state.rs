use std::sync::Arc;

use tokio::sync::broadcast;

use warden_alerts::AlertManager;
use warden_approval::{ApprovalManager, AuditLog};
use warden_issues::IssueManager;
use warden_orchestrator::ChatOrchestrator;
use warden_registry::{InstanceRegistry, PluginTypeRegistry};
use warden_storage::StorageWriter;
use warden_vault::Vault;

use crate::hub::DashboardEvent;

/// Shared, owned-by-one-component state wired at bootstrap and handed to
/// every axum handler.
pub struct AppState {
    pub server_id: String,
    pub alerts: Arc<AlertManager>,
    pub issues: Arc<IssueManager>,
    pub plugin_types: Arc<PluginTypeRegistry>,
    pub instances: Arc<InstanceRegistry>,
    pub approvals: Arc<ApprovalManager>,
    pub audit: Arc<AuditLog>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub storage: StorageWriter,
    pub vault: Arc<Vault>,
    pub hub: broadcast::Sender<DashboardEvent>,
    pub last_sample: parking_lot::RwLock<Option<serde_json::Value>>,
}

pub type SharedState = Arc<AppState>;
