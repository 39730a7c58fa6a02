use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use warden_vault::Vault;

use crate::error::{PluginError, RegistryError};
use crate::events::RegistryEvent;
use crate::plugin_trait::PluginBackend;
use crate::types::{HealthStatus, InstanceStatus, Plugin, PluginInstance, PluginTool, RiskLevel, ToolContext, ToolResult};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_HEALTH_INTERVAL_MS: u64 = 60_000;

/// Catalogue of plugin types available to be instantiated, mirroring
/// `gate::connectors::registry::ConnectorRegistry`'s
/// `RwLock<HashMap<Id, Registered>>` shape.
pub struct PluginTypeRegistry {
    backends: RwLock<HashMap<String, Arc<dyn PluginBackend>>>,
}

impl PluginTypeRegistry {
    pub fn new() -> Self {
        Self { backends: RwLock::new(HashMap::new()) }
    }

    pub fn register(&self, backend: Arc<dyn PluginBackend>) -> Result<(), RegistryError> {
        let descriptor = backend.descriptor();
        let mut backends = self.backends.write();
        if backends.contains_key(&descriptor.id) {
            return Err(RegistryError::PluginAlreadyRegistered(descriptor.id));
        }
        info!(plugin_id = %descriptor.id, "registered plugin type");
        backends.insert(descriptor.id, backend);
        Ok(())
    }

    /// Unregister a plugin type. Fails if any live instance still
    /// references it — a type can't be pulled out from under a running
    /// connection.
    pub fn unregister(&self, plugin_id: &str, active_instances: usize) -> Result<(), RegistryError> {
        if active_instances > 0 {
            return Err(RegistryError::PluginInUse(plugin_id.to_string(), active_instances));
        }
        let mut backends = self.backends.write();
        if backends.remove(plugin_id).is_none() {
            return Err(RegistryError::PluginNotFound(plugin_id.to_string()));
        }
        Ok(())
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn PluginBackend>> {
        self.backends.read().get(plugin_id).cloned()
    }

    pub fn list(&self) -> Vec<Plugin> {
        self.backends.read().values().map(|b| b.descriptor()).collect()
    }
}

impl Default for PluginTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct LiveInstance {
    instance: PluginInstance,
    supervisor: JoinHandle<()>,
}

/// Per-server instance lifecycle and health supervision.
/// Holds decrypted-at-rest configs only as long as a call needs them;
/// `PluginInstance.config` as stored is always vault-encrypted.
pub struct InstanceRegistry {
    plugin_types: Arc<PluginTypeRegistry>,
    vault: Arc<Vault>,
    instances: RwLock<HashMap<String, LiveInstance>>,
    events: broadcast::Sender<RegistryEvent>,
    health_interval: Duration,
}

impl InstanceRegistry {
    pub fn new(plugin_types: Arc<PluginTypeRegistry>, vault: Arc<Vault>) -> Self {
        Self::with_health_interval(plugin_types, vault, Duration::from_millis(DEFAULT_HEALTH_INTERVAL_MS))
    }

    pub fn with_health_interval(
        plugin_types: Arc<PluginTypeRegistry>,
        vault: Arc<Vault>,
        health_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { plugin_types, vault, instances: RwLock::new(HashMap::new()), events, health_interval }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.events.send(event);
    }

    pub async fn create_instance(
        &self,
        server_id: impl Into<String>,
        plugin_id: &str,
        config: HashMap<String, Value>,
    ) -> Result<PluginInstance, RegistryError> {
        let server_id = server_id.into();
        let backend = self
            .plugin_types
            .get(plugin_id)
            .ok_or_else(|| RegistryError::PluginNotFound(plugin_id.to_string()))?;

        backend.validate_config(&config)?;
        backend.initialize(&config).await?;

        let encrypted_config = self.vault.encrypt_config(&config)?;
        let instance = PluginInstance {
            id: Uuid::new_v4().to_string(),
            server_id,
            plugin_id: plugin_id.to_string(),
            config: encrypted_config,
            status: InstanceStatus::Active,
            health_status: HealthStatus::Unknown,
            health_message: None,
            enabled: true,
            last_health_check: None,
            created_at: Utc::now(),
        };

        let supervisor = self.spawn_supervisor(instance.id.clone(), backend);

        self.instances.write().insert(
            instance.id.clone(),
            LiveInstance { instance: instance.clone(), supervisor },
        );
        self.emit(RegistryEvent::InstanceCreated { instance: instance.clone() });
        Ok(instance)
    }

    fn spawn_supervisor(&self, instance_id: String, backend: Arc<dyn PluginBackend>) -> JoinHandle<()> {
        let events = self.events.clone();
        let interval = self.health_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let (status, message) = match backend.check_health().await {
                    Ok(status) => (status, None),
                    Err(err) => (HealthStatus::Unhealthy, Some(err.to_string())),
                };
                let _ = events.send(RegistryEvent::HealthChanged {
                    instance_id: instance_id.clone(),
                    status,
                    message,
                });
            }
        })
    }

    pub fn set_instance_enabled(&self, instance_id: &str, enabled: bool) -> Result<(), RegistryError> {
        let mut instances = self.instances.write();
        let live = instances
            .get_mut(instance_id)
            .ok_or_else(|| RegistryError::InstanceNotFound(instance_id.to_string()))?;
        live.instance.enabled = enabled;
        live.instance.status = if enabled { InstanceStatus::Active } else { InstanceStatus::Inactive };
        self.emit(RegistryEvent::InstanceEnabledChanged { instance_id: instance_id.to_string(), enabled });
        Ok(())
    }

    pub async fn remove_instance(&self, instance_id: &str) -> Result<(), RegistryError> {
        let (live, backend) = {
            let mut instances = self.instances.write();
            let live = instances
                .remove(instance_id)
                .ok_or_else(|| RegistryError::InstanceNotFound(instance_id.to_string()))?;
            let backend = self.plugin_types.get(&live.instance.plugin_id);
            (live, backend)
        };
        live.supervisor.abort();
        if let Some(backend) = backend {
            if let Err(err) = backend.shutdown().await {
                warn!(instance_id, %err, "plugin shutdown returned an error during instance removal");
            }
        }
        self.emit(RegistryEvent::InstanceRemoved { instance_id: instance_id.to_string() });
        Ok(())
    }

    /// Five-step `executeTool` contract:
    /// 1. reject if the instance is missing/disabled/errored,
    /// 2. validate parameters against the tool's schema,
    /// 3. determine whether the tool requires human approval,
    /// 4. if so, return the approval sentinel without running anything,
    /// 5. otherwise dispatch to the backend and emit the result.
    pub async fn execute_tool(
        &self,
        instance_id: &str,
        tool_name: &str,
        params: HashMap<String, Value>,
        context: ToolContext,
    ) -> Result<ToolResult, RegistryError> {
        let (backend, tool) = {
            let instances = self.instances.read();
            let live = instances
                .get(instance_id)
                .ok_or_else(|| RegistryError::InstanceNotFound(instance_id.to_string()))?;
            if !live.instance.enabled {
                return Err(RegistryError::InstanceDisabled(instance_id.to_string()));
            }
            if live.instance.status == InstanceStatus::Error {
                let message = live.instance.health_message.clone().unwrap_or_default();
                return Err(RegistryError::InstanceErrored(instance_id.to_string(), message));
            }
            let backend = self
                .plugin_types
                .get(&live.instance.plugin_id)
                .ok_or_else(|| RegistryError::PluginNotFound(live.instance.plugin_id.clone()))?;
            let tool = backend
                .get_tools()
                .into_iter()
                .find(|t| t.name == tool_name)
                .ok_or_else(|| PluginError::UnknownTool(tool_name.to_string()))?;
            (backend, tool)
        };

        backend.validate_tool_params(tool_name, &params)?;

        let low_risk_no_approval = tool.risk_level == RiskLevel::Low && !tool.requires_approval;
        if context.approval_id.is_none() && !low_risk_no_approval {
            let result = ToolResult::needs_approval(crate::types::PendingApproval {
                operation: tool_name.to_string(),
                parameters: params,
                reason: format!("tool '{tool_name}' is classified {:?} risk and requires approval", tool.risk_level),
                risk_level: tool.risk_level,
            });
            return Ok(result);
        }

        let result = backend.execute_tool(tool_name, &params, &context).await?;
        self.emit(RegistryEvent::ToolExecuted {
            instance_id: instance_id.to_string(),
            tool_name: tool_name.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }

    pub fn get_instance_health(&self, instance_id: &str) -> Option<(HealthStatus, Option<String>)> {
        self.instances
            .read()
            .get(instance_id)
            .map(|live| (live.instance.health_status, live.instance.health_message.clone()))
    }

    pub fn get_instance_tools(&self, instance_id: &str) -> Option<Vec<PluginTool>> {
        let instances = self.instances.read();
        let live = instances.get(instance_id)?;
        self.plugin_types.get(&live.instance.plugin_id).map(|b| b.get_tools())
    }

    pub fn get_server_instances(&self, server_id: &str) -> Vec<PluginInstance> {
        self.instances
            .read()
            .values()
            .filter(|live| live.instance.server_id == server_id)
            .map(|live| live.instance.clone())
            .collect()
    }

    pub fn get_plugin_instances(&self, plugin_id: &str) -> Vec<PluginInstance> {
        self.instances
            .read()
            .values()
            .filter(|live| live.instance.plugin_id == plugin_id)
            .map(|live| live.instance.clone())
            .collect()
    }

    pub fn get(&self, instance_id: &str) -> Option<PluginInstance> {
        self.instances.read().get(instance_id).map(|live| live.instance.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::filesystem::FilesystemStatsPlugin;
    use warden_vault::VaultKey;

    fn registry() -> (Arc<PluginTypeRegistry>, InstanceRegistry) {
        let types = Arc::new(PluginTypeRegistry::new());
        types.register(Arc::new(FilesystemStatsPlugin::new())).unwrap();
        let vault = Arc::new(Vault::new(VaultKey::from_hex(&"11".repeat(32)).unwrap()));
        let instances = InstanceRegistry::with_health_interval(types.clone(), vault, Duration::from_secs(3600));
        (types, instances)
    }

    #[tokio::test]
    async fn create_instance_succeeds_for_registered_plugin() {
        let (_types, instances) = registry();
        let instance = instances
            .create_instance("server-1", "filesystem-stats", HashMap::new())
            .await
            .unwrap();
        assert_eq!(instance.status, InstanceStatus::Active);
        assert!(instances.get(&instance.id).is_some());
    }

    #[tokio::test]
    async fn create_instance_rejects_unknown_plugin() {
        let (_types, instances) = registry();
        let err = instances.create_instance("server-1", "nope", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, RegistryError::PluginNotFound(_)));
    }

    #[tokio::test]
    async fn disabling_instance_blocks_tool_execution() {
        let (_types, instances) = registry();
        let instance = instances
            .create_instance("server-1", "filesystem-stats", HashMap::new())
            .await
            .unwrap();
        instances.set_instance_enabled(&instance.id, false).unwrap();

        let err = instances
            .execute_tool(&instance.id, "disk_usage", HashMap::new(), ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InstanceDisabled(_)));
    }

    #[tokio::test]
    async fn read_only_tool_executes_without_approval() {
        let (_types, instances) = registry();
        let instance = instances
            .create_instance("server-1", "filesystem-stats", HashMap::new())
            .await
            .unwrap();

        let result = instances
            .execute_tool(&instance.id, "disk_usage", HashMap::new(), ToolContext::default())
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.requires_approval);
    }

    #[tokio::test]
    async fn admin_tool_requires_approval_without_approval_id() {
        let (_types, instances) = registry();
        let instance = instances
            .create_instance("server-1", "filesystem-stats", HashMap::new())
            .await
            .unwrap();

        let mut params = HashMap::new();
        params.insert("path".to_string(), Value::String("/tmp/orphan".to_string()));
        let result = instances
            .execute_tool(&instance.id, "delete_path", params, ToolContext::default())
            .await
            .unwrap();
        assert!(result.requires_approval);
        assert!(result.approval_request.is_some());
    }

    #[tokio::test]
    async fn admin_tool_executes_once_approval_id_is_present() {
        let (_types, instances) = registry();
        let instance = instances
            .create_instance("server-1", "filesystem-stats", HashMap::new())
            .await
            .unwrap();

        let mut params = HashMap::new();
        params.insert("path".to_string(), Value::String("/tmp/orphan".to_string()));
        let context = ToolContext { approval_id: Some("approval-1".to_string()), ..Default::default() };
        let result = instances.execute_tool(&instance.id, "delete_path", params, context).await.unwrap();
        assert!(result.success);
        assert!(!result.requires_approval);
    }

    #[tokio::test]
    async fn unregister_plugin_in_use_fails() {
        let (types, instances) = registry();
        let instance = instances
            .create_instance("server-1", "filesystem-stats", HashMap::new())
            .await
            .unwrap();
        let active = instances.get_plugin_instances("filesystem-stats").len();
        assert_eq!(active, 1);
        let err = types.unregister("filesystem-stats", active).unwrap_err();
        assert!(matches!(err, RegistryError::PluginInUse(_, 1)));

        instances.remove_instance(&instance.id).await.unwrap();
        types.unregister("filesystem-stats", 0).unwrap();
    }
}
