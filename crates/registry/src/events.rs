use crate::types::{HealthStatus, PluginInstance, ToolResult};

/// Emitted to the realtime event stream over the dashboard websocket.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    PluginRegistered { plugin_id: String },
    PluginUnregistered { plugin_id: String },
    InstanceCreated { instance: PluginInstance },
    InstanceRemoved { instance_id: String },
    InstanceEnabledChanged { instance_id: String, enabled: bool },
    HealthChanged { instance_id: String, status: HealthStatus, message: Option<String> },
    ToolExecuted { instance_id: String, tool_name: String, result: ToolResult },
}
