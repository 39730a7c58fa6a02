//! Plugin type catalogue and per-server instance lifecycle/supervision
//!: registering plugin backends, creating vault-encrypted
//! instances, running health supervisors, and dispatching `executeTool`
//! through the approval-aware five-step contract.

mod error;
mod events;
mod plugin_trait;
pub mod plugins;
mod registry;
mod types;

pub use error::{PluginError, RegistryError};
pub use events::RegistryEvent;
pub use plugin_trait::PluginBackend;
pub use registry::{InstanceRegistry, PluginTypeRegistry};
pub use types::{
    HealthStatus, InstanceStatus, ParamType, PendingApproval, Plugin, PluginInstance, PluginTool,
    RiskLevel, ToolCategory, ToolContext, ToolParameter, ToolResult,
};
