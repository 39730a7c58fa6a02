use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::PluginError;
use crate::types::{HealthStatus, Plugin, PluginTool, ToolContext, ToolResult};

/// The target-language Plugin contract: a set of capability
/// methods, implemented concretely rather than duck-typed.
#[async_trait]
pub trait PluginBackend: Send + Sync {
    /// Static type metadata (id/name/tools/risk levels).
    fn descriptor(&self) -> Plugin;

    /// Validate a raw instance config before construction.
    fn validate_config(&self, config: &HashMap<String, Value>) -> Result<(), PluginError>;

    /// Construct a live connection from a validated config.
    async fn initialize(&self, config: &HashMap<String, Value>) -> Result<(), PluginError>;

    async fn shutdown(&self) -> Result<(), PluginError>;

    async fn check_health(&self) -> Result<HealthStatus, PluginError>;

    fn get_capabilities(&self) -> Vec<String> {
        self.descriptor().capabilities
    }

    fn get_tools(&self) -> Vec<PluginTool> {
        self.descriptor().tools
    }

    /// Validate tool parameters before dispatch. Never calls the backend.
    fn validate_tool_params(
        &self,
        tool_name: &str,
        params: &HashMap<String, Value>,
    ) -> Result<(), PluginError>;

    async fn execute_tool(
        &self,
        tool_name: &str,
        params: &HashMap<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, PluginError>;
}
