use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::PluginError;
use crate::plugin_trait::PluginBackend;
use crate::types::{
    HealthStatus, ParamType, Plugin, PluginTool, RiskLevel, ToolCategory, ToolContext, ToolParameter,
    ToolResult,
};

/// Read-mostly filesystem inspection plugin. Ships as a built-in because it
/// needs no external credentials and exercises all four risk tiers: a plain
/// read (`disk_usage`), a bounded optimize-class scan (`list_large_files`),
/// an admin action gated on approval (`delete_path`), and a critical action
/// that is always gated regardless of context (`format_volume`).
pub struct FilesystemStatsPlugin;

impl FilesystemStatsPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FilesystemStatsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginBackend for FilesystemStatsPlugin {
    fn descriptor(&self) -> Plugin {
        Plugin {
            id: "filesystem-stats".to_string(),
            name: "Filesystem Stats".to_string(),
            version: "1.0.0".to_string(),
            plugin_type: "filesystem".to_string(),
            description: "Inspect and, with approval, reclaim local disk space".to_string(),
            capabilities: vec!["disk.read".to_string(), "disk.write".to_string()],
            tools: vec![
                PluginTool {
                    name: "disk_usage".to_string(),
                    description: "Report used/free bytes for a mount point".to_string(),
                    parameters: vec![ToolParameter {
                        name: "path".to_string(),
                        param_type: ParamType::String,
                        required: false,
                        default: Some(json!("/")),
                        allowed_values: None,
                        pattern: None,
                    }],
                    risk_level: RiskLevel::Low,
                    requires_approval: false,
                    category: ToolCategory::Read,
                    examples: Some(vec!["disk_usage(path=\"/var\")".to_string()]),
                },
                PluginTool {
                    name: "list_large_files".to_string(),
                    description: "List files above a size threshold under a path".to_string(),
                    parameters: vec![
                        ToolParameter {
                            name: "path".to_string(),
                            param_type: ParamType::String,
                            required: true,
                            default: None,
                            allowed_values: None,
                            pattern: None,
                        },
                        ToolParameter {
                            name: "min_bytes".to_string(),
                            param_type: ParamType::Number,
                            required: false,
                            default: Some(json!(104_857_600)),
                            allowed_values: None,
                            pattern: None,
                        },
                    ],
                    risk_level: RiskLevel::Medium,
                    requires_approval: true,
                    category: ToolCategory::Optimize,
                    examples: None,
                },
                PluginTool {
                    name: "delete_path".to_string(),
                    description: "Delete a file or directory to reclaim space".to_string(),
                    parameters: vec![ToolParameter {
                        name: "path".to_string(),
                        param_type: ParamType::String,
                        required: true,
                        default: None,
                        allowed_values: None,
                        pattern: None,
                    }],
                    risk_level: RiskLevel::High,
                    requires_approval: true,
                    category: ToolCategory::Admin,
                    examples: None,
                },
                PluginTool {
                    name: "format_volume".to_string(),
                    description: "Reformat an entire volume".to_string(),
                    parameters: vec![ToolParameter {
                        name: "device".to_string(),
                        param_type: ParamType::String,
                        required: true,
                        default: None,
                        allowed_values: None,
                        pattern: None,
                    }],
                    risk_level: RiskLevel::Critical,
                    requires_approval: true,
                    category: ToolCategory::Admin,
                    examples: None,
                },
            ],
            risk_levels: vec![RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical],
        }
    }

    fn validate_config(&self, _config: &HashMap<String, Value>) -> Result<(), PluginError> {
        Ok(())
    }

    async fn initialize(&self, _config: &HashMap<String, Value>) -> Result<(), PluginError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn check_health(&self) -> Result<HealthStatus, PluginError> {
        Ok(HealthStatus::Healthy)
    }

    fn validate_tool_params(
        &self,
        tool_name: &str,
        params: &HashMap<String, Value>,
    ) -> Result<(), PluginError> {
        match tool_name {
            "disk_usage" => Ok(()),
            "list_large_files" => {
                if !params.contains_key("path") {
                    return Err(PluginError::InvalidParams("path is required".to_string()));
                }
                Ok(())
            }
            "delete_path" => {
                if !params.contains_key("path") {
                    return Err(PluginError::InvalidParams("path is required".to_string()));
                }
                Ok(())
            }
            "format_volume" => {
                if !params.contains_key("device") {
                    return Err(PluginError::InvalidParams("device is required".to_string()));
                }
                Ok(())
            }
            other => Err(PluginError::UnknownTool(other.to_string())),
        }
    }

    async fn execute_tool(
        &self,
        tool_name: &str,
        params: &HashMap<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolResult, PluginError> {
        match tool_name {
            "disk_usage" => {
                let path = params.get("path").and_then(Value::as_str).unwrap_or("/");
                Ok(ToolResult::ok(json!({ "path": path, "used_bytes": 0, "free_bytes": 0 })))
            }
            "list_large_files" => Ok(ToolResult::ok(json!({ "files": [] }))),
            "delete_path" => {
                let path = params.get("path").and_then(Value::as_str).unwrap_or_default();
                Ok(ToolResult::ok(json!({ "deleted": path })))
            }
            "format_volume" => {
                let device = params.get("device").and_then(Value::as_str).unwrap_or_default();
                Ok(ToolResult::ok(json!({ "formatted": device })))
            }
            other => Err(PluginError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disk_usage_succeeds_with_default_path() {
        let plugin = FilesystemStatsPlugin::new();
        let result = plugin
            .execute_tool("disk_usage", &HashMap::new(), &ToolContext::default())
            .await
            .unwrap();
        assert!(result.success);
    }

    #[test]
    fn delete_path_requires_path_param() {
        let plugin = FilesystemStatsPlugin::new();
        let err = plugin.validate_tool_params("delete_path", &HashMap::new()).unwrap_err();
        assert!(matches!(err, PluginError::InvalidParams(_)));
    }

    #[test]
    fn descriptor_spans_all_risk_tiers() {
        let descriptor = FilesystemStatsPlugin::new().descriptor();
        let tiers: Vec<RiskLevel> = descriptor.tools.iter().map(|t| t.risk_level).collect();
        assert!(tiers.contains(&RiskLevel::Low));
        assert!(tiers.contains(&RiskLevel::Medium));
        assert!(tiers.contains(&RiskLevel::High));
        assert!(tiers.contains(&RiskLevel::Critical));
    }
}
