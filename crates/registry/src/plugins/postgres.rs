use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::error::PluginError;
use crate::plugin_trait::PluginBackend;
use crate::types::{
    HealthStatus, ParamType, Plugin, PluginTool, RiskLevel, ToolCategory, ToolContext, ToolParameter,
    ToolResult,
};
use warden_vault::parse_connection_string;

/// Postgres-ish database plugin: parses a `postgres://` connection string
/// out of the instance config and tracks a simple connected/disconnected
/// flag in place of a real connection pool.
pub struct PostgresPlugin {
    connected: RwLock<bool>,
}

impl PostgresPlugin {
    pub fn new() -> Self {
        Self { connected: RwLock::new(false) }
    }
}

impl Default for PostgresPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn connection_string(config: &HashMap<String, Value>) -> Result<String, PluginError> {
    config
        .get("connectionString")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PluginError::InvalidConfig("connectionString is required".to_string()))
}

#[async_trait]
impl PluginBackend for PostgresPlugin {
    fn descriptor(&self) -> Plugin {
        Plugin {
            id: "postgres".to_string(),
            name: "PostgreSQL".to_string(),
            version: "1.0.0".to_string(),
            plugin_type: "database".to_string(),
            description: "Query and administer a Postgres database".to_string(),
            capabilities: vec!["db.read".to_string(), "db.write".to_string(), "db.admin".to_string()],
            tools: vec![
                PluginTool {
                    name: "query".to_string(),
                    description: "Run a read-only SQL query".to_string(),
                    parameters: vec![ToolParameter {
                        name: "sql".to_string(),
                        param_type: ParamType::String,
                        required: true,
                        default: None,
                        allowed_values: None,
                        pattern: None,
                    }],
                    risk_level: RiskLevel::Low,
                    requires_approval: false,
                    category: ToolCategory::Read,
                    examples: Some(vec!["query(sql=\"select 1\")".to_string()]),
                },
                PluginTool {
                    name: "vacuum".to_string(),
                    description: "Run VACUUM ANALYZE on a table".to_string(),
                    parameters: vec![ToolParameter {
                        name: "table".to_string(),
                        param_type: ParamType::String,
                        required: true,
                        default: None,
                        allowed_values: None,
                        pattern: None,
                    }],
                    risk_level: RiskLevel::Medium,
                    requires_approval: true,
                    category: ToolCategory::Optimize,
                    examples: None,
                },
                PluginTool {
                    name: "kill_connection".to_string(),
                    description: "Terminate a backend process by pid".to_string(),
                    parameters: vec![ToolParameter {
                        name: "pid".to_string(),
                        param_type: ParamType::Number,
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
                    name: "drop_table".to_string(),
                    description: "Drop a table".to_string(),
                    parameters: vec![ToolParameter {
                        name: "table".to_string(),
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

    fn validate_config(&self, config: &HashMap<String, Value>) -> Result<(), PluginError> {
        let raw = connection_string(config)?;
        parse_connection_string(&raw).map_err(|e| PluginError::InvalidConfig(e.to_string()))?;
        Ok(())
    }

    async fn initialize(&self, config: &HashMap<String, Value>) -> Result<(), PluginError> {
        let raw = connection_string(config)?;
        parse_connection_string(&raw).map_err(|e| PluginError::ConnectionFailed(e.to_string()))?;
        *self.connected.write() = true;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        *self.connected.write() = false;
        Ok(())
    }

    async fn check_health(&self) -> Result<HealthStatus, PluginError> {
        if *self.connected.read() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    fn validate_tool_params(
        &self,
        tool_name: &str,
        params: &HashMap<String, Value>,
    ) -> Result<(), PluginError> {
        let required = match tool_name {
            "query" => "sql",
            "vacuum" => "table",
            "kill_connection" => "pid",
            "drop_table" => "table",
            other => return Err(PluginError::UnknownTool(other.to_string())),
        };
        if !params.contains_key(required) {
            return Err(PluginError::InvalidParams(format!("{required} is required")));
        }
        Ok(())
    }

    async fn execute_tool(
        &self,
        tool_name: &str,
        params: &HashMap<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolResult, PluginError> {
        if !*self.connected.read() {
            return Err(PluginError::ExecutionFailed("not connected".to_string()));
        }
        match tool_name {
            "query" => {
                let sql = params.get("sql").and_then(Value::as_str).unwrap_or_default();
                Ok(ToolResult::ok(json!({ "sql": sql, "rows": [] })))
            }
            "vacuum" => {
                let table = params.get("table").and_then(Value::as_str).unwrap_or_default();
                Ok(ToolResult::ok(json!({ "vacuumed": table })))
            }
            "kill_connection" => {
                let pid = params.get("pid").cloned().unwrap_or(json!(0));
                Ok(ToolResult::ok(json!({ "killed_pid": pid })))
            }
            "drop_table" => {
                let table = params.get("table").and_then(Value::as_str).unwrap_or_default();
                Ok(ToolResult::ok(json!({ "dropped": table })))
            }
            other => Err(PluginError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(conn: &str) -> HashMap<String, Value> {
        let mut config = HashMap::new();
        config.insert("connectionString".to_string(), json!(conn));
        config
    }

    #[test]
    fn validate_config_rejects_missing_connection_string() {
        let plugin = PostgresPlugin::new();
        let err = plugin.validate_config(&HashMap::new()).unwrap_err();
        assert!(matches!(err, PluginError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn initialize_then_query_succeeds() {
        let plugin = PostgresPlugin::new();
        let config = config_with("postgres://user:pw@localhost:5432/warden");
        plugin.initialize(&config).await.unwrap();

        let mut params = HashMap::new();
        params.insert("sql".to_string(), json!("select 1"));
        let result = plugin.execute_tool("query", &params, &ToolContext::default()).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn query_before_initialize_fails() {
        let plugin = PostgresPlugin::new();
        let mut params = HashMap::new();
        params.insert("sql".to_string(), json!("select 1"));
        let err = plugin.execute_tool("query", &params, &ToolContext::default()).await.unwrap_err();
        assert!(matches!(err, PluginError::ExecutionFailed(_)));
    }
}
