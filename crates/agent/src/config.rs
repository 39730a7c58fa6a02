use std::path::Path;

use serde::{Deserialize, Serialize};

fn default_collector_interval_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_collector_interval_ms")]
    pub interval_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { interval_ms: default_collector_interval_ms() }
    }
}

fn default_cooldown_ms() -> i64 {
    5 * 60 * 1000
}

fn default_max_history() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { cooldown_ms: default_cooldown_ms(), max_history: default_max_history() }
    }
}

/// One `{warning, critical}` pair, the shape every rules sub-section
/// reduces to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    pub cpu: Option<ThresholdPair>,
    pub memory: Option<ThresholdPair>,
    pub disk: Option<ThresholdPair>,
    pub network: Option<ThresholdPair>,
    pub processes: Option<ThresholdPair>,
    pub file_descriptors: Option<ThresholdPair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Opencode,
    Openrouter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Full,
    Limited,
    Readonly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: String,
    pub provider: LlmProvider,
    #[serde(default)]
    pub auto_remediate: bool,
    #[serde(default = "default_permission_level")]
    pub permission_level: PermissionLevel,
}

fn default_permission_level() -> PermissionLevel {
    PermissionLevel::Limited
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub enabled: bool,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub notify_on_critical: bool,
    #[serde(default)]
    pub notify_on_agent_action: bool,
}

fn default_dashboard_port() -> u16 {
    8787
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { enabled: true, port: default_dashboard_port() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorSeverity {
    Warning,
    Critical,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetdataConfig {
    pub url: String,
    #[serde(default = "default_netdata_poll_interval_s")]
    pub poll_interval_s: u64,
    #[serde(default = "default_monitor_severity")]
    pub monitor_severity: MonitorSeverity,
    #[serde(default)]
    pub severity_mapping: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub ignore_alerts: Vec<String>,
    #[serde(default)]
    pub force_alerts: Vec<String>,
}

fn default_netdata_poll_interval_s() -> u64 {
    30
}

fn default_monitor_severity() -> MonitorSeverity {
    MonitorSeverity::Warning
}

/// Top-level config sections, all optional
/// except where a section's own required fields (e.g. `agent.model`) make
/// the section meaningless without them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WardenConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    pub agent: Option<AgentConfig>,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    pub netdata: Option<NetdataConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Substitute `${VAR}` placeholders with environment variable values before
/// YAML parsing. A placeholder with no matching environment
/// variable is left untouched rather than failing the load.
pub fn substitute_env_placeholders(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = raw[i + 2..].find('}') {
                let var_name = &raw[i + 2..i + 2 + end];
                match std::env::var(var_name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => out.push_str(&raw[i..i + 2 + end + 1]),
                }
                i += 2 + end + 1;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

pub fn load_config(path: &Path) -> Result<WardenConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    let substituted = substitute_env_placeholders(&raw);
    let config: WardenConfig = serde_yaml::from_str(&substituted)?;
    Ok(config)
}

/// Search path for locating the config file at startup.
pub fn discover_config_path() -> Option<std::path::PathBuf> {
    const CANDIDATES: &[&str] = &["warden.yaml", "warden.yml", "/etc/warden/warden.yaml"];
    CANDIDATES.iter().map(std::path::PathBuf::from).find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_env_var() {
        std::env::set_var("WARDEN_TEST_TOKEN", "secret-value");
        let result = substitute_env_placeholders("token: ${WARDEN_TEST_TOKEN}");
        assert_eq!(result, "token: secret-value");
        std::env::remove_var("WARDEN_TEST_TOKEN");
    }

    #[test]
    fn leaves_unknown_placeholder_untouched() {
        let result = substitute_env_placeholders("token: ${WARDEN_DEFINITELY_UNSET}");
        assert_eq!(result, "token: ${WARDEN_DEFINITELY_UNSET}");
    }

    #[test]
    fn parses_minimal_yaml_with_defaults() {
        let yaml = "collector:\n  interval_ms: 10000\n";
        let config: WardenConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.collector.interval_ms, 10_000);
        assert_eq!(config.alerts.cooldown_ms, default_cooldown_ms());
    }
}
