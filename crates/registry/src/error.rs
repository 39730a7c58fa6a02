use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin config: {0}")]
    InvalidConfig(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool parameters: {0}")]
    InvalidParams(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("health check failed: {0}")]
    HealthCheckFailed(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("plugin type not found: {0}")]
    PluginNotFound(String),

    #[error("plugin type {0} is still in use by {1} instance(s)")]
    PluginInUse(String, usize),

    #[error("plugin type already registered: {0}")]
    PluginAlreadyRegistered(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("instance {0} is disabled")]
    InstanceDisabled(String),

    #[error("instance {0} is in an error state: {1}")]
    InstanceErrored(String, String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Vault(#[from] warden_vault::VaultError),
}
