//! `wardend`: per-host autonomous operations agent.
//!
//! Bootstraps config, the vault, durable storage, the metric/rule/alert
//! pipeline, the plugin registry, the approval-gated chat orchestrator,
//! and the REST/websocket surface, then runs until SIGINT/SIGTERM.

mod config;
mod dashboard;
mod error;
mod hub;
mod notifier;
mod pipeline;
mod rule_config;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden_alerts::{AlertManager, AlertManagerConfig};
use warden_approval::ApprovalManager;
use warden_issues::IssueManager;
use warden_orchestrator::{ChatOrchestrator, FakeLlmClient, LlmClient, OpenAiClient};
use warden_registry::plugins::{filesystem::FilesystemStatsPlugin, postgres::PostgresPlugin};
use warden_registry::{InstanceRegistry, PluginTypeRegistry};
use warden_storage::{MemoryAdaptor, SqlxAdaptor, StorageAdaptor};
use warden_vault::{Vault, VaultKey};

use crate::config::{discover_config_path, load_config, LlmProvider, WardenConfig};
use crate::notifier::DiscordNotifier;

const PLUGIN_HEALTH_INTERVAL: Duration = Duration::from_secs(60);
const APPROVAL_CLEANUP_INTERVAL_MS: u64 = 60_000;

fn run_mode_is_production() -> bool {
    std::env::var("WARDEN_ENV").map(|v| v == "production").unwrap_or(false)
}

fn load_vault_key(hostname: &str) -> anyhow::Result<VaultKey> {
    if let Ok(hex_key) = std::env::var("PLUGIN_ENCRYPTION_KEY") {
        return Ok(VaultKey::from_hex(&hex_key)?);
    }
    if let Ok(passphrase) = std::env::var("PLUGIN_ENCRYPTION_PASSPHRASE") {
        let salt = std::env::var("PLUGIN_ENCRYPTION_SALT").unwrap_or_else(|_| "warden-default-salt".to_string());
        return Ok(VaultKey::from_passphrase(&passphrase, salt.as_bytes())?);
    }
    if run_mode_is_production() {
        anyhow::bail!(
            "no PLUGIN_ENCRYPTION_KEY or PLUGIN_ENCRYPTION_PASSPHRASE configured; refusing to start \
             with a development vault key in production (WARDEN_ENV=production)"
        );
    }
    Ok(VaultKey::dev_fallback(hostname))
}

async fn build_storage() -> anyhow::Result<Arc<dyn StorageAdaptor>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
            Ok(Arc::new(SqlxAdaptor::connect_postgres(&url).await?))
        }
        Ok(url) if url.starts_with("sqlite://") => Ok(Arc::new(SqlxAdaptor::connect_sqlite(&url).await?)),
        Ok(url) => {
            tracing::warn!(url, "unrecognized DATABASE_URL scheme, falling back to in-memory storage");
            Ok(Arc::new(MemoryAdaptor::new()))
        }
        Err(_) => {
            tracing::info!("no DATABASE_URL configured, using in-memory storage adaptor");
            Ok(Arc::new(MemoryAdaptor::new()))
        }
    }
}

fn build_llm_client(config: &WardenConfig) -> Arc<dyn LlmClient> {
    let Some(agent) = &config.agent else {
        tracing::info!("no agent section configured, chat orchestrator will use a fake LLM client");
        return Arc::new(FakeLlmClient::new(Vec::new()));
    };

    let (base_url_env, key_env, default_base_url) = match agent.provider {
        LlmProvider::Opencode => ("OPENCODE_BASE_URL", "OPENCODE_API_KEY", "https://api.opencode.ai/v1"),
        LlmProvider::Openrouter => ("OPENROUTER_BASE_URL", "OPENROUTER_API_KEY", "https://openrouter.ai/api/v1"),
    };
    let base_url = std::env::var(base_url_env).unwrap_or_else(|_| default_base_url.to_string());
    let Ok(api_key) = std::env::var(key_env) else {
        tracing::warn!(key_env, "LLM provider configured but API key env var is unset; falling back to a fake client");
        return Arc::new(FakeLlmClient::new(Vec::new()));
    };

    Arc::new(OpenAiClient::new(base_url, api_key, agent.model.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "wardend exited with an error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config_path = discover_config_path();
    let config = match &config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            load_config(path)?
        }
        None => {
            tracing::warn!("no warden.yaml found, running with default configuration");
            WardenConfig::default()
        }
    };

    let hostname = hostname_or_fallback();
    let server_id = std::env::var("WARDEN_SERVER_ID").unwrap_or_else(|_| hostname.clone());

    let vault = Arc::new(Vault::new(load_vault_key(&hostname)?));
    let storage_adaptor = build_storage().await?;
    let (storage, storage_task) = warden_storage::spawn_writer(storage_adaptor);

    let alerts = Arc::new(AlertManager::new(AlertManagerConfig {
        cooldown_ms: config.alerts.cooldown_ms,
        max_history: config.alerts.max_history,
        resolve_after_ms: 2 * config.alerts.cooldown_ms,
    }));
    let issues = Arc::new(IssueManager::new());

    let plugin_types = Arc::new(PluginTypeRegistry::new());
    plugin_types.register(Arc::new(FilesystemStatsPlugin::new()))?;
    plugin_types.register(Arc::new(PostgresPlugin::new()))?;
    let instances = Arc::new(InstanceRegistry::with_health_interval(
        plugin_types.clone(),
        vault.clone(),
        PLUGIN_HEALTH_INTERVAL,
    ));

    let approvals = Arc::new(ApprovalManager::new());
    let _approval_cleanup = ApprovalManager::spawn_cleanup_loop(approvals.clone(), APPROVAL_CLEANUP_INTERVAL_MS);

    let audit = Arc::new(warden_approval::AuditLog::new());

    let llm = build_llm_client(&config);
    let orchestrator = Arc::new(ChatOrchestrator::new(
        plugin_types.clone(),
        instances.clone(),
        approvals.clone(),
        audit.clone(),
        llm,
    ));

    let (hub, _hub_rx) = tokio::sync::broadcast::channel(1024);

    if let Some(notifier) = DiscordNotifier::new(&config.discord) {
        notifier.spawn_alert_listener(alerts.subscribe());
        notifier.spawn_registry_listener(instances.subscribe());
    }

    // Bridge alert/issue/registry/approval events onto the realtime hub,
    // independent of whether a websocket client is currently connected.
    spawn_registry_hub_bridge(instances.subscribe(), hub.clone());
    spawn_approval_hub_bridge(approvals.subscribe(), hub.clone());

    let pipeline_handle = if let Some(netdata) = &config.netdata {
        tracing::info!(url = %netdata.url, "running the external alert-feed collector variant; rule engine is disabled");
        spawn_netdata_pipeline(netdata.clone(), alerts.clone())
    } else {
        let rule_engine = rule_config::build_rule_engine(&config.rules);
        pipeline::spawn_intrinsic_pipeline(
            server_id.clone(),
            Duration::from_millis(config.collector.interval_ms),
            rule_engine,
            alerts.clone(),
            storage.clone(),
            hub.clone(),
        )
    };
    let bridge_handle =
        pipeline::spawn_alert_to_issue_bridge(server_id.clone(), alerts.subscribe(), issues.clone(), storage.clone(), hub.clone());

    let app_state: state::SharedState = Arc::new(state::AppState {
        server_id: server_id.clone(),
        alerts,
        issues,
        plugin_types,
        instances,
        approvals,
        audit,
        orchestrator,
        storage,
        vault,
        hub,
        last_sample: parking_lot::RwLock::new(None),
    });

    let app = dashboard::router(app_state);
    let addr = format!("0.0.0.0:{}", config.dashboard.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, server_id, "wardend listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    pipeline_handle.abort();
    bridge_handle.abort();
    drop(storage_task);
    Ok(())
}

/// A minimal stand-in pipeline for the netdata-feed variant: polls on an
/// interval and folds `raised` events straight into the alert manager's
/// history via a synthetic violation, bypassing the rule engine entirely
/// for this variant. Cleared events are left to the alert manager's own
/// timing-based auto-resolve rather than forcing an instant transition, a
/// design decision recorded in DESIGN.md.
fn spawn_netdata_pipeline(
    netdata: config::NetdataConfig,
    alerts: Arc<AlertManager>,
) -> tokio::task::JoinHandle<()> {
    use warden_collector::{MonitorSeverity as FeedMonitorSeverity, NetdataFeedCollector, NetdataFeedConfig};

    let monitor_severity = match netdata.monitor_severity {
        config::MonitorSeverity::Warning => FeedMonitorSeverity::Warning,
        config::MonitorSeverity::Critical => FeedMonitorSeverity::Critical,
        config::MonitorSeverity::All => FeedMonitorSeverity::All,
    };

    let mut collector = NetdataFeedCollector::new(NetdataFeedConfig {
        url: netdata.url,
        poll_interval: Duration::from_secs(netdata.poll_interval_s),
        monitor_severity,
        ignore_alerts: netdata.ignore_alerts,
        force_alerts: netdata.force_alerts,
    });
    let poll_interval = Duration::from_secs(netdata.poll_interval_s);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            match collector.poll().await {
                Ok(events) => {
                    for event in events {
                        if event.cleared {
                            continue;
                        }
                        let severity = match event.severity {
                            warden_collector::FeedSeverity::Critical => warden_rules::Severity::Critical,
                            warden_collector::FeedSeverity::Warning => warden_rules::Severity::Warning,
                        };
                        let violation = warden_rules::RuleViolation {
                            metric_path: event.context.clone(),
                            current_value: event.value,
                            threshold: event.value,
                            severity,
                            message: format!("{}: {}", event.alert_name, event.message),
                            timestamp: chrono::Utc::now(),
                            source_detail: Some("netdata".to_string()),
                        };
                        alerts.process_tick(&[violation], chrono::Utc::now());
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "netdata alarm poll failed, tick skipped");
                }
            }
        }
    })
}

fn spawn_registry_hub_bridge(
    mut events: tokio::sync::broadcast::Receiver<warden_registry::RegistryEvent>,
    hub: tokio::sync::broadcast::Sender<hub::DashboardEvent>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let _ = hub.send(hub::from_registry_event(&event));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_approval_hub_bridge(
    mut events: tokio::sync::broadcast::Receiver<warden_approval::ApprovalEvent>,
    hub: tokio::sync::broadcast::Sender<hub::DashboardEvent>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let _ = hub.send(hub::from_approval_event(&event));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn hostname_or_fallback() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(sysinfo::System::host_name)
        .unwrap_or_else(|| "unknown-host".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
