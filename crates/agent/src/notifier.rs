//! Discord notification sink: a one-shot outbound interface only.
//! Fire-and-forget POSTs to a webhook URL; failures are logged, never
//! propagated back into the alert/issue pipeline.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use tracing::warn;

use warden_alerts::AlertEvent;
use warden_registry::RegistryEvent;
use warden_rules::Severity;

use crate::config::DiscordConfig;

pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: String,
    notify_on_critical: bool,
    notify_on_agent_action: bool,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Option<Arc<Self>> {
        if !config.enabled {
            return None;
        }
        let Some(webhook_url) = config.webhook_url.clone() else {
            warn!("discord notifier enabled but no webhookUrl configured; notifier disabled");
            return None;
        };
        Some(Arc::new(Self {
            client: reqwest::Client::new(),
            webhook_url,
            notify_on_critical: config.notify_on_critical,
            notify_on_agent_action: config.notify_on_agent_action,
        }))
    }

    async fn send(&self, content: String) {
        let body = json!({ "content": content });
        if let Err(err) = self.client.post(&self.webhook_url).json(&body).send().await {
            warn!(error = %err, "discord webhook delivery failed");
        }
    }

    pub fn spawn_alert_listener(self: &Arc<Self>, mut events: broadcast::Receiver<AlertEvent>) {
        let notifier = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AlertEvent::New(alert)) if notifier.notify_on_critical && alert.severity == Severity::Critical => {
                        notifier
                            .send(format!(
                                "**Critical alert**: {} (`{}` = {:.2}, threshold {:.2})",
                                alert.message, alert.metric, alert.current_value, alert.threshold
                            ))
                            .await;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn spawn_registry_listener(self: &Arc<Self>, mut events: broadcast::Receiver<RegistryEvent>) {
        let notifier = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(RegistryEvent::ToolExecuted { instance_id, tool_name, result }) if notifier.notify_on_agent_action => {
                        let outcome = if result.success { "succeeded" } else { "failed" };
                        notifier
                            .send(format!("Agent action `{tool_name}` on instance `{instance_id}` {outcome}"))
                            .await;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
