//! Fan-out point for the realtime stream: every
//! subsystem event channel is translated into one typed [`DashboardEvent`]
//! and broadcast to every connected websocket client plus the
//! `request-state` snapshot responder.

use serde_json::{json, Value};

use warden_alerts::AlertEvent;
use warden_approval::ApprovalEvent;
use warden_issues::IssueEvent;
use warden_registry::RegistryEvent;

/// One frame of the over-the-wire event stream. `kind` follows the
/// `metrics`/`alert`/`agent-result`/`chat:*`/`plugin:*`/`approval:*` naming
/// scheme the dashboard clients expect.
#[derive(Debug, Clone)]
pub struct DashboardEvent {
    pub kind: String,
    pub payload: Value,
}

impl DashboardEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self { kind: kind.into(), payload }
    }

    pub fn to_frame(&self) -> Value {
        json!({ "type": self.kind, "payload": self.payload })
    }
}

pub fn from_alert_event(event: &AlertEvent) -> DashboardEvent {
    let (kind, alert) = match event {
        AlertEvent::New(a) => ("alert:new", a),
        AlertEvent::Updated(a) => ("alert:updated", a),
        AlertEvent::Resolved(a) => ("alert:resolved", a),
        AlertEvent::Acknowledged(a) => ("alert:acknowledged", a),
    };
    DashboardEvent::new(kind, serde_json::to_value(alert).unwrap_or(Value::Null))
}

pub fn from_issue_event(event: &IssueEvent) -> DashboardEvent {
    match event {
        IssueEvent::Created(i) => DashboardEvent::new("issue:created", serde_json::to_value(i).unwrap_or(Value::Null)),
        IssueEvent::Updated(i) => DashboardEvent::new("issue:updated", serde_json::to_value(i).unwrap_or(Value::Null)),
        IssueEvent::StatusChanged(i) => {
            DashboardEvent::new("issue:status_changed", serde_json::to_value(i).unwrap_or(Value::Null))
        }
        IssueEvent::CommentAdded(c) => {
            DashboardEvent::new("issue:comment_added", serde_json::to_value(c).unwrap_or(Value::Null))
        }
    }
}

pub fn from_registry_event(event: &RegistryEvent) -> DashboardEvent {
    match event {
        RegistryEvent::PluginRegistered { plugin_id } => {
            DashboardEvent::new("plugin:registered", json!({ "pluginId": plugin_id }))
        }
        RegistryEvent::PluginUnregistered { plugin_id } => {
            DashboardEvent::new("plugin:unregistered", json!({ "pluginId": plugin_id }))
        }
        RegistryEvent::InstanceCreated { instance } => {
            DashboardEvent::new("plugin:instance_created", serde_json::to_value(instance).unwrap_or(Value::Null))
        }
        RegistryEvent::InstanceRemoved { instance_id } => {
            DashboardEvent::new("plugin:instance_removed", json!({ "instanceId": instance_id }))
        }
        RegistryEvent::InstanceEnabledChanged { instance_id, enabled } => {
            DashboardEvent::new("plugin:instance_enabled_changed", json!({ "instanceId": instance_id, "enabled": enabled }))
        }
        RegistryEvent::HealthChanged { instance_id, status, message } => DashboardEvent::new(
            "plugin:health_changed",
            json!({ "instanceId": instance_id, "status": status, "message": message }),
        ),
        RegistryEvent::ToolExecuted { instance_id, tool_name, result } => DashboardEvent::new(
            "plugin:tool_executed",
            json!({ "instanceId": instance_id, "tool": tool_name, "result": result }),
        ),
    }
}

pub fn from_approval_event(event: &ApprovalEvent) -> DashboardEvent {
    let (kind, request) = match event {
        ApprovalEvent::Created(r) => ("approval:created", r),
        ApprovalEvent::Approved(r) => ("approval:approved", r),
        ApprovalEvent::Rejected(r) => ("approval:rejected", r),
        ApprovalEvent::Cancelled(r) => ("approval:cancelled", r),
        ApprovalEvent::Expired(r) => ("approval:expired", r),
    };
    DashboardEvent::new(kind, serde_json::to_value(request).unwrap_or(Value::Null))
}
