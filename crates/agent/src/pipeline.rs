//! Wires collector samples through the rule engine, alert manager, and
//! issue manager, fanning resulting events out to
//! durable storage and the realtime hub.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{error, info};

use warden_alerts::{AlertEvent, AlertManager};
use warden_collector::{CollectorEvent, IntrinsicCollector, MetricSample};
use warden_issues::{AlertFired, IssueManager};
use warden_rules::RuleEngine;
use warden_storage::{StorageWriter, WriteJob};

use crate::hub::{from_alert_event, from_issue_event, DashboardEvent};

const METRICS_SNAPSHOT_EVERY_N: u64 = 12;

/// `(alertName, context, chart)` for the issue fingerprint, derived
/// from the fields an `Alert` actually carries. A design decision recorded
/// in DESIGN.md: `metric` stands in for `alertName`, `source` for `context`,
/// and `message` for `chart`.
fn issue_key(alert: &warden_alerts::Alert) -> (String, String, String) {
    (alert.metric.clone(), alert.source.clone(), alert.message.clone())
}

/// Drives the intrinsic-collector variant: sample -> rules -> alerts, with
/// rule evaluation confined to this task ("the rule engine's
/// per-rule sustained/rate state is mutated only by the collector worker").
pub fn spawn_intrinsic_pipeline(
    server_id: String,
    interval: Duration,
    mut rule_engine: RuleEngine,
    alerts: Arc<AlertManager>,
    storage: StorageWriter,
    hub: broadcast::Sender<DashboardEvent>,
) -> tokio::task::JoinHandle<()> {
    let (mut collector_handle, collector_task) =
        warden_collector::spawn_collector(IntrinsicCollector::new(), interval);

    tokio::spawn(async move {
        let mut tick: u64 = 0;
        loop {
            tokio::select! {
                sample = collector_handle.samples.recv() => {
                    let Some(sample) = sample else { break };
                    tick += 1;
                    process_sample(&server_id, &sample, &mut rule_engine, &alerts, &storage, &hub, tick);
                }
                event = collector_handle.events.recv() => {
                    match event {
                        Ok(CollectorEvent::SampleFailed(reason)) => {
                            error!(reason, "metric sampling failed, tick skipped");
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        collector_task.abort();
    })
}

fn process_sample(
    server_id: &str,
    sample: &MetricSample,
    rule_engine: &mut RuleEngine,
    alerts: &Arc<AlertManager>,
    storage: &StorageWriter,
    hub: &broadcast::Sender<DashboardEvent>,
    tick: u64,
) {
    let now = Utc::now();
    let violations = rule_engine.evaluate(sample);
    alerts.process_tick(&violations, now);

    let _ = hub.send(DashboardEvent::new(
        "metrics",
        serde_json::to_value(sample).unwrap_or(serde_json::Value::Null),
    ));

    if tick % METRICS_SNAPSHOT_EVERY_N == 0 {
        storage.enqueue(WriteJob::InsertMetricsSnapshot {
            server_id: server_id.to_string(),
            sample: sample.clone(),
        });
    }
}

/// Consumes the alert event stream (subscribed before the pipeline task
/// starts, so no event is missed) and folds it into the issue manager,
/// durable storage, and the realtime hub. A single consumer task preserves
/// the alert manager's emission order, preserving per-tick ordering without
/// serializing issue/storage work onto the collector's own critical path.
pub fn spawn_alert_to_issue_bridge(
    server_id: String,
    mut events: broadcast::Receiver<AlertEvent>,
    issues: Arc<IssueManager>,
    storage: StorageWriter,
    hub: broadcast::Sender<DashboardEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "alert event consumer lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let _ = hub.send(from_alert_event(&event));

            match &event {
                AlertEvent::New(alert) => {
                    storage.enqueue(WriteJob::InsertAlert { server_id: server_id.clone(), alert: alert.clone() });
                    let (alert_name, context, chart) = issue_key(alert);
                    let issue = issues.on_alert_fired(
                        AlertFired {
                            server_id: &server_id,
                            alert_name: &alert_name,
                            context: &context,
                            chart: &chart,
                            title: &alert.message,
                            description: &alert.message,
                            severity: severity_label(alert.severity),
                            source: &alert.source,
                        },
                        Utc::now(),
                    );
                    storage.enqueue(WriteJob::UpsertIssue(issue.clone()));
                    let _ = hub.send(DashboardEvent::new(
                        "issue:created_or_updated",
                        serde_json::to_value(&issue).unwrap_or(serde_json::Value::Null),
                    ));
                }
                AlertEvent::Updated(alert) => {
                    storage.enqueue(WriteJob::InsertAlert { server_id: server_id.clone(), alert: alert.clone() });
                }
                AlertEvent::Resolved(alert) => {
                    storage.enqueue(WriteJob::ResolveAlert(alert.id.clone()));
                    let (alert_name, context, chart) = issue_key(alert);
                    if let Some(issue_id) = issues.active_issue_id(&server_id, &alert_name, &context, &chart) {
                        if let Ok(issue) = issues.on_alert_cleared(&issue_id, Utc::now()) {
                            storage.enqueue(WriteJob::UpsertIssue(issue.clone()));
                            let _ = hub.send(from_issue_event(&warden_issues::IssueEvent::StatusChanged(issue)));
                        }
                    }
                }
                AlertEvent::Acknowledged(alert) => {
                    storage.enqueue(WriteJob::AcknowledgeAlert(alert.id.clone()));
                }
            }
        }
        info!("alert-to-issue bridge shut down");
    })
}

fn severity_label(severity: warden_rules::Severity) -> &'static str {
    match severity {
        warden_rules::Severity::Info => "info",
        warden_rules::Severity::Warning => "warning",
        warden_rules::Severity::Critical => "critical",
    }
}
