//! External alert-feed collector variant (the external alert
//! feed variant). Polls a monitoring service's alarm endpoint and translates
//! raised/cleared transitions directly into alert-stream events, bypassing
//! the rule engine entirely. When this variant is active the rule engine
//! must be disabled by the caller.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::error::CollectorError;

#[derive(Debug, Clone)]
pub struct AlertFeedEvent {
    pub alert_name: String,
    pub context: String,
    pub chart: String,
    pub severity: FeedSeverity,
    pub message: String,
    pub value: f64,
    pub raised_at: DateTime<Utc>,
    /// `true` when the monitoring service reports the alarm cleared.
    pub cleared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Deserialize)]
struct RawAlarmList {
    alarms: std::collections::HashMap<String, RawAlarm>,
}

#[derive(Debug, Deserialize)]
struct RawAlarm {
    name: String,
    #[serde(default)]
    chart: String,
    #[serde(default)]
    context: String,
    status: String,
    value: f64,
    info: String,
}

pub struct NetdataFeedConfig {
    pub url: String,
    pub poll_interval: Duration,
    pub monitor_severity: MonitorSeverity,
    pub ignore_alerts: Vec<String>,
    pub force_alerts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSeverity {
    Warning,
    Critical,
    All,
}

/// Polls a Netdata-compatible `/api/v1/alarms` endpoint and diffs the
/// returned alarm set against the previously seen one to produce
/// raised/cleared [`AlertFeedEvent`]s.
pub struct NetdataFeedCollector {
    client: reqwest::Client,
    config: NetdataFeedConfig,
    seen: std::collections::HashSet<String>,
}

impl NetdataFeedCollector {
    pub fn new(config: NetdataFeedConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            seen: std::collections::HashSet::new(),
        }
    }

    pub async fn poll(&mut self) -> Result<Vec<AlertFeedEvent>, CollectorError> {
        let resp = self.client.get(&self.config.url).send().await?;
        let raw: RawAlarmList = resp
            .json()
            .await
            .map_err(|e| CollectorError::FeedMalformed(e.to_string()))?;

        let mut events = Vec::new();
        let mut current = std::collections::HashSet::new();

        for alarm in raw.alarms.values() {
            if self.config.ignore_alerts.contains(&alarm.name) {
                continue;
            }
            let forced = self.config.force_alerts.contains(&alarm.name);
            let severity = match alarm.status.as_str() {
                "CRITICAL" => Some(FeedSeverity::Critical),
                "WARNING" => Some(FeedSeverity::Warning),
                _ => None,
            };

            let Some(severity) = severity else { continue };
            if !forced && !self.passes_severity_filter(severity) {
                continue;
            }

            current.insert(alarm.name.clone());
            if !self.seen.contains(&alarm.name) {
                events.push(AlertFeedEvent {
                    alert_name: alarm.name.clone(),
                    context: alarm.context.clone(),
                    chart: alarm.chart.clone(),
                    severity,
                    message: alarm.info.clone(),
                    value: alarm.value,
                    raised_at: Utc::now(),
                    cleared: false,
                });
            }
        }

        for name in self.seen.difference(&current) {
            events.push(AlertFeedEvent {
                alert_name: name.clone(),
                context: String::new(),
                chart: String::new(),
                severity: FeedSeverity::Warning,
                message: "cleared".into(),
                value: 0.0,
                raised_at: Utc::now(),
                cleared: true,
            });
        }

        self.seen = current;
        Ok(events)
    }

    fn passes_severity_filter(&self, severity: FeedSeverity) -> bool {
        match self.config.monitor_severity {
            MonitorSeverity::All => true,
            MonitorSeverity::Critical => severity == FeedSeverity::Critical,
            MonitorSeverity::Warning => true,
        }
    }
}
