use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use tokio::sync::broadcast;

use warden_rules::RuleViolation;

use crate::alert::{alert_fingerprint, Alert};
use crate::event::AlertEvent;

#[derive(Debug, Clone)]
pub struct AlertManagerConfig {
    pub cooldown_ms: i64,
    pub max_history: usize,
    /// Resolved as an explicit knob defaulting to
    /// `2 * cooldown_ms` rather than a hardcoded multiplier.
    pub resolve_after_ms: i64,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        let cooldown_ms = 5 * 60 * 1000;
        Self {
            cooldown_ms,
            max_history: 1000,
            resolve_after_ms: 2 * cooldown_ms,
        }
    }
}

struct FingerprintState {
    alert: Alert,
    last_seen_at: DateTime<Utc>,
}

/// Turns the violation stream into durable alerts with dedup, cooldown, and
/// auto-resolution. Modeled on `ConnectorRegistry`'s
/// `RwLock<HashMap<..>>` shape, keyed by fingerprint instead of connector id.
pub struct AlertManager {
    config: AlertManagerConfig,
    active: RwLock<HashMap<String, FingerprintState>>,
    history: RwLock<VecDeque<Alert>>,
    events: broadcast::Sender<AlertEvent>,
}

impl AlertManager {
    pub fn new(config: AlertManagerConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.events.subscribe()
    }

    /// Process every violation from one metric tick: creates/updates alerts,
    /// then resolves any alert whose fingerprint went quiet for too long.
    /// Rule evaluation -> alert manager -> issue manager are serialised per
    /// tick; this call is that alert-manager step.
    pub fn process_tick(&self, violations: &[RuleViolation], now: DateTime<Utc>) {
        let mut seen_this_tick = Vec::with_capacity(violations.len());

        for violation in violations {
            let fingerprint =
                alert_fingerprint(&violation.metric_path, violation.severity, &violation.message);
            seen_this_tick.push(fingerprint.clone());
            self.record_violation(&fingerprint, violation, now);
        }

        self.resolve_stale(&seen_this_tick, now);
    }

    fn record_violation(&self, fingerprint: &str, violation: &RuleViolation, now: DateTime<Utc>) {
        let mut active = self.active.write();

        if let Some(state) = active.get_mut(fingerprint) {
            // Dedup: an unresolved alert already exists, update it in place.
            state.alert.current_value = violation.current_value;
            state.last_seen_at = now;
            let updated = state.alert.clone();
            drop(active);
            self.push_history(updated.clone());
            let _ = self.events.send(AlertEvent::Updated(updated));
            return;
        }

        drop(active);

        // No active alert for this fingerprint. Still subject to the
        // per-fingerprint cooldown even if the prior alert already resolved.
        let within_cooldown = {
            let history = self.history.read();
            history
                .iter()
                .rev()
                .find(|a| a.fingerprint == fingerprint)
                .map(|a| (now - a.created_at).num_milliseconds() < self.config.cooldown_ms)
                .unwrap_or(false)
        };
        if within_cooldown {
            return;
        }

        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            fingerprint: fingerprint.to_string(),
            severity: violation.severity,
            message: violation.message.clone(),
            metric: violation.metric_path.clone(),
            current_value: violation.current_value,
            threshold: violation.threshold,
            created_at: now,
            resolved_at: None,
            acknowledged: false,
            source: violation
                .source_detail
                .clone()
                .unwrap_or_else(|| "rule-engine".to_string()),
            metadata: HashMap::new(),
        };

        self.active.write().insert(
            fingerprint.to_string(),
            FingerprintState {
                alert: alert.clone(),
                last_seen_at: now,
            },
        );
        self.push_history(alert.clone());
        let _ = self.events.send(AlertEvent::New(alert));
    }

    fn resolve_stale(&self, seen_this_tick: &[String], now: DateTime<Utc>) {
        let to_resolve: Vec<String> = {
            let active = self.active.read();
            active
                .iter()
                .filter(|(fp, state)| {
                    !seen_this_tick.contains(fp)
                        && (now - state.last_seen_at).num_milliseconds()
                            >= self.config.resolve_after_ms
                })
                .map(|(fp, _)| fp.clone())
                .collect()
        };

        for fingerprint in to_resolve {
            let resolved = {
                let mut active = self.active.write();
                active.remove(&fingerprint).map(|mut state| {
                    state.alert.resolved_at = Some(now);
                    state.alert
                })
            };
            if let Some(alert) = resolved {
                self.push_history(alert.clone());
                let _ = self.events.send(AlertEvent::Resolved(alert));
            }
        }
    }

    pub fn acknowledge(&self, id: &str) -> bool {
        let mut active = self.active.write();
        let entry = active.values_mut().find(|s| s.alert.id == id);
        match entry {
            Some(state) => {
                state.alert.acknowledged = true;
                let alert = state.alert.clone();
                drop(active);
                self.push_history(alert.clone());
                let _ = self.events.send(AlertEvent::Acknowledged(alert));
                true
            }
            None => false,
        }
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.active.read().values().map(|s| s.alert.clone()).collect()
    }

    pub fn history(&self, limit: usize) -> Vec<Alert> {
        let history = self.history.read();
        history.iter().rev().take(limit).cloned().collect()
    }

    fn push_history(&self, alert: Alert) {
        let mut history = self.history.write();
        history.push_back(alert);
        while history.len() > self.config.max_history {
            history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_rules::Severity;

    fn violation(metric: &str, value: f64, severity: Severity, message: &str) -> RuleViolation {
        RuleViolation {
            metric_path: metric.to_string(),
            current_value: value,
            threshold: 90.0,
            severity,
            message: message.to_string(),
            timestamp: Utc::now(),
            source_detail: None,
        }
    }

    #[test]
    fn dedups_unresolved_alert_within_same_fingerprint() {
        let manager = AlertManager::new(AlertManagerConfig::default());
        let t0 = Utc::now();

        manager.process_tick(&[violation("cpu.usage", 95.0, Severity::Critical, "cpu hot")], t0);
        assert_eq!(manager.active_alerts().len(), 1);

        manager.process_tick(
            &[violation("cpu.usage", 97.0, Severity::Critical, "cpu hot")],
            t0 + chrono::Duration::seconds(5),
        );
        let active = manager.active_alerts();
        assert_eq!(active.len(), 1, "dedup must update in place, not create a second alert");
        assert_eq!(active[0].current_value, 97.0);
    }

    #[test]
    fn cooldown_suppresses_recreation_after_resolve() {
        let config = AlertManagerConfig {
            cooldown_ms: 60_000,
            resolve_after_ms: 1_000,
            ..AlertManagerConfig::default()
        };
        let manager = AlertManager::new(config);
        let t0 = Utc::now();

        manager.process_tick(&[violation("cpu.usage", 95.0, Severity::Critical, "cpu hot")], t0);
        assert_eq!(manager.active_alerts().len(), 1);

        // Violations cease; after resolve_after_ms the alert resolves.
        let t_resolve = t0 + chrono::Duration::milliseconds(1500);
        manager.process_tick(&[], t_resolve);
        assert_eq!(manager.active_alerts().len(), 0);

        // Re-firing within cooldown of the *original* creation is suppressed.
        let t_refire = t0 + chrono::Duration::milliseconds(2000);
        manager.process_tick(
            &[violation("cpu.usage", 95.0, Severity::Critical, "cpu hot")],
            t_refire,
        );
        assert_eq!(
            manager.active_alerts().len(),
            0,
            "re-creation within cooldownMs of the last alert must be suppressed"
        );
    }

    #[test]
    fn acknowledge_unknown_id_returns_false() {
        let manager = AlertManager::new(AlertManagerConfig::default());
        assert!(!manager.acknowledge("missing"));
    }

    #[test]
    fn history_is_bounded() {
        let config = AlertManagerConfig {
            cooldown_ms: 0,
            max_history: 3,
            resolve_after_ms: 0,
        };
        let manager = AlertManager::new(config);
        let t0 = Utc::now();
        for i in 0..5 {
            manager.process_tick(
                &[violation(
                    "cpu.usage",
                    90.0 + i as f64,
                    Severity::Warning,
                    &format!("distinct-{i}"),
                )],
                t0 + chrono::Duration::seconds(i),
            );
        }
        assert_eq!(manager.history(100).len(), 3);
    }
}
