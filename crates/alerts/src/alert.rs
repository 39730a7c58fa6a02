use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use warden_rules::Severity;

/// Durable alert record. At most one unresolved alert
/// exists per fingerprint at any instant — enforced by `AlertManager`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub fingerprint: String,
    pub severity: Severity,
    pub message: String,
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged: bool,
    pub source: String,
    pub metadata: HashMap<String, Value>,
}

impl Alert {
    pub fn is_unresolved(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Alert fingerprint = SHA-256 hex of `metricPath:severity:message`.
/// Unlike the Issue fingerprint this isn't truncated — only Issues use the
/// truncated form, so the full digest is kept here.
pub fn alert_fingerprint(metric_path: &str, severity: Severity, message: &str) -> String {
    let severity_tag = match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    };
    let mut hasher = Sha256::new();
    hasher.update(metric_path.as_bytes());
    hasher.update(b":");
    hasher.update(severity_tag.as_bytes());
    hasher.update(b":");
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = alert_fingerprint("cpu.usage", Severity::Critical, "cpu critical");
        let b = alert_fingerprint("cpu.usage", Severity::Critical, "cpu critical");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_distinguishes_severity() {
        let a = alert_fingerprint("cpu.usage", Severity::Critical, "cpu critical");
        let b = alert_fingerprint("cpu.usage", Severity::Warning, "cpu critical");
        assert_ne!(a, b);
    }
}
