use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::Severity;

/// Transient: emitted by each rule evaluation, consumed immediately by the
/// alert manager. Never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleViolation {
    pub metric_path: String,
    pub current_value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Present for synthetic per-mount/per-process violations.
    pub source_detail: Option<String>,
}
