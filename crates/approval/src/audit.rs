use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;
use warden_vault::is_sensitive_field;

use crate::types::{AuditLogEntry, AuditLogFilter, AuditStats, AuditStatus, RiskLevel};

const DEFAULT_MAX_SIZE: usize = 10_000;
const REDACTED: &str = "[REDACTED]";
/// Any plaintext string value longer than this is treated as potentially
/// sensitive even if its field name doesn't match the vault's heuristic
///.
const LONG_STRING_THRESHOLD: usize = 20;

pub struct LogOperation {
    pub server_id: String,
    pub plugin_id: String,
    pub session_id: Option<String>,
    pub approval_id: Option<String>,
    pub operation: String,
    pub parameters: HashMap<String, Value>,
    pub risk_level: RiskLevel,
    pub status: AuditStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub executed_by: String,
    pub execution_time_ms: u64,
}

fn redact_parameters(parameters: &HashMap<String, Value>) -> HashMap<String, Value> {
    parameters
        .iter()
        .map(|(key, value)| {
            let redacted = match value {
                Value::String(s) if is_sensitive_field(key) || s.len() > LONG_STRING_THRESHOLD => {
                    Value::String(REDACTED.to_string())
                }
                other => other.clone(),
            };
            (key.clone(), redacted)
        })
        .collect()
}

/// Append-only ledger of tool invocations. In-memory copy is a
/// bounded ring buffer; durable storage holds the authoritative history.
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditLogEntry>>,
    max_size: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::with_capacity(max_size.min(1024))), max_size }
    }

    pub fn log_operation(&self, op: LogOperation, now: DateTime<Utc>) -> AuditLogEntry {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            server_id: op.server_id,
            plugin_id: op.plugin_id,
            session_id: op.session_id,
            approval_id: op.approval_id,
            operation: op.operation,
            parameters: redact_parameters(&op.parameters),
            risk_level: op.risk_level,
            status: op.status,
            result: op.result,
            error: op.error,
            executed_by: op.executed_by,
            execution_time_ms: op.execution_time_ms,
            created_at: now,
        };

        let mut entries = self.entries.lock();
        if entries.len() >= self.max_size {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        entry
    }

    pub fn query(&self, filter: &AuditLogFilter) -> Vec<AuditLogEntry> {
        let entries = self.entries.lock();
        let mut matched: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|e| filter.server_id.as_deref().map(|s| s == e.server_id).unwrap_or(true))
            .filter(|e| filter.plugin_id.as_deref().map(|p| p == e.plugin_id).unwrap_or(true))
            .filter(|e| {
                filter
                    .session_id
                    .as_deref()
                    .map(|s| e.session_id.as_deref() == Some(s))
                    .unwrap_or(true)
            })
            .filter(|e| filter.risk_level.map(|r| r == e.risk_level).unwrap_or(true))
            .filter(|e| filter.status.map(|s| s == e.status).unwrap_or(true))
            .filter(|e| filter.since.map(|since| e.created_at >= since).unwrap_or(true))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    pub fn stats(&self, now: DateTime<Utc>) -> AuditStats {
        let entries = self.entries.lock();
        let mut stats = AuditStats { total: entries.len(), ..Default::default() };
        let day_ago = now - chrono::Duration::hours(24);
        for entry in entries.iter() {
            *stats.by_status.entry(format!("{:?}", entry.status)).or_insert(0) += 1;
            *stats.by_risk_level.entry(format!("{:?}", entry.risk_level)).or_insert(0) += 1;
            if entry.created_at >= day_ago {
                stats.last_24_hours += 1;
            }
        }
        stats
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_op() -> LogOperation {
        LogOperation {
            server_id: "server-1".to_string(),
            plugin_id: "postgres".to_string(),
            session_id: None,
            approval_id: None,
            operation: "query".to_string(),
            parameters: HashMap::new(),
            risk_level: RiskLevel::Low,
            status: AuditStatus::Success,
            result: None,
            error: None,
            executed_by: "system".to_string(),
            execution_time_ms: 12,
        }
    }

    #[test]
    fn sensitive_field_name_is_redacted() {
        let log = AuditLog::new();
        let mut op = base_op();
        op.parameters.insert("password".to_string(), json!("hunter2"));
        let entry = log.log_operation(op, Utc::now());
        assert_eq!(entry.parameters["password"], json!("[REDACTED]"));
    }

    #[test]
    fn long_string_value_is_redacted_even_without_sensitive_name() {
        let log = AuditLog::new();
        let mut op = base_op();
        op.parameters.insert("sql".to_string(), json!("select * from accounts where balance > 1000000"));
        let entry = log.log_operation(op, Utc::now());
        assert_eq!(entry.parameters["sql"], json!("[REDACTED]"));
    }

    #[test]
    fn short_non_sensitive_value_passes_through() {
        let log = AuditLog::new();
        let mut op = base_op();
        op.parameters.insert("table".to_string(), json!("users"));
        let entry = log.log_operation(op, Utc::now());
        assert_eq!(entry.parameters["table"], json!("users"));
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let log = AuditLog::with_capacity(3);
        let now = Utc::now();
        for _ in 0..5 {
            log.log_operation(base_op(), now);
        }
        let all = log.query(&AuditLogFilter::default());
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn query_filters_by_status_and_sorts_descending() {
        let log = AuditLog::new();
        let t0 = Utc::now();
        log.log_operation(base_op(), t0);
        let mut failed = base_op();
        failed.status = AuditStatus::Failed;
        log.log_operation(failed, t0 + chrono::Duration::seconds(1));

        let filter = AuditLogFilter { status: Some(AuditStatus::Failed), ..Default::default() };
        let results = log.query(&filter);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, AuditStatus::Failed);
    }

    #[test]
    fn stats_aggregates_by_status_and_risk() {
        let log = AuditLog::new();
        log.log_operation(base_op(), Utc::now());
        let stats = log.stats(Utc::now());
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status["Success"], 1);
    }
}
