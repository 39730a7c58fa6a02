use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::error::ApprovalError;
use crate::events::ApprovalEvent;
use crate::types::{ApprovalRequest, ApprovalStatus, RiskLevel};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_EXPIRY_MS: i64 = 60 * 60 * 1000;
const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;
const TERMINAL_RETENTION_HOURS: i64 = 24;

pub struct CreateRequest {
    pub server_id: String,
    pub session_id: Option<String>,
    pub plugin_id: String,
    pub instance_id: String,
    pub message_id: Option<String>,
    pub operation: String,
    pub parameters: HashMap<String, Value>,
    pub risk_level: RiskLevel,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// `pending -> {approved, rejected, cancelled}` by explicit call, plus a
/// timer-driven `pending -> expired` sweep. The request map and its
/// cleanup sweep share a single mutex.
pub struct ApprovalManager {
    requests: Mutex<HashMap<String, ApprovalRequest>>,
    events: broadcast::Sender<ApprovalEvent>,
    default_expiry_ms: i64,
}

impl ApprovalManager {
    pub fn new() -> Self {
        Self::with_default_expiry(DEFAULT_EXPIRY_MS)
    }

    pub fn with_default_expiry(default_expiry_ms: i64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { requests: Mutex::new(HashMap::new()), events, default_expiry_ms }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.events.subscribe()
    }

    pub fn create_request(&self, req: CreateRequest, now: DateTime<Utc>) -> ApprovalRequest {
        let expires_at = req.expires_at.unwrap_or_else(|| {
            now + chrono::Duration::milliseconds(self.default_expiry_ms)
        });
        let request = ApprovalRequest {
            id: Uuid::new_v4().to_string(),
            server_id: req.server_id,
            session_id: req.session_id,
            plugin_id: req.plugin_id,
            instance_id: req.instance_id,
            message_id: req.message_id,
            operation: req.operation,
            parameters: req.parameters,
            risk_level: req.risk_level,
            reason: req.reason,
            status: ApprovalStatus::Pending,
            requested_at: now,
            responded_at: None,
            responded_by: None,
            response_reason: None,
            expires_at,
        };
        self.requests.lock().insert(request.id.clone(), request.clone());
        let _ = self.events.send(ApprovalEvent::Created(request.clone()));
        request
    }

    fn respond(
        &self,
        id: &str,
        target: ApprovalStatus,
        responded_by: Option<String>,
        response_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut requests = self.requests.lock();
        let request = requests.get_mut(id).ok_or_else(|| ApprovalError::NotFound(id.to_string()))?;
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending(id.to_string(), format!("{:?}", request.status)));
        }
        if now > request.expires_at {
            request.status = ApprovalStatus::Expired;
            request.responded_at = Some(now);
            let expired = request.clone();
            drop(requests);
            let _ = self.events.send(ApprovalEvent::Expired(expired));
            return Err(ApprovalError::Expired(id.to_string()));
        }
        request.status = target;
        request.responded_at = Some(now);
        request.responded_by = responded_by;
        request.response_reason = response_reason;
        let mutated = request.clone();
        drop(requests);

        let event = match target {
            ApprovalStatus::Approved => ApprovalEvent::Approved(mutated.clone()),
            ApprovalStatus::Rejected => ApprovalEvent::Rejected(mutated.clone()),
            ApprovalStatus::Cancelled => ApprovalEvent::Cancelled(mutated.clone()),
            _ => unreachable!("respond() is only called with a terminal non-expired target"),
        };
        let _ = self.events.send(event);
        Ok(mutated)
    }

    pub fn approve(
        &self,
        id: &str,
        approved_by: impl Into<String>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.respond(id, ApprovalStatus::Approved, Some(approved_by.into()), reason, now)
    }

    pub fn reject(
        &self,
        id: &str,
        rejected_by: impl Into<String>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.respond(id, ApprovalStatus::Rejected, Some(rejected_by.into()), reason, now)
    }

    pub fn cancel(&self, id: &str, now: DateTime<Utc>) -> Result<ApprovalRequest, ApprovalError> {
        self.respond(id, ApprovalStatus::Cancelled, None, None, now)
    }

    pub fn get(&self, id: &str) -> Option<ApprovalRequest> {
        self.requests.lock().get(id).cloned()
    }

    pub fn list_pending(&self) -> Vec<ApprovalRequest> {
        self.requests
            .lock()
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect()
    }

    /// Filterable listing for the REST surface, sorted most-recent-first.
    pub fn list(&self, server_id: Option<&str>, status: Option<ApprovalStatus>) -> Vec<ApprovalRequest> {
        let mut matched: Vec<ApprovalRequest> = self
            .requests
            .lock()
            .values()
            .filter(|r| server_id.map(|s| s == r.server_id).unwrap_or(true))
            .filter(|r| status.map(|s| s == r.status).unwrap_or(true))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        matched
    }

    /// One sweep of the cleanup timer: expire anything pending
    /// past its deadline, then GC terminal entries older than 24h.
    pub fn run_cleanup(&self, now: DateTime<Utc>) {
        let mut requests = self.requests.lock();
        let mut expired = Vec::new();
        for request in requests.values_mut() {
            if request.status == ApprovalStatus::Pending && now > request.expires_at {
                request.status = ApprovalStatus::Expired;
                request.responded_at = Some(now);
                expired.push(request.clone());
            }
        }
        let retention = chrono::Duration::hours(TERMINAL_RETENTION_HOURS);
        requests.retain(|_, r| {
            !r.status.is_terminal() || r.responded_at.map(|t| now - t < retention).unwrap_or(true)
        });
        drop(requests);
        for request in expired {
            info!(approval_id = %request.id, "approval request expired");
            let _ = self.events.send(ApprovalEvent::Expired(request));
        }
    }

    pub fn spawn_cleanup_loop(manager: std::sync::Arc<Self>, interval_ms: u64) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                manager.run_cleanup(Utc::now());
            }
        })
    }
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::new()
    }
}

pub const DEFAULT_CLEANUP_INTERVAL: u64 = DEFAULT_CLEANUP_INTERVAL_MS;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn sample_request() -> CreateRequest {
        CreateRequest {
            server_id: "server-1".to_string(),
            session_id: None,
            plugin_id: "postgres".to_string(),
            instance_id: "instance-1".to_string(),
            message_id: None,
            operation: "drop_table".to_string(),
            parameters: HashMap::new(),
            risk_level: RiskLevel::Critical,
            reason: "destructive operation".to_string(),
            expires_at: None,
        }
    }

    #[test]
    fn create_then_approve_transitions_to_approved() {
        let manager = ApprovalManager::new();
        let t0 = Utc::now();
        let request = manager.create_request(sample_request(), t0);
        assert_eq!(request.status, ApprovalStatus::Pending);

        let approved = manager.approve(&request.id, "alice", None, t0 + ChronoDuration::seconds(1)).unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);
        assert_eq!(approved.responded_by.as_deref(), Some("alice"));
    }

    #[test]
    fn second_transition_on_same_request_is_rejected_as_stale() {
        let manager = ApprovalManager::new();
        let t0 = Utc::now();
        let request = manager.create_request(sample_request(), t0);
        manager.approve(&request.id, "alice", None, t0).unwrap();

        let err = manager.reject(&request.id, "bob", None, t0).unwrap_err();
        assert!(matches!(err, ApprovalError::NotPending(_, _)));
    }

    #[test]
    fn approving_past_expiry_marks_expired_instead() {
        let manager = ApprovalManager::with_default_expiry(1_000);
        let t0 = Utc::now();
        let request = manager.create_request(sample_request(), t0);

        let err = manager.approve(&request.id, "alice", None, t0 + ChronoDuration::seconds(5)).unwrap_err();
        assert!(matches!(err, ApprovalError::Expired(_)));
        assert_eq!(manager.get(&request.id).unwrap().status, ApprovalStatus::Expired);
    }

    #[test]
    fn cleanup_sweep_expires_overdue_pending_requests() {
        let manager = ApprovalManager::with_default_expiry(1_000);
        let t0 = Utc::now();
        let request = manager.create_request(sample_request(), t0);

        manager.run_cleanup(t0 + ChronoDuration::seconds(5));
        assert_eq!(manager.get(&request.id).unwrap().status, ApprovalStatus::Expired);
    }

    #[test]
    fn cleanup_sweep_gcs_old_terminal_entries() {
        let manager = ApprovalManager::new();
        let t0 = Utc::now();
        let request = manager.create_request(sample_request(), t0);
        manager.cancel(&request.id, t0).unwrap();

        manager.run_cleanup(t0 + ChronoDuration::hours(25));
        assert!(manager.get(&request.id).is_none());
    }

    #[test]
    fn unknown_id_returns_not_found() {
        let manager = ApprovalManager::new();
        let err = manager.approve("missing", "alice", None, Utc::now()).unwrap_err();
        assert!(matches!(err, ApprovalError::NotFound(_)));
    }
}
