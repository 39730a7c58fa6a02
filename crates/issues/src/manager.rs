use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::event::IssueEvent;
use crate::fingerprint::issue_fingerprint;
use crate::types::{AuthorType, CommentType, Issue, IssueComment, IssueStatus};

#[derive(Debug, Clone)]
pub struct AlertFired<'a> {
    pub server_id: &'a str,
    pub alert_name: &'a str,
    pub context: &'a str,
    pub chart: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub severity: &'a str,
    pub source: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("issue '{0}' not found")]
    NotFound(String),
}

/// Folds the alert stream into durable issues with an append-only timeline
///. One open/investigating issue exists per (serverId, fingerprint).
pub struct IssueManager {
    issues: RwLock<HashMap<String, Issue>>,
    active_index: RwLock<HashMap<(String, String), String>>,
    comments: RwLock<HashMap<String, Vec<IssueComment>>>,
    events: broadcast::Sender<IssueEvent>,
}

impl Default for IssueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            issues: RwLock::new(HashMap::new()),
            active_index: RwLock::new(HashMap::new()),
            comments: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IssueEvent> {
        self.events.subscribe()
    }

    /// First Alert with a novel fingerprint creates an Issue; a repeat
    /// increments `alertCount`/`lastSeenAt` and appends an `alert_fired`
    /// comment noting occurrence number and elapsed-since-first.
    pub fn on_alert_fired(&self, fired: AlertFired<'_>, now: DateTime<Utc>) -> Issue {
        let fingerprint = issue_fingerprint(fired.alert_name, fired.context, fired.chart);
        let index_key = (fired.server_id.to_string(), fingerprint.clone());

        let existing_id = self.active_index.read().get(&index_key).cloned();

        if let Some(issue_id) = existing_id {
            let issue = {
                let mut issues = self.issues.write();
                let issue = issues.get_mut(&issue_id).expect("active index is consistent");
                issue.alert_count += 1;
                issue.last_seen_at = now;
                issue.clone()
            };
            let elapsed = now - issue.first_seen_at;
            self.append_comment(
                &issue.id,
                AuthorType::Agent,
                None,
                CommentType::AlertFired,
                format!(
                    "alert fired again (occurrence #{}, {}s since first seen)",
                    issue.alert_count,
                    elapsed.num_seconds()
                ),
                now,
            );
            let _ = self.events.send(IssueEvent::Updated(issue.clone()));
            return issue;
        }

        let issue = Issue {
            id: uuid::Uuid::new_v4().to_string(),
            server_id: fired.server_id.to_string(),
            fingerprint: fingerprint.clone(),
            title: fired.title.to_string(),
            description: fired.description.to_string(),
            severity: fired.severity.to_string(),
            status: IssueStatus::Open,
            source: fired.source.to_string(),
            first_seen_at: now,
            last_seen_at: now,
            resolved_at: None,
            alert_count: 1,
            metadata: HashMap::new(),
        };

        self.issues.write().insert(issue.id.clone(), issue.clone());
        self.active_index.write().insert(index_key, issue.id.clone());
        self.append_comment(
            &issue.id,
            AuthorType::Agent,
            None,
            CommentType::AlertFired,
            "alert fired (occurrence #1)".to_string(),
            now,
        );
        let _ = self.events.send(IssueEvent::Created(issue.clone()));
        issue
    }

    /// Agent analysis: appends an `analysis` comment; transitions
    /// open -> investigating when human attention is flagged.
    pub fn record_analysis(
        &self,
        issue_id: &str,
        analysis: &str,
        can_auto_remediate: bool,
        requires_human_attention: bool,
        now: DateTime<Utc>,
    ) -> Result<Issue, IssueError> {
        let mut metadata = HashMap::new();
        metadata.insert("analysis".to_string(), serde_json::json!(analysis));
        metadata.insert(
            "canAutoRemediate".to_string(),
            serde_json::json!(can_auto_remediate),
        );
        metadata.insert(
            "requiresHumanAttention".to_string(),
            serde_json::json!(requires_human_attention),
        );
        self.append_comment_with_metadata(
            issue_id,
            AuthorType::Agent,
            None,
            CommentType::Analysis,
            analysis.to_string(),
            metadata,
            now,
        )?;

        if requires_human_attention {
            self.transition(issue_id, IssueStatus::Investigating, now)
        } else {
            self.get(issue_id)
        }
    }

    /// Action executed/skipped: appends an `action` comment.
    pub fn record_action(
        &self,
        issue_id: &str,
        action_type: &str,
        success: bool,
        output: Option<&str>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Issue, IssueError> {
        let mut metadata = HashMap::new();
        metadata.insert("actionType".to_string(), serde_json::json!(action_type));
        metadata.insert("success".to_string(), serde_json::json!(success));
        if let Some(output) = output {
            metadata.insert("output".to_string(), serde_json::json!(output));
        }
        if let Some(error) = error {
            metadata.insert("error".to_string(), serde_json::json!(error));
        }
        self.append_comment_with_metadata(
            issue_id,
            AuthorType::Agent,
            None,
            CommentType::Action,
            format!("action '{action_type}' {}", if success { "succeeded" } else { "failed" }),
            metadata,
            now,
        )?;
        self.get(issue_id)
    }

    /// Alert cleared: transitions to resolved, appends `status_change`.
    pub fn on_alert_cleared(&self, issue_id: &str, now: DateTime<Utc>) -> Result<Issue, IssueError> {
        let issue = self.transition(issue_id, IssueStatus::Resolved, now)?;
        {
            let mut issues = self.issues.write();
            if let Some(stored) = issues.get_mut(issue_id) {
                stored.resolved_at = Some(now);
            }
        }
        self.remove_from_active_index(issue_id);
        self.get(issue_id)
    }

    /// Human or explicit status change request.
    pub fn set_status(
        &self,
        issue_id: &str,
        status: IssueStatus,
        now: DateTime<Utc>,
    ) -> Result<Issue, IssueError> {
        let issue = self.transition(issue_id, status, now)?;
        if !status.is_active() {
            self.remove_from_active_index(issue_id);
        }
        Ok(issue)
    }

    /// Human feedback: appends a `feedback` comment. Returns the issue's
    /// `server_id` so the caller can trigger the LLM follow-up path —
    /// that orchestration lives in `warden-orchestrator`.
    pub fn add_feedback(
        &self,
        issue_id: &str,
        author_name: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Issue, IssueError> {
        self.append_comment(
            issue_id,
            AuthorType::Human,
            Some(author_name.to_string()),
            CommentType::Feedback,
            content.to_string(),
            now,
        )?;
        self.get(issue_id)
    }

    pub fn get(&self, issue_id: &str) -> Result<Issue, IssueError> {
        self.issues
            .read()
            .get(issue_id)
            .cloned()
            .ok_or_else(|| IssueError::NotFound(issue_id.to_string()))
    }

    pub fn comments(&self, issue_id: &str) -> Vec<IssueComment> {
        self.comments.read().get(issue_id).cloned().unwrap_or_default()
    }

    /// Look up the open/investigating issue for a (server, alertName,
    /// context, chart) triple without recording an occurrence — used when a
    /// caller needs to resolve an already-known fingerprint back to its
    /// issue id (e.g. the alert-cleared transition).
    pub fn active_issue_id(&self, server_id: &str, alert_name: &str, context: &str, chart: &str) -> Option<String> {
        let fingerprint = issue_fingerprint(alert_name, context, chart);
        self.active_index.read().get(&(server_id.to_string(), fingerprint)).cloned()
    }

    pub fn list_for_server(&self, server_id: &str) -> Vec<Issue> {
        self.issues.read().values().filter(|i| i.server_id == server_id).cloned().collect()
    }

    fn transition(
        &self,
        issue_id: &str,
        status: IssueStatus,
        now: DateTime<Utc>,
    ) -> Result<Issue, IssueError> {
        let issue = {
            let mut issues = self.issues.write();
            let issue = issues
                .get_mut(issue_id)
                .ok_or_else(|| IssueError::NotFound(issue_id.to_string()))?;
            issue.status = status;
            issue.clone()
        };
        self.append_comment(
            issue_id,
            AuthorType::Agent,
            None,
            CommentType::StatusChange,
            format!("status changed to {status:?}"),
            now,
        )?;
        let _ = self.events.send(IssueEvent::StatusChanged(issue.clone()));
        Ok(issue)
    }

    fn remove_from_active_index(&self, issue_id: &str) {
        let mut index = self.active_index.write();
        index.retain(|_, v| v != issue_id);
    }

    fn append_comment(
        &self,
        issue_id: &str,
        author_type: AuthorType,
        author_name: Option<String>,
        comment_type: CommentType,
        content: String,
        now: DateTime<Utc>,
    ) -> Result<(), IssueError> {
        self.append_comment_with_metadata(
            issue_id,
            author_type,
            author_name,
            comment_type,
            content,
            HashMap::new(),
            now,
        )
    }

    fn append_comment_with_metadata(
        &self,
        issue_id: &str,
        author_type: AuthorType,
        author_name: Option<String>,
        comment_type: CommentType,
        content: String,
        metadata: HashMap<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<(), IssueError> {
        if !self.issues.read().contains_key(issue_id) {
            return Err(IssueError::NotFound(issue_id.to_string()));
        }
        let comment = IssueComment {
            id: uuid::Uuid::new_v4().to_string(),
            issue_id: issue_id.to_string(),
            author_type,
            author_name,
            comment_type,
            content,
            metadata,
            created_at: now,
        };
        self.comments
            .write()
            .entry(issue_id.to_string())
            .or_default()
            .push(comment.clone());
        let _ = self.events.send(IssueEvent::CommentAdded(comment));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fired<'a>(server_id: &'a str) -> AlertFired<'a> {
        AlertFired {
            server_id,
            alert_name: "cpu_usage_alert",
            context: "system.cpu",
            chart: "cpu",
            title: "CPU usage critical",
            description: "cpu.usage exceeded threshold",
            severity: "critical",
            source: "rule-engine",
        }
    }

    #[test]
    fn first_alert_creates_issue_second_increments() {
        let manager = IssueManager::new();
        let t0 = Utc::now();

        let issue1 = manager.on_alert_fired(fired("server-1"), t0);
        assert_eq!(issue1.alert_count, 1);
        assert_eq!(issue1.status, IssueStatus::Open);

        let issue2 = manager.on_alert_fired(fired("server-1"), t0 + chrono::Duration::seconds(30));
        assert_eq!(issue1.id, issue2.id, "same fingerprint must dedup to the same issue");
        assert_eq!(issue2.alert_count, 2);

        assert_eq!(manager.comments(&issue1.id).len(), 2);
    }

    #[test]
    fn distinct_servers_never_share_an_issue() {
        let manager = IssueManager::new();
        let t0 = Utc::now();
        let a = manager.on_alert_fired(fired("server-1"), t0);
        let b = manager.on_alert_fired(fired("server-2"), t0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn analysis_with_human_attention_transitions_to_investigating() {
        let manager = IssueManager::new();
        let t0 = Utc::now();
        let issue = manager.on_alert_fired(fired("server-1"), t0);

        let updated = manager
            .record_analysis(&issue.id, "disk filling fast", false, true, t0 + chrono::Duration::seconds(1))
            .unwrap();
        assert_eq!(updated.status, IssueStatus::Investigating);
    }

    #[test]
    fn alert_cleared_resolves_and_frees_fingerprint_slot() {
        let manager = IssueManager::new();
        let t0 = Utc::now();
        let issue = manager.on_alert_fired(fired("server-1"), t0);

        let resolved = manager
            .on_alert_cleared(&issue.id, t0 + chrono::Duration::seconds(10))
            .unwrap();
        assert_eq!(resolved.status, IssueStatus::Resolved);
        assert!(resolved.resolved_at.is_some());

        // fingerprint slot is free again: a fresh alert opens a new issue.
        let reopened = manager.on_alert_fired(fired("server-1"), t0 + chrono::Duration::seconds(20));
        assert_ne!(reopened.id, issue.id);
    }

    #[test]
    fn comments_are_strictly_time_ordered() {
        let manager = IssueManager::new();
        let t0 = Utc::now();
        let issue = manager.on_alert_fired(fired("server-1"), t0);
        manager
            .record_analysis(&issue.id, "looks fine", true, false, t0 + chrono::Duration::seconds(1))
            .unwrap();
        manager
            .record_action(&issue.id, "restart_service", true, Some("ok"), None, t0 + chrono::Duration::seconds(2))
            .unwrap();

        let comments = manager.comments(&issue.id);
        for pair in comments.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn unknown_issue_id_errors() {
        let manager = IssueManager::new();
        let result = manager.record_action("missing", "noop", true, None, None, Utc::now());
        assert!(result.is_err());
    }
}
