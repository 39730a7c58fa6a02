use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl IssueStatus {
    pub fn is_active(self) -> bool {
        matches!(self, IssueStatus::Open | IssueStatus::Investigating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    Agent,
    Human,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    Analysis,
    Action,
    StatusChange,
    AlertFired,
    Note,
    Feedback,
}

/// "Issue" — deduped, long-lived record of a recurring alert class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub server_id: String,
    pub fingerprint: String,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub status: IssueStatus,
    pub source: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub alert_count: u64,
    pub metadata: HashMap<String, Value>,
}

/// "IssueComment" — append-only timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: String,
    pub issue_id: String,
    pub author_type: AuthorType,
    pub author_name: Option<String>,
    pub comment_type: CommentType,
    pub content: String,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}
