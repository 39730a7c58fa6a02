use crate::types::{Issue, IssueComment};

#[derive(Debug, Clone)]
pub enum IssueEvent {
    Created(Issue),
    Updated(Issue),
    CommentAdded(IssueComment),
    StatusChanged(Issue),
}
