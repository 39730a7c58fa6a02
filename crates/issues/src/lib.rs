//! Issue manager: folds the alert stream into durable, fingerprinted issues
//! with an append-only comment timeline.

mod event;
mod fingerprint;
mod manager;
mod types;

pub use event::IssueEvent;
pub use fingerprint::issue_fingerprint;
pub use manager::{AlertFired, IssueError, IssueManager};
pub use types::{AuthorType, CommentType, Issue, IssueComment, IssueStatus};
