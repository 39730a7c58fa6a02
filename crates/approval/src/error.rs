use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval request not found: {0}")]
    NotFound(String),

    /// The request already left `pending` — a stale-state error enforcing
    /// a "first transition wins" ordering guarantee.
    #[error("approval request {0} is no longer pending (status: {1})")]
    NotPending(String, String),

    #[error("approval request {0} has expired")]
    Expired(String),
}
