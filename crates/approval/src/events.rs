use crate::types::ApprovalRequest;

#[derive(Debug, Clone)]
pub enum ApprovalEvent {
    Created(ApprovalRequest),
    Approved(ApprovalRequest),
    Rejected(ApprovalRequest),
    Cancelled(ApprovalRequest),
    Expired(ApprovalRequest),
}
