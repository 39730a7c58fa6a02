use crate::types::RiskLevel;

/// One row of the risk→policy table, generalized from
/// `gate::engine`'s blocking-threshold-then-reasoning shape: here the
/// "reasoning" string is carried forward as `ApprovalRequest.reason` /
/// `AuditLogEntry.result` instead of a budget-exceeded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub auto_execute: bool,
    pub requires_approval: bool,
}

/// The only source of truth for whether a risk level needs a human in the
/// loop. A `const fn` so callers can use it in match arms and tests alike.
pub const fn policy_for(risk: RiskLevel) -> Policy {
    match risk {
        RiskLevel::Low => Policy { auto_execute: true, requires_approval: false },
        RiskLevel::Medium => Policy { auto_execute: false, requires_approval: true },
        RiskLevel::High => Policy { auto_execute: false, requires_approval: true },
        RiskLevel::Critical => Policy { auto_execute: false, requires_approval: true },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_low_risk_auto_executes() {
        assert!(policy_for(RiskLevel::Low).auto_execute);
        assert!(!policy_for(RiskLevel::Medium).auto_execute);
        assert!(!policy_for(RiskLevel::High).auto_execute);
        assert!(!policy_for(RiskLevel::Critical).auto_execute);
    }

    #[test]
    fn everything_but_low_requires_approval() {
        assert!(!policy_for(RiskLevel::Low).requires_approval);
        assert!(policy_for(RiskLevel::Medium).requires_approval);
        assert!(policy_for(RiskLevel::High).requires_approval);
        assert!(policy_for(RiskLevel::Critical).requires_approval);
    }
}
