use crate::alert::Alert;

/// Typed alert lifecycle event, broadcast to the issue manager, notifier,
/// and chat orchestrator.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    New(Alert),
    Updated(Alert),
    Resolved(Alert),
    Acknowledged(Alert),
}

impl AlertEvent {
    pub fn alert(&self) -> &Alert {
        match self {
            AlertEvent::New(a)
            | AlertEvent::Updated(a)
            | AlertEvent::Resolved(a)
            | AlertEvent::Acknowledged(a) => a,
        }
    }
}
