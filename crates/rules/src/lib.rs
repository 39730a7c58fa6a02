//! Rule evaluation: turns a `MetricSample` into zero or more `RuleViolation`s
//! according to the configured threshold/sustained/rate rules plus the
//! synthetic per-mount and per-process alerts.

mod engine;
mod process_limit;
mod rate;
mod rule;
mod sustained;
mod violation;

pub use engine::{MountAlertConfig, ProcessAlertConfig, RuleEngine};
pub use rule::{Op, Rule, RateRule, Severity, SustainedRule, ThresholdRule};
pub use violation::RuleViolation;
