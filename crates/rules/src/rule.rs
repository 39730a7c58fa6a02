use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
}

impl Op {
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Op::Gt => lhs > rhs,
            Op::Lt => lhs < rhs,
            Op::Ge => lhs >= rhs,
            Op::Le => lhs <= rhs,
            Op::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric_path: String,
    pub op: Op,
    pub value: f64,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SustainedRule {
    pub metric_path: String,
    pub op: Op,
    pub value: f64,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRule {
    pub metric_path: String,
    pub op: Op,
    pub rate_per_hour: f64,
    pub severity: Severity,
    pub message: String,
}

/// Loaded at startup from config, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    Threshold(ThresholdRule),
    Sustained(SustainedRule),
    Rate(RateRule),
}

impl Rule {
    pub fn metric_path(&self) -> &str {
        match self {
            Rule::Threshold(r) => &r.metric_path,
            Rule::Sustained(r) => &r.metric_path,
            Rule::Rate(r) => &r.metric_path,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Rule::Threshold(r) => r.severity,
            Rule::Sustained(r) => r.severity,
            Rule::Rate(r) => r.severity,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Rule::Threshold(r) => &r.message,
            Rule::Sustained(r) => &r.message,
            Rule::Rate(r) => &r.message,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
