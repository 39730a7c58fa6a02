use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;

use warden_collector::{get_value, MetricSample};

use crate::process_limit::ProcessAlertLimiter;
use crate::rate::RateWindow;
use crate::rule::{Op, Rule, Severity};
use crate::sustained::SustainedTracker;
use crate::violation::RuleViolation;

#[derive(Debug, Clone)]
pub struct MountAlertConfig {
    pub used_percent: f64,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ProcessAlertConfig {
    pub cpu_percent: Option<f64>,
    pub mem_percent: Option<f64>,
    pub severity: Severity,
}

/// Stateless-per-tick evaluator holding only the small amount of
/// cross-tick state the sustained/rate rule kinds require.
/// Mutated only by the collector worker.
pub struct RuleEngine {
    rules: Vec<Rule>,
    sustained: SustainedTracker,
    rate_windows: HashMap<String, RateWindow>,
    process_limiter: ProcessAlertLimiter,
    mount_alert: Option<MountAlertConfig>,
    process_alert: Option<ProcessAlertConfig>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            sustained: SustainedTracker::new(),
            rate_windows: HashMap::new(),
            process_limiter: ProcessAlertLimiter::default_window(),
            mount_alert: None,
            process_alert: None,
        }
    }

    pub fn with_mount_alert(mut self, cfg: MountAlertConfig) -> Self {
        self.mount_alert = Some(cfg);
        self
    }

    pub fn with_process_alert(mut self, cfg: ProcessAlertConfig) -> Self {
        self.process_alert = Some(cfg);
        self
    }

    pub fn with_process_alert_window(mut self, window: Duration) -> Self {
        self.process_limiter = ProcessAlertLimiter::new(window);
        self
    }

    /// Evaluate every registered rule plus the synthetic per-mount/
    /// per-process rules against one sample. Violations are returned in
    /// rule-registration order followed by synthetic violations.
    pub fn evaluate(&mut self, sample: &MetricSample) -> Vec<RuleViolation> {
        let now = sample.timestamp;
        let mut violations = Vec::new();

        for rule in self.rules.clone() {
            let Some(value) = get_value(sample, rule.metric_path()) else {
                continue;
            };

            match &rule {
                Rule::Threshold(t) => {
                    if t.op.compare(value, t.value) {
                        violations.push(RuleViolation {
                            metric_path: t.metric_path.clone(),
                            current_value: value,
                            threshold: t.value,
                            severity: t.severity,
                            message: t.message.clone(),
                            timestamp: now,
                            source_detail: None,
                        });
                    }
                }
                Rule::Sustained(s) => {
                    let violating = s.op.compare(value, s.value);
                    let fired =
                        self.sustained
                            .observe(&s.metric_path, s.value, s.duration, violating, now);
                    if fired {
                        violations.push(RuleViolation {
                            metric_path: s.metric_path.clone(),
                            current_value: value,
                            threshold: s.value,
                            severity: s.severity,
                            message: s.message.clone(),
                            timestamp: now,
                            source_detail: None,
                        });
                    }
                }
                Rule::Rate(r) => {
                    let window = self
                        .rate_windows
                        .entry(r.metric_path.clone())
                        .or_insert_with(RateWindow::new);
                    window.observe(now, value);
                    if let Some(rate) = window.rate_per_hour() {
                        if r.op.compare(rate, r.rate_per_hour) {
                            violations.push(RuleViolation {
                                metric_path: r.metric_path.clone(),
                                current_value: rate,
                                threshold: r.rate_per_hour,
                                severity: r.severity,
                                message: r.message.clone(),
                                timestamp: now,
                                source_detail: None,
                            });
                        }
                    }
                }
            }
        }

        if let Some(cfg) = &self.mount_alert {
            for mount in &sample.disk.mounts {
                if mount.is_pseudo() {
                    continue;
                }
                if Op::Gt.compare(mount.used_percent, cfg.used_percent) {
                    violations.push(RuleViolation {
                        metric_path: "disk.mount.usedPercent".to_string(),
                        current_value: mount.used_percent,
                        threshold: cfg.used_percent,
                        severity: cfg.severity,
                        message: cfg.message.clone(),
                        timestamp: now,
                        source_detail: Some(mount.mount_point.clone()),
                    });
                }
            }
        }

        if let Some(cfg) = &self.process_alert {
            for proc in sample.processes.top_cpu.iter().chain(&sample.processes.top_mem) {
                let exceeds_cpu = cfg
                    .cpu_percent
                    .is_some_and(|t| Op::Gt.compare(proc.cpu_percent, t));
                let exceeds_mem = cfg
                    .mem_percent
                    .is_some_and(|t| Op::Gt.compare(proc.mem_percent, t));
                if !exceeds_cpu && !exceeds_mem {
                    continue;
                }
                if !self.process_limiter.allow(&proc.name, proc.pid, now) {
                    continue;
                }
                violations.push(RuleViolation {
                    metric_path: if exceeds_cpu {
                        "processes.topCpu".to_string()
                    } else {
                        "processes.topMem".to_string()
                    },
                    current_value: if exceeds_cpu {
                        proc.cpu_percent
                    } else {
                        proc.mem_percent
                    },
                    threshold: if exceeds_cpu {
                        cfg.cpu_percent.unwrap_or(0.0)
                    } else {
                        cfg.mem_percent.unwrap_or(0.0)
                    },
                    severity: cfg.severity,
                    message: format!("process {} ({}) exceeds threshold", proc.name, proc.pid),
                    timestamp: now,
                    source_detail: Some(format!("{}:{}", proc.name, proc.pid)),
                });
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Rule, Severity, ThresholdRule};
    use warden_collector::{
        CpuMetrics, DiskMetrics, FileDescriptorMetrics, MemoryMetrics, NetworkMetrics,
        ProcessMetrics,
    };

    fn base_sample(cpu_usage: f64, disk_total_used: f64, timestamp: chrono::DateTime<Utc>) -> MetricSample {
        MetricSample {
            timestamp,
            cpu: CpuMetrics {
                usage: cpu_usage,
                load1: 0.0,
                load5: 0.0,
                load15: 0.0,
                temp_c: None,
                iowait: None,
            },
            memory: MemoryMetrics {
                used_pct: 0.0,
                swap_pct: 0.0,
                available_pct: 100.0,
            },
            disk: DiskMetrics {
                mounts: vec![warden_collector::MountMetrics {
                    mount_point: "/".into(),
                    fs_type: "ext4".into(),
                    used_percent: disk_total_used,
                    io_read_rate: 0.0,
                    io_write_rate: 0.0,
                }],
                io_read_rate: 0.0,
                io_write_rate: 0.0,
            },
            network: NetworkMetrics {
                rx_rate: 0.0,
                tx_rate: 0.0,
                error_rate: 0.0,
            },
            processes: ProcessMetrics {
                running: 0,
                sleeping: 0,
                blocked: 0,
                zombie: 0,
                total: 0,
                top_cpu: vec![],
                top_mem: vec![],
            },
            file_descriptors: None,
        }
        .tap_disk_total(disk_total_used)
    }

    trait TapDiskTotal {
        fn tap_disk_total(self, _v: f64) -> Self;
    }
    impl TapDiskTotal for MetricSample {
        fn tap_disk_total(self, _v: f64) -> Self {
            self
        }
    }

    #[test]
    fn s1_cpu_sustained_scenario() {
        // S1: cpu.usage=95 for 13 samples at 5s; threshold(critical,90) fires
        // at t=0, sustained(90, 60000ms) fires once at t>=60s.
        let rules = vec![
            Rule::Threshold(ThresholdRule {
                metric_path: "cpu.usage".into(),
                op: Op::Gt,
                value: 90.0,
                severity: Severity::Critical,
                message: "cpu critical".into(),
            }),
            Rule::Sustained(crate::rule::SustainedRule {
                metric_path: "cpu.usage".into(),
                op: Op::Gt,
                value: 90.0,
                duration: Duration::from_secs(60),
                severity: Severity::Warning,
                message: "cpu sustained".into(),
            }),
        ];
        let mut engine = RuleEngine::new(rules);
        let t0 = Utc::now();

        let mut threshold_fires = 0;
        let mut sustained_fires = 0;
        for i in 0..13 {
            let now = t0 + chrono::Duration::seconds(i * 5);
            let sample = base_sample(95.0, 10.0, now);
            for v in engine.evaluate(&sample) {
                if v.message == "cpu critical" {
                    threshold_fires += 1;
                }
                if v.message == "cpu sustained" {
                    sustained_fires += 1;
                }
            }
        }

        assert_eq!(threshold_fires, 13, "threshold rule fires on every violating sample; cooldown/dedup is the alert manager's job");
        assert_eq!(sustained_fires, 1, "sustained rule fires exactly once for the continuous window");
    }

    #[test]
    fn s2_rate_scenario() {
        let rules = vec![Rule::Rate(crate::rule::RateRule {
            metric_path: "disk.totalUsed".into(),
            op: Op::Gt,
            rate_per_hour: 1_000_000_000.0,
            severity: Severity::Warning,
            message: "disk growth".into(),
        })];
        let mut engine = RuleEngine::new(rules);
        let t0 = Utc::now();

        let s0 = base_sample(0.0, 0.0, t0);
        assert!(engine.evaluate(&s0).is_empty());

        let t1 = t0 + chrono::Duration::milliseconds(3_600_000);
        let s1 = base_sample(0.0, 2_000_000_000.0, t1);
        let violations = engine.evaluate(&s1);
        assert_eq!(violations.len(), 1);
        assert!((violations[0].current_value - 2_000_000_000.0).abs() < 1.0);
    }

    #[test]
    fn unknown_metric_path_is_skipped() {
        let rules = vec![Rule::Threshold(ThresholdRule {
            metric_path: "bogus.path".into(),
            op: Op::Gt,
            value: 1.0,
            severity: Severity::Info,
            message: "never".into(),
        })];
        let mut engine = RuleEngine::new(rules);
        let sample = base_sample(1.0, 1.0, Utc::now());
        assert!(engine.evaluate(&sample).is_empty());
    }

    #[test]
    fn mount_alert_excludes_pseudo_filesystems() {
        let mut engine = RuleEngine::new(vec![]).with_mount_alert(MountAlertConfig {
            used_percent: 80.0,
            severity: Severity::Warning,
            message: "mount nearly full".into(),
        });
        let mut sample = base_sample(0.0, 0.0, Utc::now());
        sample.disk.mounts.push(warden_collector::MountMetrics {
            mount_point: "/dev/shm".into(),
            fs_type: "tmpfs".into(),
            used_percent: 99.0,
            io_read_rate: 0.0,
            io_write_rate: 0.0,
        });
        sample.disk.mounts[0].used_percent = 85.0;
        let violations = engine.evaluate(&sample);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].source_detail.as_deref(), Some("/"));
    }
}
