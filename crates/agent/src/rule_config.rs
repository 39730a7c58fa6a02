//! Translates the YAML `rules` config section into the
//! `warden-rules` types the collector's rule engine evaluates.

use warden_rules::{MountAlertConfig, Op, ProcessAlertConfig, Rule, RuleEngine, Severity, ThresholdRule};

use crate::config::{RulesConfig, ThresholdPair};

fn push_pair(rules: &mut Vec<Rule>, metric_path: &str, pair: &ThresholdPair, label: &str) {
    rules.push(Rule::Threshold(ThresholdRule {
        metric_path: metric_path.to_string(),
        op: Op::Ge,
        value: pair.warning,
        severity: Severity::Warning,
        message: format!("{label} above warning threshold"),
    }));
    rules.push(Rule::Threshold(ThresholdRule {
        metric_path: metric_path.to_string(),
        op: Op::Ge,
        value: pair.critical,
        severity: Severity::Critical,
        message: format!("{label} above critical threshold"),
    }));
}

/// Builds the engine's static rule set from config. Metric-path choices for
/// each section (e.g. `disk` -> `disk.maxUsedPercent`, `network` ->
/// `network.errorRate`) are a design decision recorded in DESIGN.md; config
/// sections not present are simply omitted rather than defaulted, so an
/// operator who doesn't configure `network` gets no network rules at all.
pub fn build_rule_engine(config: &RulesConfig) -> RuleEngine {
    let mut rules = Vec::new();

    if let Some(cpu) = &config.cpu {
        push_pair(&mut rules, "cpu.usage", cpu, "cpu usage");
    }
    if let Some(memory) = &config.memory {
        push_pair(&mut rules, "memory.usedPct", memory, "memory usage");
    }
    if let Some(disk) = &config.disk {
        push_pair(&mut rules, "disk.maxUsedPercent", disk, "disk usage");
    }
    if let Some(network) = &config.network {
        push_pair(&mut rules, "network.errorRate", network, "network error rate");
    }
    if let Some(processes) = &config.processes {
        push_pair(&mut rules, "processes.total", processes, "process count");
    }
    if let Some(fds) = &config.file_descriptors {
        push_pair(&mut rules, "fileDescriptors.usedPct", fds, "file descriptor usage");
    }

    let mut engine = RuleEngine::new(rules);

    if let Some(disk) = &config.disk {
        engine = engine.with_mount_alert(MountAlertConfig {
            used_percent: disk.critical,
            severity: Severity::Critical,
            message: "mount exceeds disk usage threshold".to_string(),
        });
    }
    if let Some(processes) = &config.processes {
        engine = engine.with_process_alert(ProcessAlertConfig {
            cpu_percent: Some(processes.critical),
            mem_percent: Some(processes.critical),
            severity: Severity::Critical,
        });
    }

    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;

    #[test]
    fn cpu_section_yields_two_threshold_rules() {
        let config = RulesConfig {
            cpu: Some(ThresholdPair { warning: 70.0, critical: 90.0 }),
            ..Default::default()
        };
        let engine = build_rule_engine(&config);
        // Exercised indirectly via RuleEngine::evaluate in the pipeline
        // integration tests; here we only assert construction doesn't panic
        // and produces an engine usable by the pipeline.
        let _ = engine;
    }

    #[test]
    fn empty_config_yields_no_rules() {
        let config = RulesConfig::default();
        let _engine = build_rule_engine(&config);
    }
}
