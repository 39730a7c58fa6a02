//! Direct-OS-call collector variant (the intrinsic variant).

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use sysinfo::{Disks, Networks, System};

use crate::error::CollectorError;
use crate::sample::{
    CpuMetrics, DiskMetrics, FileDescriptorMetrics, MemoryMetrics, MetricSample, MountMetrics,
    NetworkMetrics, ProcessInfo, ProcessMetrics,
};
use crate::Collector;

#[derive(Debug, Clone, Copy)]
struct Counter {
    bytes: u64,
    at: Instant,
}

/// Samples the local host via `sysinfo`. Keeps the previous byte counters
/// needed to derive network/disk rates; the first sample after construction
/// always reports zero rates.
pub struct IntrinsicCollector {
    system: System,
    prev_rx: HashMap<String, Counter>,
    prev_tx: HashMap<String, Counter>,
    prev_disk_read: Option<Counter>,
    prev_disk_write: Option<Counter>,
    top_n: usize,
}

impl IntrinsicCollector {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system,
            prev_rx: HashMap::new(),
            prev_tx: HashMap::new(),
            prev_disk_read: None,
            prev_disk_write: None,
            top_n: 5,
        }
    }

    fn rate(prev: &mut HashMap<String, Counter>, key: &str, bytes: u64, now: Instant) -> f64 {
        let rate = match prev.get(key) {
            Some(c) => {
                let elapsed = now.duration_since(c.at).as_secs_f64();
                if elapsed > 0.0 && bytes >= c.bytes {
                    (bytes - c.bytes) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        prev.insert(key.to_string(), Counter { bytes, at: now });
        rate
    }
}

impl Default for IntrinsicCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for IntrinsicCollector {
    fn sample(&mut self) -> Result<MetricSample, CollectorError> {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

        let now = Instant::now();

        let cpu_usage = self.system.global_cpu_usage() as f64;
        let load = System::load_average();

        let total_mem = self.system.total_memory().max(1) as f64;
        let used_mem = self.system.used_memory() as f64;
        let total_swap = self.system.total_swap().max(1) as f64;
        let used_swap = self.system.used_swap() as f64;

        let memory = MemoryMetrics {
            used_pct: used_mem / total_mem * 100.0,
            swap_pct: used_swap / total_swap * 100.0,
            available_pct: (total_mem - used_mem) / total_mem * 100.0,
        };

        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<MountMetrics> = disks
            .list()
            .iter()
            .map(|d| {
                let total = d.total_space().max(1) as f64;
                let avail = d.available_space() as f64;
                let used_percent = (total - avail) / total * 100.0;
                MountMetrics {
                    mount_point: d.mount_point().to_string_lossy().to_string(),
                    fs_type: d.file_system().to_string_lossy().to_string(),
                    used_percent,
                    io_read_rate: 0.0,
                    io_write_rate: 0.0,
                }
            })
            .collect();

        let (disk_read_bytes, disk_write_bytes) = self
            .system
            .processes()
            .values()
            .map(|p| {
                let du = p.disk_usage();
                (du.read_bytes, du.written_bytes)
            })
            .fold((0u64, 0u64), |(r, w), (pr, pw)| (r + pr, w + pw));

        let io_read_rate = match self.prev_disk_read {
            Some(c) => {
                let elapsed = now.duration_since(c.at).as_secs_f64();
                if elapsed > 0.0 && disk_read_bytes >= c.bytes {
                    (disk_read_bytes - c.bytes) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.prev_disk_read = Some(Counter {
            bytes: disk_read_bytes,
            at: now,
        });

        let io_write_rate = match self.prev_disk_write {
            Some(c) => {
                let elapsed = now.duration_since(c.at).as_secs_f64();
                if elapsed > 0.0 && disk_write_bytes >= c.bytes {
                    (disk_write_bytes - c.bytes) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.prev_disk_write = Some(Counter {
            bytes: disk_write_bytes,
            at: now,
        });

        let networks = Networks::new_with_refreshed_list();
        let mut rx_total = 0.0;
        let mut tx_total = 0.0;
        for (name, data) in networks.iter() {
            rx_total += Self::rate(&mut self.prev_rx, name, data.total_received(), now);
            tx_total += Self::rate(&mut self.prev_tx, name, data.total_transmitted(), now);
        }

        let mut procs: Vec<&sysinfo::Process> = self.system.processes().values().collect();
        procs.sort_by(|a, b| b.cpu_usage().partial_cmp(&a.cpu_usage()).unwrap());
        let top_cpu: Vec<ProcessInfo> = procs
            .iter()
            .take(self.top_n)
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().to_string(),
                cpu_percent: p.cpu_usage() as f64,
                mem_percent: p.memory() as f64 / total_mem * 100.0,
            })
            .collect();

        procs.sort_by(|a, b| b.memory().cmp(&a.memory()));
        let top_mem: Vec<ProcessInfo> = procs
            .iter()
            .take(self.top_n)
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().to_string(),
                cpu_percent: p.cpu_usage() as f64,
                mem_percent: p.memory() as f64 / total_mem * 100.0,
            })
            .collect();

        let mut running = 0u32;
        let mut sleeping = 0u32;
        for p in self.system.processes().values() {
            match p.status() {
                sysinfo::ProcessStatus::Run => running += 1,
                sysinfo::ProcessStatus::Sleep => sleeping += 1,
                _ => {}
            }
        }
        let total = self.system.processes().len() as u32;

        Ok(MetricSample {
            timestamp: Utc::now(),
            cpu: CpuMetrics {
                usage: cpu_usage,
                load1: load.one,
                load5: load.five,
                load15: load.fifteen,
                temp_c: None,
                iowait: None,
            },
            memory,
            disk: DiskMetrics {
                mounts,
                io_read_rate,
                io_write_rate,
            },
            network: NetworkMetrics {
                rx_rate: rx_total,
                tx_rate: tx_total,
                error_rate: 0.0,
            },
            processes: ProcessMetrics {
                running,
                sleeping,
                blocked: 0,
                zombie: 0,
                total,
                top_cpu,
                top_mem,
            },
            file_descriptors: None,
        })
    }
}
