//! Warden's metrics collector: produces [`MetricSample`]s on a fixed
//! interval, with two interchangeable driver variants.

mod error;
mod intrinsic;
mod netdata;
mod sample;

pub use error::CollectorError;
pub use intrinsic::IntrinsicCollector;
pub use netdata::{AlertFeedEvent, FeedSeverity, MonitorSeverity, NetdataFeedCollector, NetdataFeedConfig};
pub use sample::{
    get_value, CpuMetrics, DiskMetrics, FileDescriptorMetrics, MemoryMetrics, MetricSample,
    MountMetrics, NetworkMetrics, ProcessInfo, ProcessMetrics,
};

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Implemented by every intrinsic (direct-OS-call) sampling driver.
pub trait Collector: Send {
    fn sample(&mut self) -> Result<MetricSample, CollectorError>;
}

/// Events surfaced alongside the sample stream for observability.
#[derive(Debug, Clone)]
pub enum CollectorEvent {
    Sampled,
    SampleFailed(String),
    TickSkipped,
}

/// Drives a [`Collector`] on a fixed interval and publishes samples over a
/// bounded channel of capacity 1. Backpressure policy: never
/// drop the oldest unconsumed sample to make room for a new one — instead
/// skip the tick that couldn't be delivered.
pub struct CollectorHandle {
    pub samples: mpsc::Receiver<MetricSample>,
    pub events: broadcast::Receiver<CollectorEvent>,
}

pub fn spawn_collector<C: Collector + 'static>(
    mut collector: C,
    interval: Duration,
) -> (CollectorHandle, tokio::task::JoinHandle<()>) {
    let (sample_tx, sample_rx) = mpsc::channel(1);
    let (event_tx, event_rx) = broadcast::channel(64);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match collector.sample() {
                Ok(s) => match sample_tx.try_send(s) {
                    Ok(()) => {
                        let _ = event_tx.send(CollectorEvent::Sampled);
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        let _ = event_tx.send(CollectorEvent::TickSkipped);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "metric sampling failed, skipping tick");
                    let _ = event_tx.send(CollectorEvent::SampleFailed(e.to_string()));
                }
            }
        }
    });

    (
        CollectorHandle {
            samples: sample_rx,
            events: event_rx,
        },
        handle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingCollector {
        calls: Arc<AtomicU32>,
    }

    impl Collector for CountingCollector {
        fn sample(&mut self) -> Result<MetricSample, CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MetricSample {
                timestamp: chrono::Utc::now(),
                cpu: CpuMetrics {
                    usage: 1.0,
                    load1: 0.0,
                    load5: 0.0,
                    load15: 0.0,
                    temp_c: None,
                    iowait: None,
                },
                memory: MemoryMetrics {
                    used_pct: 1.0,
                    swap_pct: 0.0,
                    available_pct: 99.0,
                },
                disk: DiskMetrics {
                    mounts: vec![],
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
            })
        }
    }

    #[tokio::test]
    async fn emits_samples_on_interval() {
        let calls = Arc::new(AtomicU32::new(0));
        let (mut handle, task) = spawn_collector(
            CountingCollector {
                calls: calls.clone(),
            },
            Duration::from_millis(5),
        );

        let first = handle.samples.recv().await;
        assert!(first.is_some());
        task.abort();
    }
}
