use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SustainedKey {
    metric_path: String,
    value_bits: u64,
    duration_ms: u64,
}

#[derive(Debug, Clone, Copy)]
enum WindowState {
    Counting(DateTime<Utc>),
    Fired,
}

/// Per-sustained-rule violation-window tracker, keyed by
/// `(metricPath, value, duration)`
#[derive(Debug, Default)]
pub struct SustainedTracker {
    state: HashMap<SustainedKey, WindowState>,
}

impl SustainedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample's violating/non-violating verdict for a sustained
    /// rule. Returns `true` exactly once per continuous violating window,
    /// at the first sample where `now - start_time >= duration`; never
    /// re-fires until a non-violating sample resets the window.
    pub fn observe(
        &mut self,
        metric_path: &str,
        value: f64,
        duration: Duration,
        violating: bool,
        now: DateTime<Utc>,
    ) -> bool {
        let key = SustainedKey {
            metric_path: metric_path.to_string(),
            value_bits: value.to_bits(),
            duration_ms: duration.as_millis() as u64,
        };

        if !violating {
            self.state.remove(&key);
            return false;
        }

        match self.state.get(&key).copied() {
            None => {
                self.state.insert(key, WindowState::Counting(now));
                false
            }
            Some(WindowState::Fired) => false,
            Some(WindowState::Counting(start)) => {
                let elapsed = now - start;
                let threshold = chrono::Duration::milliseconds(duration.as_millis() as i64);
                if elapsed >= threshold {
                    self.state.insert(key, WindowState::Fired);
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn fires_once_after_duration_then_resets_on_clear() {
        let mut tracker = SustainedTracker::new();
        let t0 = Utc::now();
        let duration = Duration::from_secs(60);

        // 13 samples at 5s apart, all violating (S1 scenario shape).
        let mut fired_count = 0;
        for i in 0..13 {
            let now = t0 + ChronoDuration::seconds(i * 5);
            if tracker.observe("cpu.usage", 90.0, duration, true, now) {
                fired_count += 1;
            }
        }
        assert_eq!(
            fired_count, 1,
            "sustained rule must fire exactly once over a continuous window"
        );

        // clearing resets the window
        let cleared_at = t0 + ChronoDuration::seconds(65);
        assert!(!tracker.observe("cpu.usage", 90.0, duration, false, cleared_at));

        let restart = cleared_at + ChronoDuration::seconds(1);
        assert!(!tracker.observe("cpu.usage", 90.0, duration, true, restart));
    }

    #[test]
    fn never_fires_before_duration_elapses() {
        let mut tracker = SustainedTracker::new();
        let t0 = Utc::now();
        let duration = Duration::from_secs(60);

        for i in 0..5 {
            let now = t0 + ChronoDuration::seconds(i * 5);
            assert!(!tracker.observe("cpu.usage", 90.0, duration, true, now));
        }
    }
}
