use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Rate-limits synthetic per-process violations to at most one per
/// `(processName, pid)` within `window` (default 5 minutes).
/// Exposed as a config knob rather than hardcoded.
#[derive(Debug)]
pub struct ProcessAlertLimiter {
    window: Duration,
    last_fired: HashMap<(String, u32), DateTime<Utc>>,
}

impl ProcessAlertLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    pub fn default_window() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }

    /// Returns `true` if a violation for this process may be emitted now.
    pub fn allow(&mut self, process_name: &str, pid: u32, now: DateTime<Utc>) -> bool {
        let key = (process_name.to_string(), pid);
        let threshold = chrono::Duration::milliseconds(self.window.as_millis() as i64);
        match self.last_fired.get(&key) {
            Some(last) if now - *last < threshold => false,
            _ => {
                self.last_fired.insert(key, now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn suppresses_repeat_within_window() {
        let mut limiter = ProcessAlertLimiter::new(Duration::from_secs(300));
        let t0 = Utc::now();
        assert!(limiter.allow("stress", 1234, t0));
        assert!(!limiter.allow("stress", 1234, t0 + ChronoDuration::seconds(60)));
        assert!(limiter.allow("stress", 1234, t0 + ChronoDuration::seconds(301)));
    }

    #[test]
    fn distinct_pids_are_independent() {
        let mut limiter = ProcessAlertLimiter::new(Duration::from_secs(300));
        let t0 = Utc::now();
        assert!(limiter.allow("stress", 1, t0));
        assert!(limiter.allow("stress", 2, t0));
    }
}
