//! Rolling-window rate computation for `rate` rules.
//!
//! Modeled on the rolling-window prune-then-divide shape used for failure
//! velocity tracking elsewhere in this codebase's lineage: record a
//! timestamped observation, prune anything older than the window, then
//! derive a rate from what's left.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;

const WINDOW: ChronoDuration = ChronoDuration::hours(1);

#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    samples: VecDeque<(DateTime<Utc>, f64)>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and prune anything outside the 1h window.
    pub fn observe(&mut self, at: DateTime<Utc>, value: f64) {
        self.samples.push_back((at, value));
        let cutoff = at - WINDOW;
        while let Some((t, _)) = self.samples.front() {
            if *t < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Rate per hour between the oldest and newest sample still in the
    /// window. `None` when fewer than two samples are in the window (spec
    /// testable property 9).
    pub fn rate_per_hour(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let (oldest_t, oldest_v) = *self.samples.front().unwrap();
        let (newest_t, newest_v) = *self.samples.back().unwrap();
        let hours = (newest_t - oldest_t).num_milliseconds() as f64 / 3_600_000.0;
        if hours <= 0.0 {
            return None;
        }
        Some((newest_v - oldest_v) / hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_has_no_rate() {
        let mut w = RateWindow::new();
        w.observe(Utc::now(), 0.0);
        assert_eq!(w.rate_per_hour(), None);
    }

    #[test]
    fn rate_over_one_hour() {
        let mut w = RateWindow::new();
        let t0 = Utc::now();
        w.observe(t0, 0.0);
        w.observe(t0 + ChronoDuration::milliseconds(3_600_000), 2_000_000_000.0);
        let rate = w.rate_per_hour().unwrap();
        assert!((rate - 2_000_000_000.0).abs() < 1.0);
    }

    #[test]
    fn samples_outside_window_are_pruned() {
        let mut w = RateWindow::new();
        let t0 = Utc::now();
        w.observe(t0, 0.0);
        w.observe(t0 + ChronoDuration::hours(2), 100.0);
        // the t0 sample should have been pruned; only one remains
        assert_eq!(w.rate_per_hour(), None);
    }
}
