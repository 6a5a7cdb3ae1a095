//! Rolling-window bitrate sampling (§4.8).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 2 second sampling window, used for the "high" simulcast rid.
pub const WINDOW_HIGH: Duration = Duration::from_secs(2);
/// 5 second sampling window, used for the "low" simulcast rid and for voice.
pub const WINDOW_LOW: Duration = Duration::from_secs(5);

/// Tracks `(timestamp, size_bytes)` samples and reports a rolling bits/sec
/// rate. Returns `-1` until the monitor has been observing for at least
/// `2 * window` (warm-up, §8).
pub struct RateMonitor {
    window: Duration,
    samples: VecDeque<(Instant, usize)>,
    first_sample_at: Option<Instant>,
}

impl RateMonitor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
            first_sample_at: None,
        }
    }

    /// O(1): push and trim stale samples older than `2 * window`.
    pub fn push_sample(&mut self, size_bytes: usize) {
        let now = Instant::now();
        if self.first_sample_at.is_none() {
            self.first_sample_at = Some(now);
        }
        self.samples.push_back((now, size_bytes));
        while let Some(&(ts, _)) = self.samples.front() {
            if now.duration_since(ts) > self.window * 2 {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Bits per second over the trailing window, or `-1` during warm-up.
    pub fn get_rate(&self) -> i64 {
        let Some(first_at) = self.first_sample_at else {
            return -1;
        };
        if first_at.elapsed() < self.window * 2 {
            return -1;
        }
        let Some(&(now, _)) = self.samples.back() else {
            return -1;
        };
        let mut bytes = 0usize;
        let mut oldest = now;
        for &(ts, size) in self.samples.iter().rev() {
            if now.duration_since(ts) > self.window {
                break;
            }
            bytes += size;
            oldest = ts;
        }
        let span = now.duration_since(oldest).as_secs_f64().max(1e-6);
        ((bytes as f64 * 8.0) / span) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn returns_negative_one_before_warmup() {
        let mut m = RateMonitor::new(Duration::from_millis(20));
        m.push_sample(100);
        assert_eq!(m.get_rate(), -1);
    }

    #[test]
    fn returns_non_negative_after_warmup() {
        let mut m = RateMonitor::new(Duration::from_millis(10));
        for _ in 0..5 {
            m.push_sample(1000);
            sleep(Duration::from_millis(5));
        }
        sleep(Duration::from_millis(20));
        m.push_sample(1000);
        assert!(m.get_rate() >= 0);
    }

    #[test]
    fn rate_is_monotone_bounded_by_sample_volume() {
        let mut m = RateMonitor::new(Duration::from_millis(30));
        for _ in 0..10 {
            m.push_sample(1460);
            sleep(Duration::from_millis(5));
        }
        sleep(Duration::from_millis(70));
        m.push_sample(1460);
        let rate = m.get_rate();
        assert!(rate >= 0);
        // Cannot exceed the bits carried across the whole observed history.
        let max_possible = (11 * 1460 * 8) as i64 * 1000 / 1;
        assert!(rate < max_possible);
    }
}
