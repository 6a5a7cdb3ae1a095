//! Voice activity detection over inbound RTP audio-level samples (§4.8).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    pub sample_size: usize,
    pub activation_threshold: f64,
    pub deactivation_threshold: f64,
    pub activation_duration: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_size: 50,
            activation_threshold: 10.0,
            deactivation_threshold: 4.0,
            activation_duration: Duration::from_secs(2),
        }
    }
}

/// Hysteresis voice-activity detector. Feed it RTP audio-level header
/// extension values (0-127); it calls `on_change(active)` on each ON/OFF
/// transition.
pub struct VoiceActivityDetector {
    cfg: VadConfig,
    samples: VecDeque<u8>,
    active: bool,
    last_activation_at: Option<Instant>,
    on_change: Box<dyn FnMut(bool) + Send>,
}

impl VoiceActivityDetector {
    pub fn new(cfg: VadConfig, on_change: Box<dyn FnMut(bool) + Send>) -> Self {
        Self {
            cfg,
            samples: VecDeque::with_capacity(cfg.sample_size),
            active: false,
            last_activation_at: None,
            on_change,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Push one audio-level sample (0-127). Recomputes the rolling
    /// population standard deviation once the buffer is full and evaluates
    /// the ON/OFF hysteresis rule.
    pub fn push_sample(&mut self, level: u8) {
        if self.samples.len() == self.cfg.sample_size {
            self.samples.pop_front();
        }
        self.samples.push_back(level);
        if self.samples.len() < self.cfg.sample_size {
            return;
        }

        let (avg, stddev) = Self::stats(&self.samples);
        tracing::trace!(avg, stddev, "vad sample window");

        if !self.active && stddev > self.cfg.activation_threshold {
            self.active = true;
            self.last_activation_at = Some(Instant::now());
            (self.on_change)(true);
        } else if self.active && stddev < self.cfg.deactivation_threshold {
            let elapsed_since_activation = self
                .last_activation_at
                .map(|t| t.elapsed())
                .unwrap_or(Duration::MAX);
            if elapsed_since_activation > self.cfg.activation_duration {
                self.active = false;
                (self.on_change)(false);
            }
        }
    }

    /// Empties the sample buffer and fires a trailing OFF event (used when
    /// a session mutes its outbound voice track).
    pub fn reset(&mut self) {
        self.samples.clear();
        self.active = false;
        self.last_activation_at = None;
        (self.on_change)(false);
    }

    fn stats(samples: &VecDeque<u8>) -> (f64, f64) {
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().map(|&s| s as f64).sum();
        let avg = sum / n;
        let variance = samples.iter().map(|&s| (s as f64 - avg).powi(2)).sum::<f64>() / n;
        (avg, variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn detector(cfg: VadConfig) -> (VoiceActivityDetector, Arc<Mutex<Vec<bool>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let vad = VoiceActivityDetector::new(
            cfg,
            Box::new(move |active| events_clone.lock().unwrap().push(active)),
        );
        (vad, events)
    }

    #[test]
    fn no_transition_before_buffer_is_full() {
        let (mut vad, events) = detector(VadConfig {
            sample_size: 10,
            ..Default::default()
        });
        for _ in 0..9 {
            vad.push_sample(100);
        }
        assert!(events.lock().unwrap().is_empty());
        assert!(!vad.is_active());
    }

    #[test]
    fn activates_on_high_variance() {
        let (mut vad, events) = detector(VadConfig {
            sample_size: 10,
            activation_threshold: 5.0,
            ..Default::default()
        });
        // Alternating 0/120 has high population stddev.
        for i in 0..10 {
            vad.push_sample(if i % 2 == 0 { 0 } else { 120 });
        }
        assert!(vad.is_active());
        assert_eq!(events.lock().unwrap().as_slice(), &[true]);
    }

    #[test]
    fn stays_active_until_deactivation_duration_elapses() {
        let (mut vad, events) = detector(VadConfig {
            sample_size: 10,
            activation_threshold: 5.0,
            deactivation_threshold: 1.0,
            activation_duration: Duration::from_millis(50),
        });
        for i in 0..10 {
            vad.push_sample(if i % 2 == 0 { 0 } else { 120 });
        }
        assert!(vad.is_active());

        // Flat/silent samples: stddev drops below deactivation threshold
        // immediately, but activation_duration has not elapsed yet.
        for _ in 0..10 {
            vad.push_sample(0);
        }
        assert!(vad.is_active(), "should not deactivate before the hold duration");

        std::thread::sleep(Duration::from_millis(60));
        vad.push_sample(0);
        assert!(!vad.is_active());
        assert_eq!(events.lock().unwrap().as_slice(), &[true, false]);
    }

    #[test]
    fn reset_fires_trailing_off() {
        let (mut vad, events) = detector(VadConfig {
            sample_size: 4,
            activation_threshold: 1.0,
            ..Default::default()
        });
        for i in 0..4 {
            vad.push_sample(if i % 2 == 0 { 0 } else { 120 });
        }
        assert!(vad.is_active());
        vad.reset();
        assert!(!vad.is_active());
        assert_eq!(events.lock().unwrap().last(), Some(&false));
    }
}
