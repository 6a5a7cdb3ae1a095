//! Send-side bandwidth estimator (§4.9's input), built on the receiver
//! reports and TWCC feedback the vendored interceptor stack actually
//! produces (`report::receiver`, `twcc::receiver`) — there is no GCC
//! interceptor in this webrtc-rs version, so this is a direct,
//! from-scratch reimplementation of the loss-based/delay-based split
//! the simulcast controller expects from `bwEstimator`, not a wrapper
//! around one.
//!
//! Loss-based and delay-based estimates are kept independently and the
//! controller reads whichever is lower, matching the send-side GCC
//! convention of "the more conservative signal wins".

use std::time::Instant;

const MIN_BITRATE: f64 = 50_000.0;
const MAX_BITRATE: f64 = 8_000_000.0;
const INITIAL_BITRATE: f64 = 1_000_000.0;

/// Snapshot handed to the simulcast controller on each BWE event
/// (§4.9 step 1).
#[derive(Debug, Clone, Copy)]
pub struct BweStats {
    pub loss_target_bitrate: f64,
    pub delay_target_bitrate: f64,
    pub average_loss: f64,
}

impl BweStats {
    /// The conservative combined estimate a caller not splitting the two
    /// signals apart would want (§4.9 step 4 uses the components directly,
    /// but several edge cases just want "the" target bitrate).
    pub fn target_bitrate(&self) -> f64 {
        self.loss_target_bitrate.min(self.delay_target_bitrate)
    }
}

/// Tracks loss fraction from RTCP receiver reports and one-way delay
/// trend from TWCC feedback, producing the two independent target
/// bitrates `BweStats` carries. One instance per outbound sender.
pub struct BweEstimator {
    loss_bitrate: f64,
    delay_bitrate: f64,
    average_loss: f64,
    last_delay_trend: Option<f64>,
    last_update: Option<Instant>,
}

impl BweEstimator {
    pub fn new() -> Self {
        Self {
            loss_bitrate: INITIAL_BITRATE,
            delay_bitrate: INITIAL_BITRATE,
            average_loss: 0.0,
            last_delay_trend: None,
            last_update: None,
        }
    }

    /// Folds in a receiver report's fraction-lost field (0.0-1.0), the
    /// classic AIMD loss-based rule: back off hard above 10% loss, ease
    /// up gently below 2%, hold in between.
    pub fn on_loss_fraction(&mut self, fraction_lost: f64) {
        self.average_loss = self.average_loss * 0.8 + fraction_lost * 0.2;
        self.loss_bitrate = if self.average_loss > 0.1 {
            self.loss_bitrate * (1.0 - 0.5 * self.average_loss)
        } else if self.average_loss < 0.02 {
            self.loss_bitrate * 1.05
        } else {
            self.loss_bitrate
        }
        .clamp(MIN_BITRATE, MAX_BITRATE);
        self.last_update = Some(Instant::now());
    }

    /// Folds in a TWCC-derived one-way delay trend: positive means
    /// queueing delay is growing (congestion building), negative means
    /// it's draining. `delay_trend_ms` is the smoothed derivative the
    /// caller computes from packet arrival deltas.
    pub fn on_delay_trend(&mut self, delay_trend_ms: f64) {
        if let Some(last) = self.last_delay_trend {
            let delta = delay_trend_ms - last;
            if delta > 0.0 {
                self.delay_bitrate = (self.delay_bitrate * 0.85).max(MIN_BITRATE);
            } else if delta < 0.0 {
                self.delay_bitrate = (self.delay_bitrate * 1.03).min(MAX_BITRATE);
            }
        }
        self.last_delay_trend = Some(delay_trend_ms);
        self.last_update = Some(Instant::now());
    }

    pub fn stats(&self) -> BweStats {
        BweStats {
            loss_target_bitrate: self.loss_bitrate,
            delay_target_bitrate: self.delay_bitrate,
            average_loss: self.average_loss,
        }
    }

    /// Directly raises the target bitrate to `bitrate` (§4.9 step 8:
    /// "update BWE target bitrate to the new source rate on upgrades").
    /// Only ever called to raise, never to lower — downgrades come from
    /// the ordinary loss/delay folding above.
    pub fn set_target_bitrate(&mut self, bitrate: f64) {
        let bitrate = bitrate.clamp(MIN_BITRATE, MAX_BITRATE);
        self.loss_bitrate = self.loss_bitrate.max(bitrate);
        self.delay_bitrate = self.delay_bitrate.max(bitrate);
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }
}

impl Default for BweEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_loss_backs_off() {
        let mut bwe = BweEstimator::new();
        let before = bwe.stats().loss_target_bitrate;
        for _ in 0..10 {
            bwe.on_loss_fraction(0.3);
        }
        assert!(bwe.stats().loss_target_bitrate < before);
    }

    #[test]
    fn low_loss_eases_up() {
        let mut bwe = BweEstimator::new();
        let before = bwe.stats().loss_target_bitrate;
        for _ in 0..10 {
            bwe.on_loss_fraction(0.0);
        }
        assert!(bwe.stats().loss_target_bitrate > before);
    }

    #[test]
    fn growing_delay_trend_backs_off_delay_bitrate() {
        let mut bwe = BweEstimator::new();
        let before = bwe.stats().delay_target_bitrate;
        bwe.on_delay_trend(0.0);
        bwe.on_delay_trend(10.0);
        bwe.on_delay_trend(25.0);
        assert!(bwe.stats().delay_target_bitrate < before);
    }

    #[test]
    fn set_target_bitrate_only_raises() {
        let mut bwe = BweEstimator::new();
        bwe.on_loss_fraction(0.3);
        bwe.on_loss_fraction(0.3);
        let lowered = bwe.stats().loss_target_bitrate;
        bwe.set_target_bitrate(lowered / 2.0);
        assert_eq!(bwe.stats().loss_target_bitrate, lowered);
        bwe.set_target_bitrate(lowered * 2.0);
        assert_eq!(bwe.stats().loss_target_bitrate, lowered * 2.0);
    }

    #[test]
    fn bitrate_stays_within_bounds() {
        let mut bwe = BweEstimator::new();
        for _ in 0..200 {
            bwe.on_loss_fraction(0.9);
        }
        assert!(bwe.stats().loss_target_bitrate >= MIN_BITRATE);
        for _ in 0..500 {
            bwe.on_loss_fraction(0.0);
        }
        assert!(bwe.stats().loss_target_bitrate <= MAX_BITRATE);
    }
}
