//! Simulcast controller (C9), §4.9: switches a subscriber between a
//! screen-sharer's `h`/`l` video layers in response to that subscriber's
//! own bandwidth estimate.
//!
//! Because outbound tracks are shared `TrackLocalStaticRTP`s bound to
//! many peer connections at once (§9, track_forwarding.rs), the level
//! decision stays per-subscriber: each session independently chooses
//! which RID's already-running forwarder to bind to its own peer
//! connection, so two subscribers of the same screen share can sit at
//! different layers simultaneously.

use std::sync::Arc;
use std::time::Instant;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;

use super::bwe::BweStats;
use super::registry::Call;
use super::session::{Session, TrackAction};

const HIGH_RID: &str = "h";
const LOW_RID: &str = "l";
const LEVEL_TOLERANCE: f64 = 0.9;
const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Rate-limited to at most one decision per second with burst 4 (§4.9).
pub struct SimulcastController {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl SimulcastController {
    pub fn new() -> Self {
        let quota = Quota::per_second(nonzero!(1u32)).allow_burst(nonzero!(4u32));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Runs the §4.9 decision for one subscriber on a BWE target-bitrate
    /// change event. `prev`/`stats` are the subscriber's own BWE snapshot
    /// before and after the event that triggered this call.
    pub async fn on_bwe_event(
        &self,
        subscriber: &Arc<Session>,
        call: &Call,
        prev: BweStats,
        stats: BweStats,
    ) {
        if self.limiter.check().is_err() {
            return;
        }

        // step 2: bandwidth-drop detection, logged for the loss-based
        // stability check in step 7 but otherwise advisory — the actual
        // decision is driven by the level comparison below.
        let delta_delay = stats.delay_target_bitrate - prev.delay_target_bitrate;
        let delta_loss = stats.loss_target_bitrate - prev.loss_target_bitrate;
        let _is_drop = delta_delay.max(delta_loss) < 0.0;

        // step 3: not watching a simulcast screen video track
        let Some(current_rid) = subscriber.current_screen_rid.read().await.clone() else {
            return;
        };

        let Some(screen_session_id) = call.screen_session_id.read().await.clone() else {
            return;
        };
        let Some(publisher) = call.get_session(&screen_session_id).await else {
            return;
        };

        // step 4: source rate for the high layer, used as the comparison
        // baseline regardless of which layer is currently served.
        let high_source_rate = {
            let tracks = publisher.remote_screen_tracks.read().await;
            tracks.get(HIGH_RID).map(|t| t.rate_monitor.get_rate())
        };
        let Some(high_source_rate) = high_source_rate.filter(|r| *r >= 0).map(|r| r as f64) else {
            return;
        };

        let down_rate = stats.target_bitrate();

        // step 5
        let desired = desired_level(down_rate, high_source_rate);

        // step 6
        if desired == current_rid {
            return;
        }

        // step 7: stability guard against flapping off "h" on a noisy dip
        if current_rid == HIGH_RID && stats.loss_target_bitrate > LEVEL_TOLERANCE * high_source_rate {
            return;
        }

        // backoff gate (step 9's other half): separate from the rate
        // limiter above, this is the per-session hysteresis timer.
        {
            let last = *subscriber.last_level_change_at.lock().await;
            if let Some(at) = last {
                let backoff = *subscriber.screen_backoff.lock().await;
                if at.elapsed() < backoff {
                    return;
                }
            }
        }

        // step 8
        let (new_track, old_track_id) = {
            let outbound = publisher.outbound.read().await;
            (
                outbound.screen_by_rid.get(desired).cloned(),
                outbound.screen_by_rid.get(current_rid.as_str()).map(|t| t.id().to_string()),
            )
        };
        let Some(new_track) = new_track else {
            return;
        };

        if let Some(old_track_id) = old_track_id {
            if !subscriber.push_track_action(TrackAction::Remove { track_id: old_track_id }) {
                tracing::warn!(session_id = %subscriber.session_id, "tracksCh full, dropping trackActionRemove");
            }
        }
        if !subscriber.push_track_action(TrackAction::Add {
            track: new_track,
            publisher_id: publisher.user_id.clone(),
        }) {
            tracing::warn!(session_id = %subscriber.session_id, "tracksCh full, dropping trackActionAdd");
        }

        if desired == HIGH_RID && current_rid == LOW_RID {
            subscriber.bwe.lock().await.set_target_bitrate(high_source_rate);
        }

        *subscriber.current_screen_rid.write().await = Some(desired.to_string());

        // step 9
        *subscriber.last_level_change_at.lock().await = Some(Instant::now());
        let mut backoff = subscriber.screen_backoff.lock().await;
        *backoff = backoff.mul_f64(BACKOFF_MULTIPLIER);
    }
}

impl Default for SimulcastController {
    fn default() -> Self {
        Self::new()
    }
}

/// §4.9 step 5: `downRate` must clear 90% of the high layer's measured
/// source rate to select `"h"`.
fn desired_level(down_rate: f64, high_source_rate: f64) -> &'static str {
    if down_rate > LEVEL_TOLERANCE * high_source_rate {
        HIGH_RID
    } else {
        LOW_RID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfu::session::Session;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    #[test]
    fn selects_high_only_above_tolerance() {
        assert_eq!(desired_level(1_000_000.0, 1_000_000.0), HIGH_RID);
        assert_eq!(desired_level(901_000.0, 1_000_000.0), HIGH_RID);
        assert_eq!(desired_level(899_000.0, 1_000_000.0), LOW_RID);
        assert_eq!(desired_level(0.0, 1_000_000.0), LOW_RID);
    }

    #[tokio::test]
    async fn no_decision_without_a_current_rid() {
        let controller = SimulcastController::new();
        let call = Arc::new(Call::new_for_tests("c".into()));
        let api = APIBuilder::new().build();
        let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await.unwrap());
        let subscriber = Session::new("g".into(), "c".into(), "u1".into(), "s1".into(), pc);

        let stats = BweStats {
            loss_target_bitrate: 100_000.0,
            delay_target_bitrate: 100_000.0,
            average_loss: 0.0,
        };
        controller.on_bwe_event(&subscriber, &call, stats, stats).await;
        assert!(subscriber.current_screen_rid.read().await.is_none());
    }

    #[tokio::test]
    async fn decision_is_a_noop_without_a_registered_screen_sharer() {
        let controller = SimulcastController::new();
        let call = Arc::new(Call::new_for_tests("c".into()));
        let api = APIBuilder::new().build();
        let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await.unwrap());
        let subscriber = Session::new("g".into(), "c".into(), "u1".into(), "s1".into(), pc);
        *subscriber.current_screen_rid.write().await = Some(LOW_RID.to_string());

        let prev = BweStats { loss_target_bitrate: 100_000.0, delay_target_bitrate: 100_000.0, average_loss: 0.0 };
        let stats = BweStats { loss_target_bitrate: 2_000_000.0, delay_target_bitrate: 2_000_000.0, average_loss: 0.0 };

        // No screen_session_id set on the call, so step 3's lookup bails
        // out before anything is mutated.
        controller.on_bwe_event(&subscriber, &call, prev, stats).await;
        assert_eq!(*subscriber.current_screen_rid.read().await, Some(LOW_RID.to_string()));
    }
}
