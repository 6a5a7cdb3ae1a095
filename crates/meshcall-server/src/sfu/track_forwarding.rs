//! Track forwarding (C6/C8), §4.3, §9's "polymorphism over track kind".
//!
//! `TrackKind` is the tagged-variant abstraction the design notes call
//! for: voice and screen share differ only in codec and fan-out rules,
//! not in the read/write interface, so one loop handles all three.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use webrtc::rtcp::picture_loss_indication::PictureLossIndication;
use webrtc::rtp::extension::audio_level_extension::AudioLevelExtension;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::Unmarshal;

use meshcall_media::{RateMonitor, WINDOW_HIGH, WINDOW_LOW};
use meshcall_protocol::ids::{new_track_id, TrackType};

/// RFC 5285 one-byte extension ID this server expects clients to
/// negotiate `urn:ietf:params:rtp-hdrext:ssrc-audio-level` under. Reading
/// the real negotiated ID out of the offer/answer SDP is not implemented;
/// this is a pragmatic fixed assumption rather than a derived value.
const AUDIO_LEVEL_EXTENSION_ID: u8 = 1;

use super::registry::Call;
use super::session::{RemoteScreenTrack, Session, TrackAction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackKind {
    Voice,
    ScreenVideo { rid: String },
    ScreenAudio,
}

impl TrackKind {
    fn track_type(&self) -> TrackType {
        match self {
            TrackKind::Voice => TrackType::Voice,
            TrackKind::ScreenVideo { .. } => TrackType::Screen,
            TrackKind::ScreenAudio => TrackType::ScreenAudio,
        }
    }
}

/// §4.3 step 1: classify an inbound remote track by codec and stream ID.
/// Returns `None` for any other combination ("log+drop").
pub fn classify_track(remote: &TrackRemote, screen_stream_id: Option<&str>) -> Option<TrackKind> {
    let codec = remote.codec();
    let mime = codec.capability.mime_type.to_lowercase();
    let is_screen_stream = screen_stream_id.is_some_and(|id| id == remote.stream_id());

    match (codec.capability.channels, remote.kind(), mime.as_str(), is_screen_stream) {
        (_, RTPCodecType::Audio, m, false) if m.contains("opus") => Some(TrackKind::Voice),
        (_, RTPCodecType::Audio, m, true) if m.contains("opus") => Some(TrackKind::ScreenAudio),
        (_, RTPCodecType::Video, m, true) if m.contains("vp8") || m.contains("av1") => {
            Some(TrackKind::ScreenVideo { rid: remote.rid().to_string() })
        }
        _ => None,
    }
}

/// Continuously forwards RTP from one remote track into one local track
/// (§4.3 step 4). The local track may be bound to many peer connections
/// at once (`write_rtp` fans out to every bound sender) — switching which
/// subscribers see this stream is a matter of adding/removing the track
/// from their peer connection, not touching this loop.
pub struct TrackForwarder {
    pub publisher_id: String,
    pub kind: TrackKind,
    pub local_track: Arc<TrackLocalStaticRTP>,
    source: Arc<TrackRemote>,
    /// The publisher's own session, so a subscriber's RTCP feedback loop
    /// can forward a `PictureLossIndication` back upstream to the peer
    /// connection that's actually encoding this track (§4.3).
    publisher_session: Arc<Session>,
    packet_count: AtomicU64,
}

impl TrackForwarder {
    pub fn new(
        source: Arc<TrackRemote>,
        publisher_id: String,
        kind: TrackKind,
        publisher_session: Arc<Session>,
    ) -> Arc<Self> {
        let suffix = match &kind {
            TrackKind::ScreenVideo { rid } => format!("{}-{rid}", publisher_id),
            _ => publisher_id.clone(),
        };
        let track_id = new_track_id(kind.track_type(), &suffix);

        let capability = RTCRtpCodecCapability {
            mime_type: source.codec().capability.mime_type,
            clock_rate: source.codec().capability.clock_rate,
            channels: source.codec().capability.channels,
            sdp_fmtp_line: source.codec().capability.sdp_fmtp_line,
            rtcp_feedback: vec![],
        };

        let stream_id = format!("stream-{publisher_id}");
        let local_track = Arc::new(TrackLocalStaticRTP::new(capability, track_id, stream_id));

        Arc::new(Self {
            publisher_id,
            kind,
            local_track,
            source,
            publisher_session,
            packet_count: AtomicU64::new(0),
        })
    }

    /// §4.3's "Sender RTCP is monitored for PictureLossIndication; on
    /// receipt, forward a PLI back to the current screen sender's remote
    /// track": writes a PLI for this forwarder's source SSRC onto the
    /// publisher's own peer connection, so its encoder produces a keyframe.
    pub async fn send_pli(&self) {
        let pli = PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc: self.source.ssrc(),
        };
        if let Err(e) = self
            .publisher_session
            .peer_connection
            .write_rtcp(&[Box::new(pli)])
            .await
        {
            tracing::debug!(
                publisher_id = %self.publisher_id,
                error = %e,
                "failed to forward PLI upstream",
            );
        }
    }

    /// §4.3 step 2-3: on creation, announce this forwarder to every other
    /// session in the call so they renegotiate it in.
    pub async fn announce(self: &Arc<Self>, call: &Call, publisher_user_id: &str) {
        call.iter_sessions_except(Some(publisher_user_id), |session| {
            let track = self.local_track.clone();
            let publisher_id = self.publisher_id.clone();
            async move {
                if !session.push_track_action(TrackAction::Add { track, publisher_id }) {
                    tracing::warn!(
                        session_id = %session.session_id,
                        "tracksCh full, dropping trackActionAdd"
                    );
                }
            }
        })
        .await;
    }

    /// §4.3 step 4: read loop. `voice_enabled` lives on the publisher
    /// session so the mute flag can be flipped live; the per-RID rate
    /// monitor, when this is a screen-video forwarder, lives in the
    /// publisher's `remote_screen_tracks` map for the simulcast
    /// controller (C9) to read.
    pub async fn run(self: Arc<Self>, publisher: Arc<Session>) {
        let rid = match &self.kind {
            TrackKind::ScreenVideo { rid } => Some(rid.clone()),
            _ => None,
        };

        loop {
            match self.source.read_rtp().await {
                Ok((packet, _attrs)) => {
                    let n = self.packet_count.fetch_add(1, Ordering::Relaxed) + 1;

                    if let Some(rid) = &rid {
                        if let Some(entry) = publisher.remote_screen_tracks.write().await.get_mut(rid) {
                            entry.rate_monitor.push_sample(packet.payload.len());
                        }
                    }

                    if self.kind == TrackKind::Voice {
                        if let Some(mut ext) = packet.header.get_extension(AUDIO_LEVEL_EXTENSION_ID) {
                            if let Ok(level) = AudioLevelExtension::unmarshal(&mut ext) {
                                publisher.vad.lock().await.push_sample(level.level);
                            }
                        }
                        if !publisher.voice_enabled() {
                            continue;
                        }
                    }

                    if let Err(e) = self.local_track.write_rtp(&packet).await {
                        if n % 200 == 1 {
                            tracing::warn!(track_id = %self.local_track.id(), error = %e, "write_rtp failed");
                        }
                    }
                }
                Err(e) => {
                    let msg = e.to_string();
                    if msg.contains("closed") {
                        tracing::debug!(publisher_id = %self.publisher_id, "source track closed");
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Stores a freshly-classified remote screen track alongside its own
/// rate monitor, used by the simulcast controller (C9) to read the
/// current source rate for a RID.
pub fn remote_screen_track(
    track: Arc<TrackRemote>,
    receiver: Arc<webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver>,
) -> RemoteScreenTrack {
    let window = if track.rid() == "h" { WINDOW_HIGH } else { WINDOW_LOW };
    RemoteScreenTrack {
        track,
        receiver,
        rate_monitor: RateMonitor::new(window),
    }
}
