//! Session: per-peer state (C6), §3, §4.2.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_remote::TrackRemote;

use meshcall_media::{RateMonitor, VadConfig, VoiceActivityDetector};
use meshcall_protocol::rtc::{IceCandidateInit, Message as RtcMessage, SessionDescription};

use super::bwe::BweEstimator;
use super::signaling_lock::SignalingLock;

pub const SIGNALING_TIMEOUT: Duration = Duration::from_secs(10);
const QUEUE_DEPTH: usize = 64;
/// Initial simulcast-switch backoff (§4.9 step 9); multiplied by 1.5 on
/// every switch, reset when a session stops watching a screen share.
pub const INITIAL_SCREEN_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// An action the track loop applies in enqueue order for a given session
/// (§5 ordering guarantees).
pub enum TrackAction {
    Add {
        track: Arc<TrackLocalStaticRTP>,
        publisher_id: String,
    },
    Remove {
        track_id: String,
    },
}

/// Per-RID remote screen track handle plus its rate monitor, used by the
/// simulcast controller (C9) to read the current source rate.
pub struct RemoteScreenTrack {
    pub track: Arc<TrackRemote>,
    pub receiver: Arc<RTCRtpReceiver>,
    pub rate_monitor: RateMonitor,
}

/// Outbound local tracks a session is forwarding to its own peer. Each
/// simulcast RID gets its own continuously-forwarding local track;
/// `screen` points at whichever one is currently added to subscribers
/// (§4.9 switches this pointer, not the RTP content).
#[derive(Default)]
pub struct OutboundTracks {
    pub voice: Option<Arc<TrackLocalStaticRTP>>,
    pub screen: Option<Arc<TrackLocalStaticRTP>>,
    pub screen_by_rid: HashMap<String, Arc<TrackLocalStaticRTP>>,
    pub screen_audio: Option<Arc<TrackLocalStaticRTP>>,
}

pub struct Session {
    pub group_id: String,
    pub call_id: String,
    pub user_id: String,
    pub session_id: String,

    pub peer_connection: Arc<RTCPeerConnection>,

    pub state: RwLock<SessionState>,
    pub out_voice_track_enabled: AtomicBool,

    pub outbound: RwLock<OutboundTracks>,
    pub remote_screen_tracks: RwLock<HashMap<String, RemoteScreenTrack>>,

    /// Hysteresis detector over this session's inbound voice audio-level
    /// samples (§3 `vadMonitor`, §4.8). Transitions are pushed onto
    /// `vad_events_tx` rather than acted on inline, since the detector's
    /// own `on_change` callback runs synchronously inside `push_sample`.
    pub vad: Mutex<VoiceActivityDetector>,
    pub vad_events_tx: mpsc::Sender<bool>,
    vad_events_rx: Mutex<Option<mpsc::Receiver<bool>>>,

    pub ice_in_tx: mpsc::Sender<IceCandidateInit>,
    ice_in_rx: Mutex<Option<mpsc::Receiver<IceCandidateInit>>>,

    pub sdp_offer_in_tx: mpsc::Sender<SessionDescription>,
    sdp_offer_in_rx: Mutex<Option<mpsc::Receiver<SessionDescription>>>,

    pub sdp_answer_in_tx: mpsc::Sender<SessionDescription>,
    sdp_answer_in_rx: Mutex<Option<mpsc::Receiver<SessionDescription>>>,

    pub tracks_tx: mpsc::Sender<TrackAction>,
    tracks_rx: Mutex<Option<mpsc::Receiver<TrackAction>>>,

    pub dc_out_tx: mpsc::Sender<Vec<u8>>,
    dc_out_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,

    /// Outbound `rtc` control messages (ICE/SDP/screen/voice broadcasts)
    /// bound for this session's WebSocket connection. The data channel
    /// has its own outbound path (`dc_out_tx`); this is the WS one, used
    /// whenever `dc_signaling` isn't active for SDP and always for ICE
    /// (§4.6 — ICE never moves to the data channel).
    pub ws_out_tx: mpsc::Sender<RtcMessage>,
    ws_out_rx: Mutex<Option<mpsc::Receiver<RtcMessage>>>,

    pub signaling_lock: SignalingLock,
    pub making_offer: AtomicBool,

    /// This session's own send-side bandwidth estimate (§4.9 reads this
    /// as a subscriber's downlink condition to the screen-sharer).
    pub bwe: Mutex<BweEstimator>,

    /// When the current simulcast level last changed, and the backoff
    /// before it's allowed to change again (§4.9 steps 7/9).
    pub last_level_change_at: Mutex<Option<std::time::Instant>>,
    pub screen_backoff: Mutex<Duration>,
    pub current_screen_rid: RwLock<Option<String>>,

    pub screen_stream_id: RwLock<Option<String>>,
    pub dc_signaling: AtomicBool,

    pub close_tx: broadcast::Sender<()>,
    connected_at: AtomicI64,
}

impl Session {
    pub fn new(
        group_id: String,
        call_id: String,
        user_id: String,
        session_id: String,
        peer_connection: Arc<RTCPeerConnection>,
    ) -> Arc<Self> {
        let (ice_in_tx, ice_in_rx) = mpsc::channel(QUEUE_DEPTH);
        let (sdp_offer_in_tx, sdp_offer_in_rx) = mpsc::channel(QUEUE_DEPTH);
        let (sdp_answer_in_tx, sdp_answer_in_rx) = mpsc::channel(QUEUE_DEPTH);
        let (tracks_tx, tracks_rx) = mpsc::channel(QUEUE_DEPTH);
        let (dc_out_tx, dc_out_rx) = mpsc::channel(QUEUE_DEPTH);
        let (ws_out_tx, ws_out_rx) = mpsc::channel(QUEUE_DEPTH);
        let (close_tx, _) = broadcast::channel(1);
        let (vad_events_tx, vad_events_rx) = mpsc::channel(QUEUE_DEPTH);
        let vad = {
            let tx = vad_events_tx.clone();
            VoiceActivityDetector::new(
                VadConfig::default(),
                Box::new(move |active| {
                    let _ = tx.try_send(active);
                }),
            )
        };

        Arc::new(Self {
            group_id,
            call_id,
            user_id,
            session_id,
            peer_connection,
            state: RwLock::new(SessionState::Initializing),
            out_voice_track_enabled: AtomicBool::new(true),
            outbound: RwLock::new(OutboundTracks::default()),
            remote_screen_tracks: RwLock::new(HashMap::new()),
            vad: Mutex::new(vad),
            vad_events_tx,
            vad_events_rx: Mutex::new(Some(vad_events_rx)),
            ice_in_tx,
            ice_in_rx: Mutex::new(Some(ice_in_rx)),
            sdp_offer_in_tx,
            sdp_offer_in_rx: Mutex::new(Some(sdp_offer_in_rx)),
            sdp_answer_in_tx,
            sdp_answer_in_rx: Mutex::new(Some(sdp_answer_in_rx)),
            tracks_tx,
            tracks_rx: Mutex::new(Some(tracks_rx)),
            dc_out_tx,
            dc_out_rx: Mutex::new(Some(dc_out_rx)),
            ws_out_tx,
            ws_out_rx: Mutex::new(Some(ws_out_rx)),
            signaling_lock: SignalingLock::new(),
            making_offer: AtomicBool::new(false),
            bwe: Mutex::new(BweEstimator::new()),
            last_level_change_at: Mutex::new(None),
            screen_backoff: Mutex::new(INITIAL_SCREEN_BACKOFF),
            current_screen_rid: RwLock::new(None),
            screen_stream_id: RwLock::new(None),
            dc_signaling: AtomicBool::new(false),
            close_tx,
            connected_at: AtomicI64::new(0),
        })
    }

    /// Takes ownership of the inbound-ICE receiver; only the session's own
    /// ICE-handler task should call this, and only once.
    pub async fn take_ice_in_rx(&self) -> Option<mpsc::Receiver<IceCandidateInit>> {
        self.ice_in_rx.lock().await.take()
    }

    pub async fn take_sdp_offer_in_rx(&self) -> Option<mpsc::Receiver<SessionDescription>> {
        self.sdp_offer_in_rx.lock().await.take()
    }

    pub async fn take_sdp_answer_in_rx(&self) -> Option<mpsc::Receiver<SessionDescription>> {
        self.sdp_answer_in_rx.lock().await.take()
    }

    pub async fn take_tracks_rx(&self) -> Option<mpsc::Receiver<TrackAction>> {
        self.tracks_rx.lock().await.take()
    }

    pub async fn take_dc_out_rx(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.dc_out_rx.lock().await.take()
    }

    /// Taken once by the session's own VAD-event task, which turns ON/OFF
    /// transitions into `VoiceOn`/`VoiceOff` broadcasts to the rest of the
    /// call (§4.1).
    pub async fn take_vad_events_rx(&self) -> Option<mpsc::Receiver<bool>> {
        self.vad_events_rx.lock().await.take()
    }

    pub async fn take_ws_out_rx(&self) -> Option<mpsc::Receiver<RtcMessage>> {
        self.ws_out_rx.lock().await.take()
    }

    /// Non-blocking enqueue of an outbound `rtc` message; same
    /// "drop new, keep old" backpressure policy as the inbound queues (§5).
    pub fn push_ws_out(&self, msg: RtcMessage) -> bool {
        self.ws_out_tx.try_send(msg).is_ok()
    }

    pub async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
        if state == SessionState::Connected {
            self.connected_at.store(now_unix_millis(), Ordering::Relaxed);
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Non-blocking enqueue with the "drop new, keep old" policy (§5):
    /// returns false (and the caller should log+metric) when the queue
    /// is full.
    pub fn push_ice(&self, candidate: IceCandidateInit) -> bool {
        self.ice_in_tx.try_send(candidate).is_ok()
    }

    pub fn push_sdp_offer(&self, sdp: SessionDescription) -> bool {
        self.sdp_offer_in_tx.try_send(sdp).is_ok()
    }

    pub fn push_sdp_answer(&self, sdp: SessionDescription) -> bool {
        self.sdp_answer_in_tx.try_send(sdp).is_ok()
    }

    pub fn push_track_action(&self, action: TrackAction) -> bool {
        self.tracks_tx.try_send(action).is_ok()
    }

    pub fn push_dc_out(&self, frame: Vec<u8>) -> bool {
        self.dc_out_tx.try_send(frame).is_ok()
    }

    pub fn voice_enabled(&self) -> bool {
        self.out_voice_track_enabled.load(Ordering::Relaxed)
    }

    pub fn set_voice_enabled(&self, enabled: bool) {
        self.out_voice_track_enabled.store(enabled, Ordering::Relaxed);
    }

    pub async fn close(&self) {
        *self.state.write().await = SessionState::Closed;
        let _ = self.close_tx.send(());
        if let Err(e) = self.peer_connection.close().await {
            tracing::warn!(session_id = %self.session_id, error = %e, "error closing peer connection");
        }
    }

    pub fn subscribe_close(&self) -> broadcast::Receiver<()> {
        self.close_tx.subscribe()
    }
}

fn now_unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
