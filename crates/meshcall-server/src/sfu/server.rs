//! The SFU server (C8): owns the ICE transport, the peer-connection API,
//! and the group/call/session registry, and is the single entry point
//! the WebSocket layer calls into for everything in §4.1-§4.3.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate_type::RTCIceCandidateType;
use webrtc::interceptor::registry::Registry as InterceptorRegistry;
use webrtc::interceptor::{nack, report, twcc};
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::picture_loss_indication::PictureLossIndication;
use webrtc::rtcp::receiver_report::ReceiverReport;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCPFeedback;
use webrtc::track::track_remote::TrackRemote;

use meshcall_protocol::rtc::{IceCandidateInit, Message as RtcMessage, RtcMessageType, SessionDescription as WireSdp};
use meshcall_protocol::ws::JoinData;

use crate::config::Config;
use crate::error::SfuError;
use crate::ice::turn_creds::{build_ice_servers, IceServerCredential};
use crate::ice::udp_mux::to_rtc_ice_servers;
use crate::ice::IceTransport;

use super::registry::{Call, Registry};
use super::session::{Session, SessionState, TrackAction};
use super::signaling;
use super::simulcast::SimulcastController;
use super::data_channel;
use super::track_forwarding::{classify_track, remote_screen_track, TrackForwarder};

const OPUS_PAYLOAD_TYPE: u8 = 111;
const VP8_PAYLOAD_TYPE: u8 = 96;
const AV1_PAYLOAD_TYPE: u8 = 45;

pub struct SfuServer {
    registry: Registry,
    ice: IceTransport,
    nack_buffer_size: u32,
    simulcast: Arc<SimulcastController>,
    ice_server_entries: Vec<crate::config::IceServerEntry>,
    turn_secret: String,
    turn_expiry_minutes: u32,
}

impl SfuServer {
    /// §4.1 Start: discover transport and stand up an empty registry. The
    /// `webrtc-rs` API itself is built per session (see `build_api`), not
    /// once here, since AV1 registration is call-scoped (§4.2).
    pub async fn new(cfg: &Config) -> Result<Arc<Self>, SfuError> {
        let ice = IceTransport::start(&cfg.rtc).await?;

        Ok(Arc::new(Self {
            registry: Registry::new(),
            ice,
            nack_buffer_size: cfg.rtc.nack_buffer_size,
            simulcast: Arc::new(SimulcastController::new()),
            ice_server_entries: cfg.rtc.ice_servers.clone(),
            turn_secret: cfg.rtc.turn.static_auth_secret.clone(),
            turn_expiry_minutes: cfg.rtc.turn.credentials_expiration_minutes,
        }))
    }

    /// Builds a fresh `webrtc-rs` API for one peer connection. AV1 is
    /// registered only when `enable_av1` is true, so a new session's
    /// offer never advertises a codec the rest of the call can't use
    /// (§4.2 "AV1 only when all sessions in the call advertise av1Support").
    fn build_api(&self, enable_av1: bool) -> Result<webrtc::api::API, SfuError> {
        let mut media_engine = MediaEngine::default();
        register_codecs(&mut media_engine, enable_av1)?;

        let registry = InterceptorRegistry::new();
        let registry = build_interceptors(registry, self.nack_buffer_size)?;

        let mut setting_engine = SettingEngine::default();
        setting_engine.set_nat_1to1_ips(self.ice.nat_1to1_ips(), RTCIceCandidateType::Host);
        setting_engine.set_ice_multicast_dns_mode(webrtc::ice::mdns::MulticastDnsMode::Disabled);
        if let Some(udp_mux) = self.ice.udp.default_mux() {
            setting_engine.set_ice_udp_mux(udp_mux);
        }
        if let Some(tcp_mux) = self.ice.tcp.default_mux() {
            setting_engine.set_ice_tcp_mux(tcp_mux);
        }

        Ok(APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ice_servers_for(&self, caller_username: &str) -> Vec<IceServerCredential> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        build_ice_servers(
            &self.ice_server_entries,
            caller_username,
            &self.turn_secret,
            self.turn_expiry_minutes,
            now,
        )
    }

    /// §4.2 `InitSession`: build the peer connection, wire its event
    /// handlers, register the session, and spawn its background tasks.
    /// Does not itself await a first offer — the caller (the WS/DC layer)
    /// feeds inbound SDP into the returned session as it arrives.
    pub async fn init_session(self: &Arc<Self>, join: &JoinData) -> Result<Arc<Session>, SfuError> {
        let existing_call = self.registry.get_call(&join.group_id, &join.call_id).await;
        let enable_av1 = match &existing_call {
            Some(call) => join.av1_support() && call.all_av1_support().await,
            None => join.av1_support(),
        };

        let api = self.build_api(enable_av1)?;

        let creds = self.ice_servers_for(&join.user_id);
        let config = RTCConfiguration {
            ice_servers: to_rtc_ice_servers(&creds),
            ..Default::default()
        };
        let pc = Arc::new(api.new_peer_connection(config).await?);

        let session = Session::new(
            join.group_id.clone(),
            join.call_id.clone(),
            join.user_id.clone(),
            join.session_id.clone(),
            pc.clone(),
        );

        self.wire_peer_connection(&session).await;

        let (_, _created) = self
            .registry
            .add_session(&join.group_id, &join.call_id, session.clone())
            .await;
        if let Some(call) = self.registry.get_call(&join.group_id, &join.call_id).await {
            call.record_av1_support(join.av1_support()).await;
        }

        self.spawn_ice_in_task(&session);
        self.spawn_track_loop(&session);
        self.spawn_vad_broadcast_task(&session);
        session.set_state(SessionState::Initializing).await;

        tracing::info!(
            session_id = %session.session_id, group_id = %session.group_id, call_id = %session.call_id,
            "session initialized",
        );
        Ok(session)
    }

    async fn wire_peer_connection(self: &Arc<Self>, session: &Arc<Session>) {
        let pc = &session.peer_connection;

        let ice_session = session.clone();
        pc.on_ice_candidate(Box::new(move |candidate| {
            let session = ice_session.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                let Ok(init) = candidate.to_json() else { return };
                let Ok(data) = serde_json::to_vec(&IceCandidateInit {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_mline_index: init.sdp_mline_index,
                }) else {
                    return;
                };
                let msg = RtcMessage {
                    group_id: session.group_id.clone(),
                    user_id: session.user_id.clone(),
                    call_id: session.call_id.clone(),
                    session_id: session.session_id.clone(),
                    msg_type: RtcMessageType::Ice,
                    data,
                };
                if !session.push_ws_out(msg) {
                    tracing::warn!(session_id = %session.session_id, "wsOutCh full, dropping outbound ICE candidate");
                }
            })
        }))
        .await;

        let state_session = session.clone();
        pc.on_peer_connection_state_change(Box::new(move |state| {
            let session = state_session.clone();
            Box::pin(async move {
                tracing::debug!(session_id = %session.session_id, ?state, "peer connection state changed");
                match state {
                    RTCPeerConnectionState::Connected => session.set_state(SessionState::Connected).await,
                    RTCPeerConnectionState::Disconnected => session.set_state(SessionState::Disconnected).await,
                    RTCPeerConnectionState::Failed => session.set_state(SessionState::Failed).await,
                    RTCPeerConnectionState::Closed => session.set_state(SessionState::Closed).await,
                    _ => {}
                }
            })
        }))
        .await;

        let track_server = Arc::clone(self);
        let track_session = session.clone();
        pc.on_track(Box::new(move |track, receiver| {
            let server = track_server.clone();
            let session = track_session.clone();
            Box::pin(async move {
                let (Some(track), Some(receiver)) = (track, receiver) else { return };
                server.handle_inbound_track(session, track, receiver).await;
            })
        }))
        .await;

        let dc_session = session.clone();
        pc.on_data_channel(Box::new(move |dc| {
            let session = dc_session.clone();
            Box::pin(async move {
                data_channel::wire(session, dc);
            })
        }))
        .await;
    }

    /// §4.3 step 1-3: classify a freshly-received remote track and, if
    /// recognized, start forwarding it and announce it to the rest of the
    /// call.
    async fn handle_inbound_track(
        self: Arc<Self>,
        session: Arc<Session>,
        track: Arc<TrackRemote>,
        receiver: Arc<webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver>,
    ) {
        let screen_stream_id = session.screen_stream_id.read().await.clone();
        let Some(kind) = classify_track(&track, screen_stream_id.as_deref()) else {
            tracing::debug!(session_id = %session.session_id, "dropping unrecognized remote track");
            return;
        };

        if let super::track_forwarding::TrackKind::ScreenVideo { rid } = &kind {
            session
                .remote_screen_tracks
                .write()
                .await
                .insert(rid.clone(), remote_screen_track(track.clone(), receiver));
        }

        let forwarder = TrackForwarder::new(track, session.user_id.clone(), kind.clone(), session.clone());

        {
            let mut outbound = session.outbound.write().await;
            match &kind {
                super::track_forwarding::TrackKind::Voice => outbound.voice = Some(forwarder.local_track.clone()),
                super::track_forwarding::TrackKind::ScreenAudio => {
                    outbound.screen_audio = Some(forwarder.local_track.clone())
                }
                super::track_forwarding::TrackKind::ScreenVideo { rid } => {
                    outbound.screen_by_rid.insert(rid.clone(), forwarder.local_track.clone());
                    outbound.screen = Some(forwarder.local_track.clone());
                }
            }
        }

        if let Some(call) = self.registry.get_call(&session.group_id, &session.call_id).await {
            call.register_forwarder(forwarder.local_track.id().to_string(), forwarder.clone())
                .await;
            forwarder.announce(&call, &session.user_id).await;
        }

        let forwarder_for_run = forwarder.clone();
        let run_session = session.clone();
        tokio::spawn(async move {
            forwarder_for_run.run(run_session).await;
        });
    }

    /// Consumes `session.tracks_rx`, applying `TrackAction`s in order and
    /// renegotiating via a fresh offer/answer round for each batch (§4.3
    /// step 4, §4.2 `addTrack`).
    fn spawn_track_loop(self: &Arc<Self>, session: &Arc<Session>) {
        let server = Arc::clone(self);
        let session = session.clone();
        tokio::spawn(async move {
            let Some(mut rx) = session.take_tracks_rx().await else { return };
            let mut close_rx = session.subscribe_close();
            loop {
                let action = tokio::select! {
                    biased;
                    _ = close_rx.recv() => break,
                    action = rx.recv() => match action {
                        Some(a) => a,
                        None => break,
                    },
                };

                let pc = &session.peer_connection;
                let apply_result: Result<(), SfuError> = async {
                    match action {
                        TrackAction::Add { track, publisher_id } => {
                            let track_id = track.id().to_string();
                            let sender = pc
                                .add_track(track as Arc<dyn webrtc::track::track_local::TrackLocal + Send + Sync>)
                                .await?;
                            server.spawn_sender_feedback_loop(&session, sender, track_id);
                            tracing::debug!(session_id = %session.session_id, %publisher_id, "added track, renegotiating");
                        }
                        TrackAction::Remove { track_id } => {
                            let senders = pc.get_senders().await;
                            for sender in senders {
                                if let Some(track) = sender.track().await {
                                    if track.id() == track_id {
                                        pc.remove_track(&sender).await?;
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Ok(())
                }
                .await;

                if let Err(e) = apply_result {
                    tracing::warn!(session_id = %session.session_id, error = %e, "failed to apply track action");
                    continue;
                }

                match signaling::create_offer(&session).await {
                    Ok(offer) => send_sdp(&session, offer).await,
                    Err(e) => tracing::warn!(session_id = %session.session_id, error = %e, "renegotiation offer failed"),
                }
            }
        });
    }

    /// Reads RTCP off a just-added sender (§4.3 step 4, §4.9 step 1): a
    /// `ReceiverReport`'s loss fraction feeds this session's own BWE
    /// estimator and, on change, the simulcast controller; a
    /// `PictureLossIndication` is forwarded upstream to whichever
    /// forwarder owns `track_id`, so the original publisher's encoder
    /// produces a keyframe.
    fn spawn_sender_feedback_loop(self: &Arc<Self>, session: &Arc<Session>, sender: Arc<RTCRtpSender>, track_id: String) {
        let server = Arc::clone(self);
        let session = session.clone();
        tokio::spawn(async move {
            let mut close_rx = session.subscribe_close();
            loop {
                let packet = tokio::select! {
                    biased;
                    _ = close_rx.recv() => break,
                    read = sender.read_rtcp() => match read {
                        Ok((packet, _attrs)) => packet,
                        Err(_) => break,
                    },
                };

                if let Some(rr) = packet.as_any().downcast_ref::<ReceiverReport>() {
                    let Some(call) = server.registry.get_call(&session.group_id, &session.call_id).await else {
                        continue;
                    };
                    for report in &rr.reports {
                        let fraction_lost = report.fraction_lost as f64 / 256.0;
                        let (prev, after) = {
                            let mut bwe = session.bwe.lock().await;
                            let prev = bwe.stats();
                            bwe.on_loss_fraction(fraction_lost);
                            (prev, bwe.stats())
                        };
                        server.simulcast.on_bwe_event(&session, &call, prev, after).await;
                    }
                } else if packet.as_any().downcast_ref::<PictureLossIndication>().is_some() {
                    if let Some(call) = server.registry.get_call(&session.group_id, &session.call_id).await {
                        if let Some(forwarder) = call.get_forwarder(&track_id).await {
                            forwarder.send_pli().await;
                        }
                    }
                }
            }
        });
    }

    /// Consumes `session.ice_in_rx`, feeding inbound trickle ICE
    /// candidates into the peer connection as they arrive (§4.1 `ICEMessage`).
    fn spawn_ice_in_task(self: &Arc<Self>, session: &Arc<Session>) {
        let session = session.clone();
        tokio::spawn(async move {
            let Some(mut rx) = session.take_ice_in_rx().await else { return };
            let mut close_rx = session.subscribe_close();
            loop {
                let candidate = tokio::select! {
                    biased;
                    _ = close_rx.recv() => break,
                    c = rx.recv() => match c {
                        Some(c) => c,
                        None => break,
                    },
                };
                let init = webrtc::ice_transport::ice_candidate::RTCIceCandidateInit {
                    candidate: candidate.candidate,
                    sdp_mid: candidate.sdp_mid,
                    sdp_mline_index: candidate.sdp_mline_index,
                    ..Default::default()
                };
                if let Err(e) = session.peer_connection.add_ice_candidate(init).await {
                    tracing::debug!(session_id = %session.session_id, error = %e, "add_ice_candidate failed");
                }
            }
        });
    }

    /// Turns this session's own VAD ON/OFF transitions into
    /// `VoiceOn`/`VoiceOff` broadcasts to the rest of the call (§3, §4.8).
    fn spawn_vad_broadcast_task(self: &Arc<Self>, session: &Arc<Session>) {
        let server = Arc::clone(self);
        let session = session.clone();
        tokio::spawn(async move {
            let Some(mut rx) = session.take_vad_events_rx().await else { return };
            let mut close_rx = session.subscribe_close();
            loop {
                let active = tokio::select! {
                    biased;
                    _ = close_rx.recv() => break,
                    a = rx.recv() => match a {
                        Some(a) => a,
                        None => break,
                    },
                };
                let Some(call) = server.registry.get_call(&session.group_id, &session.call_id).await else {
                    continue;
                };
                let msg_type = if active { RtcMessageType::VoiceOn } else { RtcMessageType::VoiceOff };
                call.iter_sessions_except(Some(&session.user_id), |peer| {
                    let session = session.clone();
                    async move {
                        let msg = RtcMessage {
                            group_id: session.group_id.clone(),
                            user_id: session.user_id.clone(),
                            call_id: session.call_id.clone(),
                            session_id: session.session_id.clone(),
                            msg_type,
                            data: Vec::new(),
                        };
                        if !peer.push_ws_out(msg) {
                            tracing::warn!(session_id = %peer.session_id, "wsOutCh full, dropping VAD broadcast");
                        }
                    }
                })
                .await;
            }
        });
    }

    /// §4.1 inbound control router: dispatches one already-decoded `rtc`
    /// message to the session it targets.
    pub async fn handle_control_message(self: &Arc<Self>, msg: RtcMessage) {
        let Some(session) = self.registry.get_session_by_id(&msg.session_id).await else {
            tracing::debug!(session_id = %msg.session_id, "control message for unknown session");
            return;
        };

        match msg.msg_type {
            RtcMessageType::Ice => {
                if let Ok(candidate) = serde_json::from_slice::<IceCandidateInit>(&msg.data) {
                    if !session.push_ice(candidate) {
                        tracing::warn!(session_id = %session.session_id, "iceInCh full, dropping inbound ICE candidate");
                    }
                }
            }
            RtcMessageType::Sdp => {
                let Ok(sdp) = serde_json::from_slice::<WireSdp>(&msg.data) else { return };
                self.handle_inbound_sdp(&session, sdp).await;
            }
            RtcMessageType::Mute => {
                session.set_voice_enabled(false);
                session.vad.lock().await.reset();
            }
            RtcMessageType::Unmute => {
                session.set_voice_enabled(true);
            }
            RtcMessageType::ScreenOn => {
                if let Some(call) = self.registry.get_call(&session.group_id, &session.call_id).await {
                    call.set_screen_session(&session.session_id).await;
                }
            }
            RtcMessageType::ScreenOff => {
                self.clear_screen_state(&session).await;
            }
            RtcMessageType::VoiceOn | RtcMessageType::VoiceOff => {
                // Server-originated only; a client sending these is a protocol
                // error we silently ignore rather than fail the connection (§7.4).
            }
        }
    }

    async fn handle_inbound_sdp(self: &Arc<Self>, session: &Arc<Session>, sdp: WireSdp) {
        match sdp.sdp_type {
            meshcall_protocol::rtc::SdpType::Offer => match signaling::handle_offer(session, sdp).await {
                Ok(Some(answer)) => send_sdp(session, answer).await,
                Ok(None) => {}
                Err(SfuError::SignalingGlare) => {}
                Err(e) => {
                    tracing::warn!(session_id = %session.session_id, error = %e, "inbound offer rejected, closing session");
                    session.set_state(SessionState::Failed).await;
                    self.close_session(&session.session_id).await;
                }
            },
            meshcall_protocol::rtc::SdpType::Answer => {
                if let Err(e) = signaling::handle_answer(session, sdp).await {
                    tracing::warn!(session_id = %session.session_id, error = %e, "inbound answer rejected");
                }
            }
            _ => {}
        }
    }

    /// §4.1 `ScreenOffMessage`: clears the call's screen-sharer if
    /// `session` currently holds it, and tells every other session
    /// watching it to drop the track (§4.3's `trackActionRemove`).
    async fn clear_screen_state(self: &Arc<Self>, session: &Arc<Session>) {
        let Some(call) = self.registry.get_call(&session.group_id, &session.call_id).await else {
            return;
        };
        if !call.clear_screen_session(&session.session_id).await {
            return;
        }

        let outbound = session.outbound.read().await;
        let track_ids: Vec<String> = outbound
            .screen_by_rid
            .values()
            .map(|t| t.id().to_string())
            .chain(outbound.screen_audio.iter().map(|t| t.id().to_string()))
            .collect();
        drop(outbound);

        call.iter_sessions_except(Some(&session.user_id), |peer| {
            let track_ids = track_ids.clone();
            async move {
                for track_id in track_ids {
                    if !peer.push_track_action(TrackAction::Remove { track_id }) {
                        tracing::warn!(session_id = %peer.session_id, "tracksCh full, dropping trackActionRemove");
                    }
                }
            }
        })
        .await;
    }

    /// §4.2 `CloseSession`: idempotent, bottom-up registry removal plus
    /// peer connection teardown.
    pub async fn close_session(self: &Arc<Self>, session_id: &str) {
        let Some(call) = self.registry.remove_session(session_id).await else {
            return;
        };
        if let Some(session) = call.get_session(session_id).await {
            session.close().await;
        }
    }

    pub fn simulcast(&self) -> &Arc<SimulcastController> {
        &self.simulcast
    }

    /// §5 "Stop is drain-aware": closes every live session and blocks
    /// until each one's peer connection has torn down, so a restart never
    /// orphans a subscriber mid-call.
    pub async fn close_all_sessions(self: &Arc<Self>) {
        let session_ids = self.registry.all_session_ids().await;
        for session_id in session_ids {
            self.close_session(&session_id).await;
        }
    }
}

async fn send_sdp(session: &Arc<Session>, sdp: WireSdp) {
    let prefer_dc = session.dc_signaling.load(std::sync::atomic::Ordering::SeqCst);
    if prefer_dc {
        if let Ok(encoded) = meshcall_protocol::dc::encode_sdp(&sdp) {
            let frame = meshcall_protocol::dc::encode_message(meshcall_protocol::dc::MessageType::Sdp, Some(&encoded));
            if session.push_dc_out(frame) {
                return;
            }
        }
    }

    let Ok(data) = serde_json::to_vec(&sdp) else { return };
    let msg_type = match sdp.sdp_type {
        meshcall_protocol::rtc::SdpType::Offer => RtcMessageType::Sdp,
        _ => RtcMessageType::Sdp,
    };
    let msg = RtcMessage {
        group_id: session.group_id.clone(),
        user_id: session.user_id.clone(),
        call_id: session.call_id.clone(),
        session_id: session.session_id.clone(),
        msg_type,
        data,
    };
    if !session.push_ws_out(msg) {
        tracing::warn!(session_id = %session.session_id, "wsOutCh full, dropping outbound SDP");
    }
}

/// Registers Opus, VP8, and (optionally) AV1, matching the codec set
/// `track_forwarding::classify_track` recognizes.
fn register_codecs(media_engine: &mut MediaEngine, enable_av1: bool) -> Result<(), SfuError> {
    media_engine.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: webrtc::api::media_engine::MIME_TYPE_OPUS.to_string(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                rtcp_feedback: vec![],
            },
            payload_type: OPUS_PAYLOAD_TYPE,
            ..Default::default()
        },
        RTPCodecType::Audio,
    )?;

    media_engine.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: webrtc::api::media_engine::MIME_TYPE_VP8.to_string(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: video_feedback(),
            },
            payload_type: VP8_PAYLOAD_TYPE,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;

    if enable_av1 {
        media_engine.register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: "video/AV1".to_string(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: video_feedback(),
                },
                payload_type: AV1_PAYLOAD_TYPE,
                ..Default::default()
            },
            RTPCodecType::Video,
        )?;
    }

    Ok(())
}

fn video_feedback() -> Vec<RTCPFeedback> {
    vec![
        RTCPFeedback { typ: "nack".to_string(), parameter: String::new() },
        RTCPFeedback { typ: "nack".to_string(), parameter: "pli".to_string() },
        RTCPFeedback { typ: "transport-cc".to_string(), parameter: String::new() },
    ]
}

/// Builds the interceptor chain by hand rather than calling
/// `register_default_interceptors`, so the NACK buffer size comes from
/// config (§4.1 step 4) instead of the crate's hardcoded default.
///
/// There is no GCC/REMB interceptor in this `webrtc-rs` version — TWCC
/// feedback is registered for header-extension negotiation, but
/// `bwe.rs`'s estimator is fed from receiver reports, not wired to a
/// concrete TWCC feedback consumer here. See DESIGN.md.
fn build_interceptors(
    mut registry: InterceptorRegistry,
    nack_buffer_size: u32,
) -> Result<InterceptorRegistry, SfuError> {
    let log2_size = nack_buffer_size.trailing_zeros() as u8;
    let generator_log2 = log2_size.saturating_sub(6);

    registry.add(Box::new(
        nack::generator::Generator::builder().with_log2_size_minus_6(generator_log2),
    ));
    registry.add(Box::new(nack::responder::Responder::builder().with_log2_size(log2_size)));
    registry.add(Box::new(report::receiver::ReceiverReport::builder()));
    registry.add(Box::new(report::sender::SenderReport::builder()));
    registry.add(Box::new(twcc::sender::Sender::builder()));

    Ok(registry)
}

#[allow(dead_code)]
type IceInTx = mpsc::Sender<IceCandidateInit>;
