//! Signaling coordinator (C11), §4.11.
//!
//! The spec's own open questions (§9(c)) settle the glare question: this
//! server does not implement true rollback-based perfect negotiation,
//! it drops a conflicting inbound offer and relies on the other side to
//! re-send once its own offer resolves. `makingOffer` and
//! `signalingState` are the only two inputs to that decision.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;

use meshcall_protocol::rtc::{SdpType, SessionDescription as WireSdp};

use super::session::{Session, SIGNALING_TIMEOUT};
use crate::error::SfuError;

/// §4.11: one inbound offer. Returns `None` when the offer was dropped
/// for glare (§9(c)) — the caller sends nothing back in that case.
pub async fn handle_offer(session: &Arc<Session>, offer: WireSdp) -> Result<Option<WireSdp>, SfuError> {
    let pc = &session.peer_connection;

    let in_conflict =
        session.making_offer.load(Ordering::SeqCst) || pc.signaling_state() != RTCSignalingState::Stable;
    if in_conflict {
        tracing::debug!(session_id = %session.session_id, "dropping inbound offer: signaling conflict");
        return Err(SfuError::SignalingGlare);
    }

    let remote = to_rtc_description(offer)?;
    with_timeout(pc.set_remote_description(remote)).await?;

    let answer = with_timeout(pc.create_answer(None)).await?;
    with_timeout(pc.set_local_description(answer.clone())).await?;

    Ok(Some(from_rtc_description(answer)))
}

/// §4.11: one inbound answer — no ambiguity possible, just apply it and
/// clear `makingOffer` so a future conflicting offer isn't dropped
/// needlessly.
pub async fn handle_answer(session: &Arc<Session>, answer: WireSdp) -> Result<(), SfuError> {
    let remote = to_rtc_description(answer)?;
    with_timeout(session.peer_connection.set_remote_description(remote)).await?;
    session.making_offer.store(false, Ordering::SeqCst);
    Ok(())
}

/// Begins a local renegotiation (e.g. a fresh track add/remove batch):
/// sets `makingOffer`, creates and applies a local offer, and returns it
/// for the caller to send over the signaling channel. Cleared again by
/// `handle_answer`, or here on failure.
pub async fn create_offer(session: &Arc<Session>) -> Result<WireSdp, SfuError> {
    session.making_offer.store(true, Ordering::SeqCst);
    let pc = &session.peer_connection;

    let result: Result<WireSdp, SfuError> = async {
        let offer = with_timeout(pc.create_offer(None)).await?;
        with_timeout(pc.set_local_description(offer.clone())).await?;
        Ok(from_rtc_description(offer))
    }
    .await;

    if result.is_err() {
        session.making_offer.store(false, Ordering::SeqCst);
    }
    result
}

async fn with_timeout<T, E>(fut: impl std::future::Future<Output = Result<T, E>>) -> Result<T, SfuError>
where
    SfuError: From<E>,
{
    match tokio::time::timeout(SIGNALING_TIMEOUT, fut).await {
        Ok(inner) => inner.map_err(SfuError::from),
        Err(_) => Err(SfuError::SignalingTimeout(SIGNALING_TIMEOUT)),
    }
}

fn to_rtc_description(wire: WireSdp) -> Result<RTCSessionDescription, SfuError> {
    match wire.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(wire.sdp).map_err(SfuError::from),
        SdpType::Answer => RTCSessionDescription::answer(wire.sdp).map_err(SfuError::from),
        SdpType::Pranswer => RTCSessionDescription::pranswer(wire.sdp).map_err(SfuError::from),
        SdpType::Rollback => Err(SfuError::InvalidSdp("rollback is not accepted from clients".into())),
    }
}

fn from_rtc_description(desc: RTCSessionDescription) -> WireSdp {
    use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => SdpType::Answer,
    };
    WireSdp { sdp_type, sdp: desc.sdp }
}
