//! Peer-side data channel wiring (C2/C10), §4.6.
//!
//! The frame codec itself lives in `meshcall_protocol::dc`; this module
//! is the glue between that codec and a session — registering the
//! `on_data_channel`/`on_open`/`on_message` callbacks and dispatching
//! each decoded frame per §4.6's message table.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;

use meshcall_protocol::dc::{decode_f64, decode_message, decode_sdp, encode_message, encode_sdp, MessageType};
use meshcall_protocol::rtc::SdpType;

use super::session::Session;
use super::signaling;

/// Registers `on_open`/`on_message` on a freshly-opened peer data
/// channel. Called from the session's `on_data_channel` handler (§4.2).
pub fn wire(session: Arc<Session>, dc: Arc<RTCDataChannel>) {
    let open_session = session.clone();
    dc.on_open(Box::new(move || {
        let session = open_session.clone();
        Box::pin(async move {
            session.dc_signaling.store(true, Ordering::SeqCst);
            tracing::debug!(session_id = %session.session_id, "data channel open");
        })
    }));

    let message_session = session.clone();
    let message_dc = dc.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let session = message_session.clone();
        let dc = message_dc.clone();
        Box::pin(async move {
            if let Err(e) = handle_frame(&session, &dc, &msg.data).await {
                tracing::warn!(session_id = %session.session_id, error = %e, "data channel frame error");
            }
        })
    }));

    let close_session = session.clone();
    dc.on_close(Box::new(move || {
        close_session.dc_signaling.store(false, Ordering::SeqCst);
        Box::pin(async {})
    }));

    spawn_outbound_task(session, dc);
}

/// Drains `session.dc_out_tx` (fed by `send_sdp`'s `prefer_dc` path, §4.6)
/// onto the real data channel. Only the first caller to open a data
/// channel for this session gets a receiver; later `on_data_channel`
/// calls on the same session would find `take_dc_out_rx` already empty.
fn spawn_outbound_task(session: Arc<Session>, dc: Arc<RTCDataChannel>) {
    tokio::spawn(async move {
        let Some(mut rx) = session.take_dc_out_rx().await else { return };
        let mut close_rx = session.subscribe_close();
        loop {
            let frame = tokio::select! {
                biased;
                _ = close_rx.recv() => break,
                frame = rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if let Err(e) = dc.send(&Bytes::from(frame)).await {
                tracing::debug!(session_id = %session.session_id, error = %e, "data channel send failed");
            }
        }
    });
}

async fn handle_frame(session: &Arc<Session>, dc: &Arc<RTCDataChannel>, bytes: &Bytes) -> Result<(), String> {
    let (msg_type, payload) = decode_message(bytes).map_err(|e| e.to_string())?;

    match msg_type {
        MessageType::Ping => {
            send_frame(dc, MessageType::Pong, None).await;
        }
        MessageType::Pong => {}

        MessageType::Sdp => {
            let payload = payload.ok_or("sdp frame missing payload")?;
            let desc = decode_sdp(&payload).map_err(|e| e.to_string())?;
            match desc.sdp_type {
                SdpType::Offer => match signaling::handle_offer(session, desc).await {
                    Ok(Some(answer)) => {
                        let encoded = encode_sdp(&answer).map_err(|e| e.to_string())?;
                        send_frame(dc, MessageType::Sdp, Some(&encoded)).await;
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!(session_id = %session.session_id, error = %e, "dc offer rejected"),
                },
                SdpType::Answer => {
                    if let Err(e) = signaling::handle_answer(session, desc).await {
                        tracing::warn!(session_id = %session.session_id, error = %e, "dc answer rejected");
                    }
                }
                _ => return Err("unexpected sdp type on data channel".to_string()),
            }
        }

        MessageType::LossRate | MessageType::Rtt | MessageType::Jitter => {
            let payload = payload.ok_or("metric frame missing payload")?;
            let value = decode_f64(&payload).ok_or("malformed metric payload")?;
            observe_metric(session, msg_type, value);
        }

        MessageType::Lock => {
            let acquired = session.signaling_lock.try_lock().await;
            send_frame(dc, MessageType::Lock, Some(&[acquired as u8])).await;
        }

        MessageType::Unlock => match session.signaling_lock.unlock().await {
            Ok(held) => metrics::histogram!("rtcd_signaling_lock_held_seconds").record(held.as_secs_f64()),
            Err(e) => {
                tracing::warn!(session_id = %session.session_id, error = %e, "unlock on already-unlocked signaling lock")
            }
        },
    }

    Ok(())
}

fn observe_metric(session: &Arc<Session>, msg_type: MessageType, value: f64) {
    let metric = match msg_type {
        MessageType::LossRate => "rtcd_dc_loss_rate",
        MessageType::Rtt => "rtcd_dc_rtt_seconds",
        MessageType::Jitter => "rtcd_dc_jitter_seconds",
        _ => return,
    };
    metrics::gauge!(metric, "group_id" => session.group_id.clone()).set(value);
}

async fn send_frame(dc: &Arc<RTCDataChannel>, msg_type: MessageType, payload: Option<&[u8]>) {
    let frame = encode_message(msg_type, payload);
    if let Err(e) = dc.send(&Bytes::from(frame)).await {
        tracing::debug!(error = %e, "data channel send failed");
    }
}
