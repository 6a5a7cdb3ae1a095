//! Control-plane WebSocket pipe (C10), §4.1, §6.
//!
//! The integrator has already authenticated at the HTTP-upgrade boundary
//! (the `AuthUser` extractor below); the first message on the socket is
//! expected to be `join`, after which this task becomes a relay between
//! the socket and the session's `rtc` queues until `leave`/`close`/EOF.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use meshcall_protocol::ws::{ClientEnvelope, HelloData, ServerEnvelope};

use crate::auth::AuthUser;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>, _auth: AuthUser) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let session = loop {
        match receiver.next().await {
            Some(Ok(Message::Binary(bytes))) => match ClientEnvelope::decode_msgpack(&bytes) {
                Ok(ClientEnvelope::Join(join)) => match state.sfu.init_session(&join).await {
                    Ok(session) => break session,
                    Err(e) => {
                        tracing::warn!(error = %e, "init_session failed");
                        let _ = send_envelope(
                            &mut sender,
                            &ServerEnvelope::Error(meshcall_protocol::ws::ErrorData {
                                message: "failed to initialize session".to_string(),
                            }),
                        )
                        .await;
                        return;
                    }
                },
                Ok(_) => {
                    tracing::debug!("ignoring non-join envelope before join");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "malformed envelope before join");
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "ws read error before join");
                return;
            }
        }
    };

    let conn_id = Uuid::new_v4();
    if send_envelope(&mut sender, &ServerEnvelope::Hello(HelloData { conn_id })).await.is_err() {
        state.sfu.close_session(&session.session_id).await;
        return;
    }

    let Some(mut ws_out_rx) = session.take_ws_out_rx().await else {
        state.sfu.close_session(&session.session_id).await;
        return;
    };
    let mut close_rx = session.subscribe_close();

    let forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = close_rx.recv() => break,
                msg = ws_out_rx.recv() => match msg {
                    Some(msg) => {
                        if send_envelope(&mut sender, &ServerEnvelope::Rtc(msg)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(bytes)) => match ClientEnvelope::decode_msgpack(&bytes) {
                Ok(ClientEnvelope::Rtc(msg)) => state.sfu.handle_control_message(msg).await,
                Ok(ClientEnvelope::Leave(_)) | Ok(ClientEnvelope::Close(_)) => break,
                Ok(ClientEnvelope::Reconnect(_)) => {
                    tracing::debug!(session_id = %session.session_id, "reconnect requested, not yet supported");
                }
                Ok(_) => {
                    tracing::debug!(session_id = %session.session_id, "unexpected envelope type, discarding (§7.4)");
                }
                Err(e) => {
                    tracing::debug!(session_id = %session.session_id, error = %e, "bad ws envelope, discarding");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(session_id = %session.session_id, error = %e, "ws read error");
                break;
            }
            _ => {}
        }
    }

    state.sfu.close_session(&session.session_id).await;
    forward_task.abort();
}

async fn send_envelope(
    sender: &mut SplitSink<WebSocket, Message>,
    envelope: &ServerEnvelope,
) -> Result<(), axum::Error> {
    let bytes = match envelope.encode_msgpack() {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode outbound envelope");
            return Ok(());
        }
    };
    sender.send(Message::Binary(bytes.into())).await
}
