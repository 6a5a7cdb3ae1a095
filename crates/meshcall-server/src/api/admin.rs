//! `/version`, `/system`, `/stats`, `/calls/{callID}/sessions/{sessionID}` (C13, §6).

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::sfu::SessionState;
use crate::state::AppState;

pub async fn version(State(state): State<AppState>) -> Json<crate::build_info::BuildInfo> {
    Json(state.build_info.clone())
}

pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub cpu_load: f64,
}

pub async fn system() -> Json<SystemInfo> {
    Json(SystemInfo { cpu_load: system_load_average() })
}

#[cfg(target_os = "linux")]
fn system_load_average() -> f64 {
    std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|s| s.split_whitespace().next().map(str::to_string))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

#[cfg(not(target_os = "linux"))]
fn system_load_average() -> f64 {
    0.0
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub calls: usize,
    pub sessions: usize,
}

pub async fn stats(State(state): State<AppState>, _auth: AuthUser) -> Json<StatsResponse> {
    let registry = state.sfu.registry();
    Json(StatsResponse { calls: registry.group_count().await, sessions: registry.session_count().await })
}

#[derive(Debug, Serialize)]
pub struct SessionConfig {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub state: String,
}

pub async fn get_session(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((call_id, session_id)): Path<(String, String)>,
) -> Result<Json<SessionConfig>> {
    let session = state
        .sfu
        .registry()
        .get_session_by_id(&session_id)
        .await
        .filter(|s| s.call_id == call_id)
        .ok_or_else(|| AppError::NotFound(format!("no session {session_id} in call {call_id}")))?;

    let state_name = match session.state().await {
        SessionState::Initializing => "initializing",
        SessionState::Connected => "connected",
        SessionState::Disconnected => "disconnected",
        SessionState::Failed => "failed",
        SessionState::Closed => "closed",
    };

    Ok(Json(SessionConfig {
        group_id: session.group_id.clone(),
        call_id: session.call_id.clone(),
        user_id: session.user_id.clone(),
        session_id: session.session_id.clone(),
        state: state_name.to_string(),
    }))
}
