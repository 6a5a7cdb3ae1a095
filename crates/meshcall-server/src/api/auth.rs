//! `/register`, `/unregister`, `/login` handlers (C13, §6).

use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate_header, create_token};
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "authKey")]
    pub auth_key: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(rename = "clientID")]
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UnregisterRequest {
    #[serde(rename = "clientID")]
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "authKey")]
    pub auth_key: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(rename = "bearerToken")]
    pub bearer_token: String,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RegisterRequest>,
) -> Result<(axum::http::StatusCode, Json<RegisterResponse>)> {
    let caller = authenticate_header(&state, headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())).await;

    let self_registration_allowed = state.config.api.security.allow_self_registration;
    match (&caller, self_registration_allowed) {
        (Some(user), _) if user.is_admin => {}
        (None, true) => {}
        _ => return Err(AppError::Unauthorized),
    }

    use crate::api::client_store::ClientStoreError;
    state.client_store.register(&input.client_id, &input.auth_key).await.map_err(|e| match e {
        ClientStoreError::AuthKeyTooShort => AppError::BadRequest("authKey too short".into()),
        ClientStoreError::Duplicate => AppError::BadRequest("clientID already registered".into()),
        ClientStoreError::Unknown => unreachable!("register never returns Unknown"),
    })?;

    Ok((axum::http::StatusCode::CREATED, Json(RegisterResponse { client_id: input.client_id })))
}

pub async fn unregister(
    State(state): State<AppState>,
    caller: crate::auth::AuthUser,
    Json(input): Json<UnregisterRequest>,
) -> Result<()> {
    if input.client_id.is_empty() {
        return Err(AppError::BadRequest("clientID must not be empty".into()));
    }
    if !caller.is_admin && caller.client_id != input.client_id {
        return Err(AppError::Forbidden);
    }

    use crate::api::client_store::ClientStoreError;
    state.client_store.unregister(&input.client_id).await.map_err(|e| match e {
        ClientStoreError::Unknown => AppError::BadRequest("unknown clientID".into()),
        _ => unreachable!("unregister never returns a key-length/duplicate error"),
    })
}

pub async fn login(State(state): State<AppState>, Json(input): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let record = state
        .client_store
        .verify(&input.client_id, &input.auth_key)
        .await
        .ok_or_else(|| AppError::BadRequest("bad credentials".into()))?;

    let bearer_token = create_token(&record.client_id, record.is_admin, &state.config.jwt_secret)?;
    Ok(Json(LoginResponse { bearer_token }))
}
