use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// HTTP-facing error taxonomy for the register/login/admin surface (§7.6).
/// Never leaks which of {unknown id, wrong key} failed.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AppError::Jwt(_) => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Internal SFU error taxonomy (§7.1-§7.7). Distinct from [`AppError`]:
/// these never cross the HTTP boundary directly, they drive session-local
/// recovery decisions (drop, abort-renegotiation, close-session, log-only).
#[derive(Error, Debug)]
pub enum SfuError {
    #[error("config: {0}")]
    Config(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("signaling conflict: dropping inbound offer")]
    SignalingGlare,

    #[error("signaling timeout after {0:?}")]
    SignalingTimeout(std::time::Duration),

    #[error("invalid sdp: {0}")]
    InvalidSdp(String),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("backpressure: {0} queue full, message dropped")]
    Backpressure(&'static str),

    #[error("unauthorized")]
    Auth,

    #[error("webrtc: {0}")]
    WebRtc(#[from] webrtc::Error),
}

pub type SfuResult<T> = std::result::Result<T, SfuError>;
