//! Bearer/Basic auth for the client/admin API (C13, §6, §7.6).
//!
//! Never leaks which of {unknown clientID, wrong authKey} failed — every
//! rejection collapses to the same generic `401 unauthorized`.

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    fn new(client_id: String, is_admin: bool, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self { sub: client_id, is_admin, exp: (now + Duration::hours(expires_in_hours)).timestamp(), iat: now.timestamp() }
    }
}

pub fn create_token(client_id: &str, is_admin: bool, secret: &str) -> Result<String, AppError> {
    let claims = Claims::new(client_id.to_string(), is_admin, 24 * 7);
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(AppError::from)
}

fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(AppError::from)
}

/// Extractor for authenticated requests: a `Bearer` token issued by
/// `/login`, or `Basic clientID:authKey` verified directly against the
/// client store (§6's "Basic `clientID:authKey` or `Bearer <token>`").
pub struct AuthUser {
    pub client_id: String,
    pub is_admin: bool,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        authenticate_header(state, header).await.ok_or(AppError::Unauthorized)
    }
}

/// Shared by the `AuthUser` extractor and by `/register`, which needs to
/// try authentication without failing the request when no header is
/// present at all (self-registration, §4.14).
pub async fn authenticate_header(state: &AppState, header: Option<&str>) -> Option<AuthUser> {
    let header = header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let claims = verify_token(token, &state.config.jwt_secret).ok()?;
        return Some(AuthUser { client_id: claims.sub, is_admin: claims.is_admin });
    }

    if let Some(encoded) = header.strip_prefix("Basic ") {
        let decoded = BASE64.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (client_id, auth_key) = decoded.split_once(':')?;
        let record = state.client_store.verify(client_id, auth_key).await?;
        return Some(AuthUser { client_id: record.client_id, is_admin: record.is_admin });
    }

    None
}
