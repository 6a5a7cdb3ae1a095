//! `meshcall-server` library
//!
//! Exposes the SFU, its config/auth/metrics surfaces, and the HTTP/WebSocket
//! API for testing and embedding.

pub mod api;
pub mod auth;
pub mod build_info;
pub mod config;
pub mod error;
pub mod ice;
pub mod metrics;
pub mod sfu;
pub mod state;
pub mod ws;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

/// Builds the application router from a loaded config (§4.13, §6).
pub async fn create_app(config: config::Config, metrics_handle: PrometheusHandle) -> Result<axum::Router> {
    let app_state = state::AppState::new(config, metrics_handle).await?;
    Ok(api::create_router(app_state))
}
