pub mod admin;
pub mod auth;
pub mod client_store;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws;

/// Router for the client/admin API and the `/ws` control plane (C13, §6).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/register", post(auth::register))
        .route("/unregister", post(auth::unregister))
        .route("/login", post(auth::login))
        .route("/version", get(admin::version))
        .route("/system", get(admin::system))
        .route("/stats", get(admin::stats))
        .route("/calls/{call_id}/sessions/{session_id}", get(admin::get_session))
        .route("/ws", get(ws::handler::ws_handler))
        .route("/metrics", get(admin::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
