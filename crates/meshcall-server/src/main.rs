use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meshcall_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting meshcalld...");

    let config = meshcall_server::config::Config::load(None)?;
    let listen_address = config.api.http.listen_address.clone();

    let metrics_handle = meshcall_server::metrics::install()?;
    let app_state = meshcall_server::state::AppState::new(config, metrics_handle).await?;
    let app = meshcall_server::api::create_router(app_state.clone());

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    tracing::info!(%listen_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await?;

    Ok(())
}

/// Waits for SIGINT/SIGTERM, then drains every live session before
/// returning so `axum::serve` doesn't drop connections out from under
/// in-progress calls (§5).
async fn shutdown_signal(state: meshcall_server::state::AppState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining sessions...");
    state.sfu.close_all_sessions().await;
    tracing::info!("drain complete, exiting");
}
