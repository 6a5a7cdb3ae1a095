//! Application state shared across the HTTP/WebSocket surface (§4.14).

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::api::client_store::ClientStore;
use crate::build_info::BuildInfo;
use crate::config::Config;
use crate::error::SfuError;
use crate::sfu::SfuServer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sfu: Arc<SfuServer>,
    pub client_store: Arc<ClientStore>,
    pub build_info: BuildInfo,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub async fn new(config: Config, metrics_handle: PrometheusHandle) -> Result<Self, SfuError> {
        let sfu = SfuServer::new(&config).await?;
        let client_store = Arc::new(ClientStore::new());

        if config.api.security.enable_admin {
            client_store.seed_admin("admin", &config.api.security.admin_secret_key).await;
        }

        Ok(Self {
            config: Arc::new(config),
            sfu,
            client_store,
            build_info: BuildInfo::collect(),
            metrics_handle,
        })
    }
}
