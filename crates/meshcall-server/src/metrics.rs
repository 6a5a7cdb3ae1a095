//! Prometheus metrics exposition (§4.14, §4.15, §6).
//!
//! Installs the `metrics` crate's global recorder once at startup; the
//! `rtcd_*` counters/gauges/histograms named throughout `sfu/` (signaling
//! lock hold time, data-channel loss/RTT/jitter) are recorded at their own
//! call sites via the `metrics::{counter,gauge,histogram}!` macros and
//! simply flow through whatever recorder is installed here.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::SfuError;

/// Installs the global Prometheus recorder and returns a handle whose
/// `render()` backs the `/metrics` endpoint (§6).
pub fn install() -> Result<PrometheusHandle, SfuError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| SfuError::Config(format!("failed to install metrics recorder: {e}")))
}
