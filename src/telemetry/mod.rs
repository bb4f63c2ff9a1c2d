//! Telemetry module
//!
//! Structured logging and Prometheus metrics

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use self::metrics::{
    record_count, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize logging and, when a port is configured, the Prometheus exporter.
///
/// Must be called from within the tokio runtime.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level, LogFormat::from_json_flag(config.json_logs))?;

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    Ok(())
}
