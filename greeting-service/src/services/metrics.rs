use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Counter incremented once per scheduled batch job run, labelled by `job`.
pub const BATCH_JOB_INVOCATIONS: &str = "batch_job_invocations_total";

/// Counter of authentication attempts, labelled by `outcome`.
pub const AUTHENTICATION_ATTEMPTS: &str = "authentication_attempts_total";

/// Install the global Prometheus recorder. Call once at startup; tests skip it, and
/// without a recorder every `metrics` macro is a no-op.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics recorder already initialized"))?;

    Ok(())
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}
