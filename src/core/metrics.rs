use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn session_generated() {
    metrics::counter!("tryout_sessions_generated_total").increment(1);
}

pub(crate) fn answer_written(operation: &'static str) {
    metrics::counter!("tryout_answer_writes_total", "operation" => operation).increment(1);
}

pub(crate) fn category_ended(has_next: bool) {
    let outcome = if has_next { "advanced" } else { "last" };
    metrics::counter!("tryout_categories_ended_total", "outcome" => outcome).increment(1);
}

pub(crate) fn session_finalized(reason: &'static str) {
    metrics::counter!("tryout_sessions_finalized_total", "reason" => reason).increment(1);
}

pub(crate) fn sessions_reaped(count: u64) {
    metrics::counter!("tryout_sessions_reaped_total").increment(count);
}
