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

pub(crate) fn record_attempt_opened(resumed: bool) {
    if resumed {
        metrics::counter!("exam_attempts_resumed_total").increment(1);
    } else {
        metrics::counter!("exam_attempts_started_total").increment(1);
    }
}

pub(crate) fn record_attempt_finalized(outcome: &'static str) {
    metrics::counter!("exam_attempts_finalized_total", "outcome" => outcome).increment(1);
}
