use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!("http_requests_total", "HTTP responses by status code");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency by status code"
    );
    describe_counter!("workflow_runs_started_total", "Workflow runs created, by kind");
    describe_counter!("workflow_runs_finished_total", "Workflow runs finished, by kind and status");
    describe_counter!("activity_attempts_total", "Activity attempts, by activity and outcome");
    describe_counter!("session_auto_completed_total", "Sessions completed by their deadline");
    describe_counter!("session_reminders_sent_total", "Reminders delivered to users");
    describe_counter!("session_scores_total", "Sessions scored");
}
