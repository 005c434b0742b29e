use axum::extract::State;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the pipeline metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("tasks_submitted_total", "Tasks accepted by the ingestion endpoint");
    metrics::describe_counter!("tasks_duplicate_total", "Submissions ignored as duplicates");
    metrics::describe_counter!("tasks_completed_total", "Tasks labeled successfully");
    metrics::describe_counter!("tasks_failed_total", "Tasks whose labeling failed");
    metrics::describe_counter!(
        "callback_deliveries_total",
        "Callback deliveries by outcome (delivered or failed)"
    );
    metrics::describe_histogram!(
        "task_processing_seconds",
        "Time from claim to recorded outcome for one task"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics — Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
