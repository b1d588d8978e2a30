use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — Prometheus text exposition of the job counters.
pub async fn prometheus_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
