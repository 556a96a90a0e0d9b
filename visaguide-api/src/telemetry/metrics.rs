//! Prometheus Metrics Definitions
//!
//! Defines all VisaGuide metrics with their labels and exposes a /metrics
//! endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Generator latency buckets (seconds). Hosted models answer in seconds.
const GENERATOR_LATENCY_BUCKETS: &[f64] =
    &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<GuideMetrics>> = Lazy::new(GuideMetrics::new);

/// The global metrics, or `None` if registration failed.
///
/// Registration failure is logged once and otherwise ignored; instrumentation
/// never fails a request.
pub fn metrics() -> Option<&'static GuideMetrics> {
    static REPORTED: std::sync::Once = std::sync::Once::new();
    match METRICS.as_ref() {
        Ok(m) => Some(m),
        Err(e) => {
            REPORTED.call_once(|| tracing::error!(error = %e, "Metrics unavailable"));
            None
        }
    }
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Container for all VisaGuide metrics.
#[derive(Clone)]
pub struct GuideMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Coordinator decisions - labels: status
    pub coordinator_decisions_total: CounterVec,

    /// Regeneration job outcomes - labels: provider, outcome (ready/error)
    pub regeneration_jobs_total: CounterVec,

    /// Generator call latency - labels: provider
    pub generator_duration_seconds: HistogramVec,

    /// Bulk repopulation runs - labels: outcome (completed/aborted)
    pub repopulate_runs_total: CounterVec,

    /// Regeneration jobs currently running in this process
    pub inflight_jobs: Gauge,

    /// Current active mirror WebSocket connections
    pub websocket_connections: Gauge,
}

impl GuideMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "visaguide_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "visaguide_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            coordinator_decisions_total: register_counter_vec!(
                "visaguide_coordinator_decisions_total",
                "Target statuses decided by the request coordinator",
                &["status"]
            )
            .map_err(|e| registration_error("coordinator_decisions_total", e))?,

            regeneration_jobs_total: register_counter_vec!(
                "visaguide_regeneration_jobs_total",
                "Completed regeneration jobs",
                &["provider", "outcome"]
            )
            .map_err(|e| registration_error("regeneration_jobs_total", e))?,

            generator_duration_seconds: register_histogram_vec!(
                "visaguide_generator_duration_seconds",
                "Content generator call duration in seconds",
                &["provider"],
                GENERATOR_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("generator_duration_seconds", e))?,

            repopulate_runs_total: register_counter_vec!(
                "visaguide_repopulate_runs_total",
                "Bulk repopulation runs",
                &["outcome"]
            )
            .map_err(|e| registration_error("repopulate_runs_total", e))?,

            inflight_jobs: register_gauge!(
                "visaguide_inflight_jobs",
                "Regeneration jobs currently running in this process"
            )
            .map_err(|e| registration_error("inflight_jobs", e))?,

            websocket_connections: register_gauge!(
                "visaguide_websocket_connections",
                "Current number of active mirror WebSocket connections"
            )
            .map_err(|e| registration_error("websocket_connections", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_decision(&self, status: &str) {
        self.coordinator_decisions_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_job(&self, provider: &str, success: bool) {
        let outcome = if success { "ready" } else { "error" };
        self.regeneration_jobs_total
            .with_label_values(&[provider, outcome])
            .inc();
    }

    pub fn record_generation(&self, provider: &str, duration_secs: f64) {
        self.generator_duration_seconds
            .with_label_values(&[provider])
            .observe(duration_secs);
    }

    pub fn record_repopulate_run(&self, completed: bool) {
        let outcome = if completed { "completed" } else { "aborted" };
        self.repopulate_runs_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn job_started(&self) {
        self.inflight_jobs.inc();
    }

    pub fn job_finished(&self) {
        self.inflight_jobs.dec();
    }

    /// Increment WebSocket connection count.
    pub fn ws_connected(&self) {
        self.websocket_connections.inc();
    }

    /// Decrement WebSocket connection count.
    pub fn ws_disconnected(&self) {
        self.websocket_connections.dec();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so an idle process still exports its series.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
