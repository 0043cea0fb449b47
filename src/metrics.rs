//! Prometheus metrics registry, instruments, and the `/metrics` endpoint

use std::sync::Once;

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::get,
};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref FILES_SERVED_TOTAL: IntCounter = IntCounter::new(
        "gatehouse_files_served_total",
        "Total number of files served to authorized sessions"
    ).expect("metric can be created");

    pub static ref ALLOWLIST_RELOADS_TOTAL: IntCounter = IntCounter::new(
        "gatehouse_allowlist_reloads_total",
        "Total number of allow-list reloads from disk"
    ).expect("metric can be created");

    pub static ref SESSIONS_ISSUED_TOTAL: IntCounter = IntCounter::new(
        "gatehouse_sessions_issued_total",
        "Total number of sessions issued after OAuth login"
    ).expect("metric can be created");

    /// Error responses, labelled like `unauthorized`, `forbidden`, `not_found`
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatehouse_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(FILES_SERVED_TOTAL.clone()))
            .expect("FILES_SERVED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ALLOWLIST_RELOADS_TOTAL.clone()))
            .expect("ALLOWLIST_RELOADS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_ISSUED_TOTAL.clone()))
            .expect("SESSIONS_ISSUED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// Create metrics router
///
/// Exposes the `/metrics` endpoint.
/// Authorization is applied by the top-level router composition.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(metrics_handler))
}
