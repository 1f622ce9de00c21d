use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Progress store (backend-as-a-service tables)
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of progress store operations",
        &["operation", "table", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Progress store operation duration in seconds",
        &["operation", "table"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap();

    // External services
    pub static ref RECOGNITION_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "recognition_requests_total",
        "Total number of handwriting recognition requests",
        &["status"]
    )
    .unwrap();

    pub static ref JUDGE_FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "judge_fallbacks_total",
        "Remote judge failures absorbed into a local default",
        &["check"]
    )
    .unwrap();

    pub static ref LLM_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "llm_requests_total",
        "Total number of enrichment LLM calls",
        &["purpose", "status"]
    )
    .unwrap();

    // Business Metrics
    pub static ref STEPS_VALIDATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "steps_validated_total",
        "Total number of validated steps",
        &["judge", "outcome"]
    )
    .unwrap();

    pub static ref PROBLEMS_SOLVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "problems_solved_total",
        "Total number of solved attempts",
        &["first_time"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sessions_active",
        "Number of currently open problem sessions"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track progress store operation with metrics
pub async fn track_store_operation<F, T, E>(operation: &str, table: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, table, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn test_track_store_operation_counts_errors() {
        let before = STORE_OPERATIONS_TOTAL
            .with_label_values(&["select", "metrics_test", "error"])
            .get();

        let result: Result<(), &str> =
            track_store_operation("select", "metrics_test", async { Err("down") }).await;

        assert!(result.is_err());
        assert_eq!(
            STORE_OPERATIONS_TOTAL
                .with_label_values(&["select", "metrics_test", "error"])
                .get(),
            before + 1
        );
    }
}
