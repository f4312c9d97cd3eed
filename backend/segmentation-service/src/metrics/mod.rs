//! Prometheus metrics for segmentation-service.
//!
//! Collectors for clustering runs, recommendations and the segment cache, plus
//! the handler behind `/metrics`.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Clustering pipeline runs by outcome (success / validation / insufficient_data / ...)
    static ref SEGMENTATION_RUNS: IntCounterVec = register_int_counter_vec!(
        "segmentation_runs_total",
        "Clustering pipeline runs by outcome",
        &["outcome"]
    )
    .expect("Prometheus metrics registration should succeed at startup");

    static ref CLUSTERING_DURATION: HistogramVec = register_histogram_vec!(
        "segmentation_clustering_duration_seconds",
        "Wall time of the clustering engine by linkage",
        &["linkage"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .expect("Prometheus metrics registration should succeed at startup");

    static ref COHORT_SIZE: Histogram = register_histogram!(
        "segmentation_cohort_size",
        "Users with valid feature vectors per clustering run",
        vec![2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0]
    )
    .expect("Prometheus metrics registration should succeed at startup");

    static ref RECOMMENDATIONS: IntCounterVec = register_int_counter_vec!(
        "segmentation_recommendations_total",
        "Recommendations served by segment strategy",
        &["strategy"]
    )
    .expect("Prometheus metrics registration should succeed at startup");

    static ref CACHE_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "segmentation_cache_requests_total",
        "Segment cache lookups by result (hit / miss)",
        &["result"]
    )
    .expect("Prometheus metrics registration should succeed at startup");
}

pub fn record_run(outcome: &str) {
    SEGMENTATION_RUNS.with_label_values(&[outcome]).inc();
}

pub fn observe_clustering(linkage: &str, elapsed: Duration, cohort_size: usize) {
    CLUSTERING_DURATION
        .with_label_values(&[linkage])
        .observe(elapsed.as_secs_f64());
    COHORT_SIZE.observe(cohort_size as f64);
}

pub fn record_recommendations(strategy: &str, count: usize) {
    RECOMMENDATIONS
        .with_label_values(&[strategy])
        .inc_by(count as u64);
}

pub fn record_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_REQUESTS.with_label_values(&[result]).inc();
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
