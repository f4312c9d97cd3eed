/// HTTP handlers for segmentation endpoints
///
/// - Segments: cluster a cohort, list supported objectives/linkages/metrics
/// - Recommendations: segment-aware recommendations for one user
/// - Diagnostics: feature correlations and statistics of the latest run
pub mod diagnostics;
pub mod recommendations;
pub mod segments;

use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::metrics::serve_metrics;
use crate::services::SegmentationService;

pub use diagnostics::{feature_correlations, feature_statistics};
pub use recommendations::recommend;
pub use segments::{cluster_users, get_catalog};

pub struct AppState {
    pub service: Arc<SegmentationService>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "segmentation-service",
    }))
}

/// Route table shared by the binary and the HTTP tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(serve_metrics))
        .service(
            web::scope("/api/v1")
                .route("/segments/cluster", web::post().to(cluster_users))
                .route("/segments/catalog", web::get().to(get_catalog))
                .route(
                    "/segments/diagnostics/correlations",
                    web::get().to(feature_correlations),
                )
                .route(
                    "/segments/diagnostics/feature-statistics",
                    web::get().to(feature_statistics),
                )
                .route("/recommendations", web::post().to(recommend)),
        );
}
