use actix_web::{web, HttpResponse};

use super::AppState;
use crate::error::Result;

/// GET /api/v1/segments/diagnostics/correlations
pub async fn feature_correlations(state: web::Data<AppState>) -> Result<HttpResponse> {
    let report = state.service.correlation_report().await?;
    Ok(HttpResponse::Ok().json(report))
}

/// GET /api/v1/segments/diagnostics/feature-statistics
pub async fn feature_statistics(state: web::Data<AppState>) -> Result<HttpResponse> {
    let statistics = state.service.feature_statistics().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "features": statistics })))
}
