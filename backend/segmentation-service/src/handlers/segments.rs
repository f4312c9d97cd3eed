use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::debug;
use validator::Validate;

use super::AppState;
use crate::error::{AppError, Result};
use crate::services::clustering::{ClusteringObjective, DistanceMetric, Linkage};
use crate::services::pipeline::SegmentationRequest;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    #[validate(length(min = 1, max = 10000))]
    pub user_ids: Vec<String>,
    #[validate(range(min = 2, max = 100))]
    pub num_clusters: Option<usize>,
    pub linkage_criteria: Option<Linkage>,
    pub distance_metric: Option<DistanceMetric>,
    #[validate(range(min = 1, max = 1000))]
    pub min_cluster_size: Option<usize>,
    #[validate(range(min = 2, max = 100))]
    pub max_clusters: Option<usize>,
    pub objective: Option<ClusteringObjective>,
    #[serde(default = "default_scale_features")]
    pub scale_features: bool,
    /// When false, `numClusters` must be given
    #[serde(default = "default_find_optimal")]
    pub find_optimal_clusters: bool,
}

fn default_scale_features() -> bool {
    true
}

fn default_find_optimal() -> bool {
    true
}

/// POST /api/v1/segments/cluster
pub async fn cluster_users(
    state: web::Data<AppState>,
    body: web::Json<ClusterRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let mut clustering = state.service.settings().clustering_defaults();
    if let Some(linkage) = request.linkage_criteria {
        clustering.linkage = linkage;
    }
    if let Some(metric) = request.distance_metric {
        clustering.metric = metric;
    }
    if let Some(min) = request.min_cluster_size {
        clustering.min_cluster_size = min;
    }
    if let Some(max) = request.max_clusters {
        clustering.max_clusters = max;
    }
    clustering.num_clusters = request.num_clusters;
    if clustering.num_clusters.is_none() && !request.find_optimal_clusters {
        return Err(AppError::Validation(
            "numClusters is required when findOptimalClusters is false".to_string(),
        ));
    }

    debug!(
        users = request.user_ids.len(),
        num_clusters = ?clustering.num_clusters,
        linkage = clustering.linkage.as_str(),
        metric = clustering.metric.as_str(),
        "Cluster request"
    );

    let run = state
        .service
        .cluster_users(SegmentationRequest {
            user_ids: request.user_ids,
            clustering,
            objective: request.objective,
            scale_features: request.scale_features,
            adaptive_cluster_count: false,
        })
        .await?;

    Ok(HttpResponse::Ok().json(&run.result))
}

/// GET /api/v1/segments/catalog
pub async fn get_catalog(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.service.catalog())
}
