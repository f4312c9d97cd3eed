use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::debug;
use validator::Validate;

use super::AppState;
use crate::error::Result;
use crate::services::pipeline::RecommendationRequest;
use crate::services::recommend::{
    ContextType, RecommendOptions, SegmentSize, DEFAULT_RECOMMENDATION_COUNT,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_true")]
    pub exclude_viewed: bool,
    #[serde(default = "default_true")]
    pub include_exploration: bool,
    #[serde(default)]
    pub context_type: ContextType,
    #[serde(default)]
    pub segment_size: SegmentSize,
}

fn default_count() -> usize {
    DEFAULT_RECOMMENDATION_COUNT
}

fn default_true() -> bool {
    true
}

/// POST /api/v1/recommendations
pub async fn recommend(
    state: web::Data<AppState>,
    body: web::Json<RecommendRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    debug!(
        user_id = %request.user_id,
        count = request.count,
        context = request.context_type.as_str(),
        "Recommendation request"
    );

    let response = state
        .service
        .recommend(RecommendationRequest {
            user_id: request.user_id,
            options: RecommendOptions {
                count: request.count,
                exclude_viewed: request.exclude_viewed,
                include_exploration: request.include_exploration,
                context_type: request.context_type,
            },
            segment_size: request.segment_size,
        })
        .await?;

    Ok(HttpResponse::Ok().json(response))
}
