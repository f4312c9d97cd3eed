// ============================================
// Segmentation Pipeline (分群推薦主流程)
// ============================================
//
// Cluster a cohort:
//   user ids ─► extract (timeout, bounded concurrency) ─► engineer
//            ─► prepare ─► [spawn_blocking] cluster + characterize
//
// Recommend for a user:
//   target + active cohort ─► cluster (same path) ─► peers in the
//   user's segment ─► score catalog
//
// Every run recomputes from the current log snapshot. Identical cohorts
// share one computation through the segment cache when it is enabled.

use crate::config::Config;
use crate::db::InteractionStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::services::cache::SegmentCache;
use crate::services::clustering::{
    AgglomerativeClustering, ClusteringConfig, ClusteringDataset, ClusteringObjective,
    ClusteringPreparer, ClusteringQuality, ClusteringResult, DistanceMetric,
    FeatureCorrelationReport, FeatureStatistics, Linkage,
};
use crate::services::features::{
    CohortContext, ExtractorConfig, Feature, FeatureEngineer, FeatureExtractor, FeatureGroup,
    FeatureVector, RawUserMetrics,
};
use crate::services::recommend::{
    ContextType, PeerActivity, RecommendOptions, Recommendation, SegmentRecommender, SegmentSize,
};
use crate::services::segments::{
    DominantFeature, EngagementLevel, RecommendationStrategy, SegmentCharacterizer, UserType,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Pipeline tunables drawn from service configuration
#[derive(Debug, Clone)]
pub struct SegmentationSettings {
    pub extraction_timeout: Duration,
    pub extraction_concurrency: usize,
    pub lookback_days: i64,
    pub cohort_sample_size: usize,
    pub candidate_pool_size: usize,
    pub default_min_cluster_size: usize,
    pub default_max_clusters: usize,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SegmentationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extraction_timeout: config.extraction_timeout(),
            extraction_concurrency: config.extraction_concurrency.max(1),
            lookback_days: config.lookback_days,
            cohort_sample_size: config.cohort_sample_size,
            candidate_pool_size: config.candidate_pool_size,
            default_min_cluster_size: config.default_min_cluster_size,
            default_max_clusters: config.default_max_clusters,
        }
    }

    pub fn clustering_defaults(&self) -> ClusteringConfig {
        ClusteringConfig {
            min_cluster_size: self.default_min_cluster_size,
            max_clusters: self.default_max_clusters,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentationRequest {
    pub user_ids: Vec<String>,
    pub clustering: ClusteringConfig,
    pub objective: Option<ClusteringObjective>,
    pub scale_features: bool,
    /// Cap the requested cluster count to what the valid cohort can hold
    /// instead of failing (used for recommendations)
    pub adaptive_cluster_count: bool,
}

impl SegmentationRequest {
    /// Cohort signature: sorted ids plus every parameter that changes the result
    fn signature(&self) -> String {
        let mut ids: Vec<&str> = self.user_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        format!(
            "{}|k={:?}|{}|{}|min={}|max={}|obj={}|scale={}|adaptive={}",
            ids.join(","),
            self.clustering.num_clusters,
            self.clustering.linkage.as_str(),
            self.clustering.metric.as_str(),
            self.clustering.min_cluster_size,
            self.clustering.max_clusters,
            self.objective.map_or("none", |o| o.as_str()),
            self.scale_features,
            self.adaptive_cluster_count,
        )
    }
}

/// Everything one clustering run produced
#[derive(Debug, Clone)]
pub struct SegmentationRun {
    pub metrics: Vec<RawUserMetrics>,
    pub dataset: ClusteringDataset,
    pub result: ClusteringResult,
    /// Requested users dropped for having no activity at all
    pub excluded_users: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub options: RecommendOptions,
    pub segment_size: SegmentSize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSegment {
    pub cluster_id: usize,
    pub cluster_size: usize,
    pub user_type: UserType,
    pub engagement_level: EngagementLevel,
    pub recommendation_strategy: RecommendationStrategy,
    pub dominant_features: Vec<DominantFeature>,
    pub behavior_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringInfo {
    pub num_clusters: usize,
    pub silhouette_score: f64,
    pub clustering_quality: ClusteringQuality,
    pub total_users: usize,
    pub linkage_criteria: Linkage,
    pub distance_metric: DistanceMetric,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub user_segment: UserSegment,
    pub clustering_info: ClusteringInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureInfo {
    pub name: Feature,
    pub group: FeatureGroup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveInfo {
    pub name: ClusteringObjective,
    pub description: &'static str,
    pub features: Vec<Feature>,
}

/// Static configuration surface exposed to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub objectives: Vec<ObjectiveInfo>,
    pub linkage_criteria: Vec<Linkage>,
    pub distance_metrics: Vec<DistanceMetric>,
    pub context_types: Vec<ContextType>,
    pub features: Vec<FeatureInfo>,
}

pub struct SegmentationService {
    store: Arc<dyn InteractionStore>,
    extractor: FeatureExtractor,
    engineer: FeatureEngineer,
    preparer: ClusteringPreparer,
    characterizer: SegmentCharacterizer,
    recommender: SegmentRecommender,
    cache: SegmentCache<SegmentationRun>,
    last_run: RwLock<Option<Arc<SegmentationRun>>>,
    settings: SegmentationSettings,
}

impl SegmentationService {
    pub fn new(
        store: Arc<dyn InteractionStore>,
        extractor_config: ExtractorConfig,
        settings: SegmentationSettings,
        cache: SegmentCache<SegmentationRun>,
    ) -> Self {
        Self {
            extractor: FeatureExtractor::new(Arc::clone(&store), extractor_config),
            store,
            engineer: FeatureEngineer::new(),
            preparer: ClusteringPreparer::new(),
            characterizer: SegmentCharacterizer::default(),
            recommender: SegmentRecommender::new(),
            cache,
            last_run: RwLock::new(None),
            settings,
        }
    }

    pub fn from_config(store: Arc<dyn InteractionStore>, config: &Config) -> Self {
        let extractor_config = ExtractorConfig {
            lookback_days: config.lookback_days,
            significant_hover_ms: config.significant_hover_ms,
            binge_gap_minutes: config.binge_gap_minutes,
        };
        Self::new(
            store,
            extractor_config,
            SegmentationSettings::from_config(config),
            SegmentCache::new(config.cache_enabled, config.cache_ttl()),
        )
    }

    pub fn settings(&self) -> &SegmentationSettings {
        &self.settings
    }

    /// Raw metrics for every user with activity, in request order, plus the
    /// ids skipped for having none. Any other failure aborts the cohort.
    pub async fn extract_cohort(
        &self,
        user_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<(Vec<RawUserMetrics>, Vec<String>)> {
        let timeout = self.settings.extraction_timeout;

        let outcomes: Vec<(String, Result<RawUserMetrics>)> = stream::iter(user_ids.iter().cloned())
            .map(|user_id| async move {
                let outcome =
                    match tokio::time::timeout(timeout, self.extractor.extract(&user_id, now)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(AppError::Timeout(format!(
                            "feature extraction for user {} exceeded {}ms",
                            user_id,
                            timeout.as_millis()
                        ))),
                    };
                (user_id, outcome)
            })
            .buffered(self.settings.extraction_concurrency)
            .collect()
            .await;

        let mut metrics = Vec::with_capacity(outcomes.len());
        let mut excluded = Vec::new();
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(raw) if raw.has_activity() => metrics.push(raw),
                Ok(_) | Err(AppError::DataUnavailable(_)) => {
                    warn!(user_id = %user_id, "Skipping user without activity");
                    excluded.push(user_id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok((metrics, excluded))
    }

    /// Engineered vectors, with cohort-relative indicators computed against this cohort
    pub fn engineer_features(&self, metrics: &[RawUserMetrics]) -> Vec<FeatureVector> {
        let cohort = CohortContext::from_metrics(metrics);
        metrics
            .iter()
            .map(|raw| self.engineer.engineer(raw, &cohort))
            .collect()
    }

    pub async fn cluster_users(&self, request: SegmentationRequest) -> Result<Arc<SegmentationRun>> {
        let outcome = self.cluster_users_inner(request).await;
        match &outcome {
            Ok(run) => {
                metrics::record_run("success");
                *self.last_run.write().await = Some(Arc::clone(run));
            }
            Err(e) => metrics::record_run(outcome_label(e)),
        }
        outcome
    }

    async fn cluster_users_inner(&self, mut request: SegmentationRequest) -> Result<Arc<SegmentationRun>> {
        let mut seen = HashSet::new();
        request.user_ids.retain(|id| seen.insert(id.clone()));
        if request.user_ids.is_empty() {
            return Err(AppError::Validation("userIds must not be empty".to_string()));
        }

        // Every check is monotone in cohort size, so failing on the requested
        // ids means failing on the valid subset too
        if !request.adaptive_cluster_count {
            AgglomerativeClustering::new(request.clustering.clone())
                .validate(request.user_ids.len())?;
        }

        self.cache.purge_expired();
        let key = request.signature();
        self.cache
            .get_or_compute(&key, || self.compute_run(request, Utc::now()))
            .await
    }

    async fn compute_run(
        &self,
        request: SegmentationRequest,
        now: DateTime<Utc>,
    ) -> Result<SegmentationRun> {
        let (metrics, excluded_users) = self.extract_cohort(&request.user_ids, now).await?;
        if metrics.len() < 2 {
            return Err(AppError::InsufficientData(format!(
                "{} of {} requested users have logged activity; at least 2 are needed",
                metrics.len(),
                request.user_ids.len()
            )));
        }

        let vectors = self.engineer_features(&metrics);
        let dataset = self
            .preparer
            .prepare(&vectors, request.objective, request.scale_features)?;

        let mut config = request.clustering.clone();
        if request.adaptive_cluster_count {
            config.num_clusters = fit_cluster_count(
                config.num_clusters,
                dataset.len(),
                config.min_cluster_size,
            );
        }

        let linkage = config.linkage;
        let characterizer = self.characterizer.clone();
        let started = Instant::now();
        let (dataset, result) = tokio::task::spawn_blocking(move || {
            let mut result = AgglomerativeClustering::new(config).fit(&dataset)?;
            characterizer.characterize_all(&mut result, &dataset);
            Ok::<_, crate::services::clustering::ClusteringError>((dataset, result))
        })
        .await??;
        let elapsed = started.elapsed();

        metrics::observe_clustering(linkage.as_str(), elapsed, dataset.len());
        info!(
            cohort_size = dataset.len(),
            excluded = excluded_users.len(),
            clusters = result.metadata.num_clusters,
            silhouette = result.metadata.silhouette_score,
            linkage = linkage.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Clustering run completed"
        );

        Ok(SegmentationRun {
            metrics,
            dataset,
            result,
            excluded_users,
        })
    }

    pub async fn recommend(&self, request: RecommendationRequest) -> Result<RecommendationResponse> {
        if request.options.count == 0 {
            return Err(AppError::Validation("count must be at least 1".to_string()));
        }
        if !self.store.user_exists(&request.user_id).await? {
            return Err(AppError::NotFound(format!("user {}", request.user_id)));
        }

        let since = Utc::now() - ChronoDuration::days(self.settings.lookback_days);
        let active = self
            .store
            .list_active_users(since, self.settings.cohort_sample_size)
            .await?;

        let mut cohort = vec![request.user_id.clone()];
        cohort.extend(active.into_iter().filter(|id| *id != request.user_id));
        cohort.truncate(self.settings.cohort_sample_size.max(2));
        debug!(user_id = %request.user_id, cohort_size = cohort.len(), "Assembled recommendation cohort");

        let mut clustering = self.settings.clustering_defaults();
        clustering.num_clusters = request.segment_size.num_clusters();

        let run = self
            .cluster_users(SegmentationRequest {
                user_ids: cohort,
                clustering,
                objective: None,
                scale_features: true,
                adaptive_cluster_count: true,
            })
            .await?;

        if run.excluded_users.contains(&request.user_id) {
            return Err(AppError::InsufficientData(format!(
                "user {} has no recorded activity to segment",
                request.user_id
            )));
        }

        let cluster = run.result.cluster_of(&request.user_id).ok_or_else(|| {
            AppError::Internal(format!("user {} missing from clustering result", request.user_id))
        })?;
        let characteristics = cluster.characteristics.as_ref().ok_or_else(|| {
            AppError::Internal(format!("cluster {} was not characterized", cluster.cluster_id))
        })?;

        let by_user: HashMap<&str, &RawUserMetrics> =
            run.metrics.iter().map(|m| (m.user_id.as_str(), m)).collect();
        let target = by_user.get(request.user_id.as_str()).copied().ok_or_else(|| {
            AppError::Internal(format!("metrics for user {} missing", request.user_id))
        })?;
        let peers = PeerActivity::from_peers(
            cluster
                .user_ids
                .iter()
                .filter(|id| **id != request.user_id)
                .filter_map(|id| by_user.get(id.as_str()).copied()),
        );

        let candidates = self
            .store
            .fetch_candidate_items(
                self.settings.candidate_pool_size,
                request.options.exclude_viewed.then(|| request.user_id.clone()),
            )
            .await?;
        let recommendations = self.recommender.recommend(
            target,
            cluster,
            characteristics,
            &peers,
            &candidates,
            &request.options,
        );

        metrics::record_recommendations(
            characteristics.recommendation_strategy.as_str(),
            recommendations.len(),
        );
        info!(
            user_id = %request.user_id,
            cluster_id = cluster.cluster_id,
            strategy = characteristics.recommendation_strategy.as_str(),
            peers = peers.peer_count(),
            returned = recommendations.len(),
            "Generated segment-aware recommendations"
        );

        let metadata = &run.result.metadata;
        Ok(RecommendationResponse {
            recommendations,
            user_segment: UserSegment {
                cluster_id: cluster.cluster_id,
                cluster_size: cluster.cluster_size,
                user_type: characteristics.user_type,
                engagement_level: characteristics.engagement_level,
                recommendation_strategy: characteristics.recommendation_strategy,
                dominant_features: characteristics.dominant_features.clone(),
                behavior_patterns: characteristics.behavior_patterns.clone(),
            },
            clustering_info: ClusteringInfo {
                num_clusters: metadata.num_clusters,
                silhouette_score: metadata.silhouette_score,
                clustering_quality: metadata.clustering_quality,
                total_users: metadata.total_users,
                linkage_criteria: metadata.linkage_criteria,
                distance_metric: metadata.distance_metric,
            },
        })
    }

    async fn latest_run(&self) -> Result<Arc<SegmentationRun>> {
        self.last_run
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::NotFound("no clustering run has completed yet".to_string()))
    }

    pub async fn correlation_report(&self) -> Result<FeatureCorrelationReport> {
        let run = self.latest_run().await?;
        Ok(self.preparer.correlation_report(&run.dataset))
    }

    pub async fn feature_statistics(&self) -> Result<Vec<FeatureStatistics>> {
        let run = self.latest_run().await?;
        Ok(self.preparer.feature_statistics(&run.dataset))
    }

    pub fn catalog(&self) -> Catalog {
        Catalog {
            objectives: ClusteringObjective::ALL
                .iter()
                .map(|objective| ObjectiveInfo {
                    name: *objective,
                    description: objective.description(),
                    features: objective.weights().into_iter().map(|(f, _)| f).collect(),
                })
                .collect(),
            linkage_criteria: Linkage::ALL.to_vec(),
            distance_metrics: DistanceMetric::ALL.to_vec(),
            context_types: vec![
                ContextType::Homepage,
                ContextType::Category,
                ContextType::Search,
                ContextType::VideoPage,
            ],
            features: Feature::ALL
                .iter()
                .map(|feature| FeatureInfo {
                    name: *feature,
                    group: feature.group(),
                })
                .collect(),
        }
    }
}

/// Requested k capped to what `n` users of `min_size` can hold; None (search)
/// when fewer than two clusters fit
fn fit_cluster_count(requested: Option<usize>, n: usize, min_size: usize) -> Option<usize> {
    let k = requested?;
    let capacity = (n / min_size.max(1)).min(n);
    let k = k.min(capacity);
    if k >= 2 {
        Some(k)
    } else {
        None
    }
}

fn outcome_label(err: &AppError) -> &'static str {
    match err {
        AppError::Validation(_) => "validation",
        AppError::InsufficientData(_) | AppError::DataUnavailable(_) => "insufficient_data",
        AppError::NotFound(_) => "not_found",
        AppError::Computation(_) => "computation",
        AppError::Timeout(_) => "timeout",
        AppError::Database(_) | AppError::Internal(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryInteractionStore, MockInteractionStore};
    use crate::models::CandidateItem;
    use crate::models::ViewingSession;

    fn views(category: &str, count: usize, completion: f64) -> Vec<ViewingSession> {
        let start = Utc::now() - ChronoDuration::days(2);
        (0..count)
            .map(|i| ViewingSession {
                video_id: format!("{}-{}", category, i),
                category: Some(category.to_string()),
                watch_seconds: 600.0 * completion,
                video_duration_seconds: 600.0,
                completion_rate: completion,
                pause_count: 0,
                seek_count: 0,
                from_playlist: false,
                started_at: start + ChronoDuration::minutes(12 * i as i64),
            })
            .collect()
    }

    fn quiet_store() -> MockInteractionStore {
        let mut store = MockInteractionStore::new();
        store
            .expect_fetch_search_queries()
            .returning(|_, _| Ok(Vec::new()));
        store.expect_fetch_feedback().returning(|_, _| Ok(Vec::new()));
        store
            .expect_fetch_hover_events()
            .returning(|_, _| Ok(Vec::new()));
        store
            .expect_fetch_navigation_events()
            .returning(|_, _| Ok(Vec::new()));
        store
    }

    fn service(store: MockInteractionStore) -> SegmentationService {
        SegmentationService::new(
            Arc::new(store),
            ExtractorConfig::default(),
            SegmentationSettings::default(),
            SegmentCache::disabled(),
        )
    }

    #[tokio::test]
    async fn test_extract_cohort_skips_users_without_activity() {
        let mut store = quiet_store();
        store
            .expect_fetch_viewing_sessions()
            .returning(|user_id, _| match user_id {
                "ghost" => Ok(Vec::new()),
                _ => Ok(views("math", 3, 0.9)),
            });

        let ids = vec!["a".to_string(), "ghost".to_string(), "b".to_string()];
        let (metrics, excluded) = service(store)
            .extract_cohort(&ids, Utc::now())
            .await
            .unwrap();

        assert_eq!(
            metrics.iter().map(|m| m.user_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(excluded, vec!["ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_store_errors_abort_extraction() {
        let mut store = quiet_store();
        store
            .expect_fetch_viewing_sessions()
            .returning(|_, _| Err(AppError::Database("connection reset".into())));

        let result = service(store)
            .extract_cohort(&["a".to_string()], Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_too_many_clusters_rejected_before_any_read() {
        // No expectations: any store call would panic
        let service = service(MockInteractionStore::new());
        let request = SegmentationRequest {
            user_ids: (0..5).map(|i| format!("u{}", i)).collect(),
            clustering: ClusteringConfig {
                num_clusters: Some(10),
                ..Default::default()
            },
            objective: None,
            scale_features: true,
            adaptive_cluster_count: false,
        };

        let result = service.cluster_users(request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cluster_users_end_to_end() {
        let mut store = quiet_store();
        store
            .expect_fetch_viewing_sessions()
            .returning(|user_id, _| {
                if user_id.starts_with("heavy") {
                    Ok(views("math", 12, 0.95))
                } else {
                    Ok(views("art", 1, 0.2))
                }
            });

        let service = service(store);
        let user_ids = ["heavy1", "heavy2", "heavy3", "light1", "light2", "light3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let run = service
            .cluster_users(SegmentationRequest {
                user_ids,
                clustering: ClusteringConfig {
                    num_clusters: Some(2),
                    ..Default::default()
                },
                objective: None,
                scale_features: true,
                adaptive_cluster_count: false,
            })
            .await
            .unwrap();

        assert_eq!(run.result.metadata.num_clusters, 2);
        assert_eq!(run.result.metadata.total_users, 6);
        let heavy = run.result.cluster_of("heavy1").unwrap();
        assert!(heavy.user_ids.contains(&"heavy3".to_string()));
        assert!(!heavy.user_ids.contains(&"light1".to_string()));
        assert!(heavy.characteristics.is_some());

        // Diagnostics now reflect this run
        let stats = service.feature_statistics().await.unwrap();
        assert_eq!(stats.len(), Feature::ALL.len());
    }

    #[tokio::test]
    async fn test_recommend_unknown_user_is_not_found() {
        let mut store = MockInteractionStore::new();
        store.expect_user_exists().returning(|_| Ok(false));

        let result = service(store)
            .recommend(RecommendationRequest {
                user_id: "nobody".into(),
                options: RecommendOptions::default(),
                segment_size: SegmentSize::Auto,
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    fn catalog_item(item_id: &str, category: &str) -> CandidateItem {
        CandidateItem {
            item_id: item_id.to_string(),
            title: item_id.to_string(),
            category: Some(category.to_string()),
            average_rating: 4.0,
            duration_seconds: 600.0,
            view_count: 100,
            is_series: false,
        }
    }

    #[tokio::test]
    async fn test_small_pool_still_reaches_unviewed_items() {
        let mut store = InMemoryInteractionStore::new();
        for id in ["heavy1", "heavy2", "heavy3"] {
            store = store.with_views(id, views("math", 12, 0.95));
        }
        for id in ["light1", "light2", "light3"] {
            store = store.with_views(id, views("art", 1, 0.2));
        }
        // The two most popular items are already watched by heavy1
        let store = store.with_items(vec![
            catalog_item("math-0", "math"),
            catalog_item("math-1", "math"),
            catalog_item("unseen", "math"),
        ]);

        let service = SegmentationService::new(
            Arc::new(store),
            ExtractorConfig::default(),
            SegmentationSettings {
                candidate_pool_size: 2,
                ..Default::default()
            },
            SegmentCache::disabled(),
        );
        let response = service
            .recommend(RecommendationRequest {
                user_id: "heavy1".into(),
                options: RecommendOptions::default(),
                segment_size: SegmentSize::Auto,
            })
            .await
            .unwrap();

        let ids: Vec<&str> = response
            .recommendations
            .iter()
            .map(|r| r.item_id.as_str())
            .collect();
        assert_eq!(ids, vec!["unseen"]);
    }

    #[tokio::test]
    async fn test_diagnostics_before_first_run() {
        let service = service(MockInteractionStore::new());
        assert!(matches!(
            service.correlation_report().await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_fit_cluster_count() {
        assert_eq!(fit_cluster_count(Some(8), 40, 2), Some(8));
        assert_eq!(fit_cluster_count(Some(8), 10, 2), Some(5));
        assert_eq!(fit_cluster_count(Some(3), 3, 2), None);
        assert_eq!(fit_cluster_count(None, 100, 2), None);
    }

    #[test]
    fn test_signature_ignores_id_order() {
        let request = |ids: &[&str]| SegmentationRequest {
            user_ids: ids.iter().map(|s| s.to_string()).collect(),
            clustering: ClusteringConfig::default(),
            objective: Some(ClusteringObjective::TemporalPatterns),
            scale_features: true,
            adaptive_cluster_count: false,
        };
        assert_eq!(request(&["b", "a"]).signature(), request(&["a", "b"]).signature());
    }
}
