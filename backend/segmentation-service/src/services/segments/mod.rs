// ============================================
// Segments (用戶分群畫像)
// ============================================
//
// Cluster + ClusteringDataset ──► SegmentCharacterizer ──► SegmentCharacteristics
//   userType (ordered decision table) → recommendationStrategy (lookup)

pub mod characterizer;

pub use characterizer::{SegmentCharacterizer, DEFAULT_DOMINANT_FEATURES, USER_TYPE_RULES};

use crate::services::features::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Behavioral archetype of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    BingeWatcher,
    ActiveExplorer,
    FocusedLearner,
    ContentExplorer,
    CasualViewer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::BingeWatcher => "binge_watcher",
            UserType::ActiveExplorer => "active_explorer",
            UserType::FocusedLearner => "focused_learner",
            UserType::ContentExplorer => "content_explorer",
            UserType::CasualViewer => "casual_viewer",
        }
    }

    pub fn strategy(&self) -> RecommendationStrategy {
        match self {
            UserType::BingeWatcher => RecommendationStrategy::PlaylistAndSeriesFocused,
            UserType::ActiveExplorer => RecommendationStrategy::DiversityAndDiscoveryFocused,
            UserType::FocusedLearner => RecommendationStrategy::QualityAndCompletionFocused,
            UserType::ContentExplorer => RecommendationStrategy::ExplorationWithRelevance,
            UserType::CasualViewer => RecommendationStrategy::PopularAndAccessible,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrategy {
    PlaylistAndSeriesFocused,
    DiversityAndDiscoveryFocused,
    QualityAndCompletionFocused,
    ExplorationWithRelevance,
    PopularAndAccessible,
}

impl RecommendationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStrategy::PlaylistAndSeriesFocused => "playlist_and_series_focused",
            RecommendationStrategy::DiversityAndDiscoveryFocused => {
                "diversity_and_discovery_focused"
            }
            RecommendationStrategy::QualityAndCompletionFocused => {
                "quality_and_completion_focused"
            }
            RecommendationStrategy::ExplorationWithRelevance => "exploration_with_relevance",
            RecommendationStrategy::PopularAndAccessible => "popular_and_accessible",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantFeature {
    pub feature: Feature,
    pub centroid_value: f64,
    pub global_mean: f64,
    /// Signed z-score of the cluster mean against the cohort
    pub deviation: f64,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCharacteristics {
    pub user_type: UserType,
    pub engagement_level: EngagementLevel,
    pub recommendation_strategy: RecommendationStrategy,
    pub dominant_features: Vec<DominantFeature>,
    pub content_preferences: Vec<String>,
    pub behavior_patterns: Vec<String>,
    /// Unscaled mean of every canonical feature over the members
    pub feature_profile: BTreeMap<Feature, f64>,
}

impl SegmentCharacteristics {
    pub fn profile_value(&self, feature: Feature) -> f64 {
        self.feature_profile.get(&feature).copied().unwrap_or(0.0)
    }
}
