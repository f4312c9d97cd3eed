// ============================================
// Segment-Aware Recommendation (分群感知推薦)
// ============================================
//
// score = w_collab · peer consumption
//       + w_content · item/segment similarity
//       + w_explore · novelty against the user's history
//
// Weights come from the segment's strategy, rescaled by the request context
// and renormalized to sum to 1, so every score stays in [0, 1].

pub mod scorer;

pub use scorer::{PeerActivity, SegmentRecommender};

use crate::services::segments::{RecommendationStrategy, UserType};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECOMMENDATION_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    #[default]
    Homepage,
    Category,
    Search,
    VideoPage,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Homepage => "homepage",
            ContextType::Category => "category",
            ContextType::Search => "search",
            ContextType::VideoPage => "video_page",
        }
    }
}

/// Granularity of the segmentation used for a recommendation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSize {
    Small,
    Medium,
    Large,
    #[default]
    Auto,
}

impl SegmentSize {
    /// Cluster count to cut at; None searches for the best silhouette
    pub fn num_clusters(&self) -> Option<usize> {
        match self {
            SegmentSize::Small => Some(8),
            SegmentSize::Medium => Some(5),
            SegmentSize::Large => Some(3),
            SegmentSize::Auto => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendOptions {
    pub count: usize,
    pub exclude_viewed: bool,
    pub include_exploration: bool,
    pub context_type: ContextType,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_RECOMMENDATION_COUNT,
            exclude_viewed: true,
            include_exploration: true,
            context_type: ContextType::Homepage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermWeights {
    pub collaborative: f64,
    pub content: f64,
    pub exploration: f64,
}

impl TermWeights {
    pub fn for_strategy(strategy: RecommendationStrategy) -> Self {
        let (collaborative, content, exploration) = match strategy {
            RecommendationStrategy::PlaylistAndSeriesFocused => (0.45, 0.45, 0.10),
            RecommendationStrategy::DiversityAndDiscoveryFocused => (0.30, 0.25, 0.45),
            RecommendationStrategy::QualityAndCompletionFocused => (0.35, 0.55, 0.10),
            RecommendationStrategy::ExplorationWithRelevance => (0.35, 0.35, 0.30),
            RecommendationStrategy::PopularAndAccessible => (0.55, 0.30, 0.15),
        };
        Self {
            collaborative,
            content,
            exploration,
        }
    }

    /// Context rescaling, exploration switch, then renormalization
    pub fn adjusted(self, context: ContextType, include_exploration: bool) -> Self {
        let mut weights = self;
        match context {
            ContextType::Homepage => {}
            ContextType::Search => weights.content *= 1.2,
            ContextType::Category => weights.exploration *= 0.5,
            ContextType::VideoPage => weights.collaborative *= 1.2,
        }
        if !include_exploration {
            weights.exploration = 0.0;
        }

        let total = weights.collaborative + weights.content + weights.exploration;
        if total <= 0.0 {
            return Self {
                collaborative: 0.5,
                content: 0.5,
                exploration: 0.0,
            };
        }
        Self {
            collaborative: weights.collaborative / total,
            content: weights.content / total,
            exploration: weights.exploration / total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub cluster_id: usize,
    pub cluster_size: usize,
    pub user_type: UserType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub item_id: String,
    pub title: String,
    pub score: f64,
    pub segment_strategy: RecommendationStrategy,
    pub reasoning: String,
    pub cluster_info: ClusterInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(w: TermWeights) -> f64 {
        w.collaborative + w.content + w.exploration
    }

    #[test]
    fn test_adjusted_weights_sum_to_one() {
        let strategies = [
            RecommendationStrategy::PlaylistAndSeriesFocused,
            RecommendationStrategy::DiversityAndDiscoveryFocused,
            RecommendationStrategy::QualityAndCompletionFocused,
            RecommendationStrategy::ExplorationWithRelevance,
            RecommendationStrategy::PopularAndAccessible,
        ];
        let contexts = [
            ContextType::Homepage,
            ContextType::Category,
            ContextType::Search,
            ContextType::VideoPage,
        ];

        for strategy in strategies {
            for context in contexts {
                for explore in [true, false] {
                    let w = TermWeights::for_strategy(strategy).adjusted(context, explore);
                    assert!((sum(w) - 1.0).abs() < 1e-9);
                    if !explore {
                        assert_eq!(w.exploration, 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_diversity_strategy_upweights_exploration() {
        let diversity =
            TermWeights::for_strategy(RecommendationStrategy::DiversityAndDiscoveryFocused);
        let quality = TermWeights::for_strategy(RecommendationStrategy::QualityAndCompletionFocused);
        assert!(diversity.exploration > quality.exploration);
    }

    #[test]
    fn test_segment_size_mapping() {
        assert_eq!(SegmentSize::Small.num_clusters(), Some(8));
        assert_eq!(SegmentSize::Large.num_clusters(), Some(3));
        assert_eq!(SegmentSize::Auto.num_clusters(), None);
    }
}
