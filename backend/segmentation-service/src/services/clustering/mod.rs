// ============================================
// Hierarchical Clustering (階層式聚類)
// ============================================
//
// FeatureVector[] ──► ClusteringPreparer ──► ClusteringDataset
//                                               │
//                         AgglomerativeClustering (distance → dendrogram → cut)
//                                               │
//                                      ClusteringResult + quality indices

pub mod agglomerative;
pub mod distance;
pub mod preparer;
pub mod quality;

pub use agglomerative::{AgglomerativeClustering, Dendrogram, Merge};
pub use distance::{pairwise_distances, DistanceMetric};
pub use preparer::{
    ClusteringDataset, ClusteringObjective, ClusteringPreparer, CorrelatedPair,
    FeatureCorrelationReport, FeatureStatistics, ScalingParams,
};

use crate::services::segments::SegmentCharacteristics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;
pub const DEFAULT_MAX_CLUSTERS: usize = 10;

/// Failures of the pure clustering math. No partial result is ever produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusteringError {
    #[error("{0}")]
    InsufficientData(String),

    #[error("{0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Degenerate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    #[default]
    Ward,
    Complete,
    Average,
    Single,
}

impl Linkage {
    pub const ALL: [Linkage; 4] = [
        Linkage::Ward,
        Linkage::Complete,
        Linkage::Average,
        Linkage::Single,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Linkage::Ward => "ward",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Single => "single",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringConfig {
    /// None → search [2, max_clusters] for the best silhouette
    pub num_clusters: Option<usize>,
    pub linkage: Linkage,
    pub metric: DistanceMetric,
    pub min_cluster_size: usize,
    pub max_clusters: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            num_clusters: None,
            linkage: Linkage::Ward,
            metric: DistanceMetric::Euclidean,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            max_clusters: DEFAULT_MAX_CLUSTERS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ClusteringQuality {
    pub fn from_silhouette(score: f64) -> Self {
        if score >= 0.7 {
            ClusteringQuality::Excellent
        } else if score >= 0.5 {
            ClusteringQuality::Good
        } else if score >= 0.25 {
            ClusteringQuality::Fair
        } else {
            ClusteringQuality::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringQuality::Excellent => "excellent",
            ClusteringQuality::Good => "good",
            ClusteringQuality::Fair => "fair",
            ClusteringQuality::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub cluster_id: usize,
    pub user_ids: Vec<String>,
    /// Mean of member rows in the prepared (scaled, weighted) space
    pub centroid: Vec<f64>,
    pub cluster_size: usize,
    /// Mean distance of members to the centroid
    pub intra_cluster_distance: f64,
    pub characteristics: Option<SegmentCharacteristics>,
}

/// A cluster smaller than `min_cluster_size` folded into its nearest neighbor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmallClusterMerge {
    pub from: usize,
    pub into: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub k: usize,
    pub silhouette_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringMetadata {
    pub num_clusters: usize,
    pub silhouette_score: f64,
    pub davies_bouldin_index: f64,
    pub calinski_harabasz_index: f64,
    pub clustering_quality: ClusteringQuality,
    pub total_users: usize,
    pub linkage_criteria: Linkage,
    pub distance_metric: DistanceMetric,
    pub requested_clusters: Option<usize>,
    pub candidate_scores: Vec<CandidateScore>,
    pub merged_small_clusters: Vec<SmallClusterMerge>,
    pub min_cluster_size_enforced: bool,
    pub dendrogram_heights: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringResult {
    pub clusters: Vec<Cluster>,
    pub metadata: ClusteringMetadata,
}

impl ClusteringResult {
    pub fn cluster_of(&self, user_id: &str) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.user_ids.iter().any(|u| u == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_thresholds() {
        assert_eq!(ClusteringQuality::from_silhouette(0.71), ClusteringQuality::Excellent);
        assert_eq!(ClusteringQuality::from_silhouette(0.7), ClusteringQuality::Excellent);
        assert_eq!(ClusteringQuality::from_silhouette(0.5), ClusteringQuality::Good);
        assert_eq!(ClusteringQuality::from_silhouette(0.25), ClusteringQuality::Fair);
        assert_eq!(ClusteringQuality::from_silhouette(0.1), ClusteringQuality::Poor);
        assert_eq!(ClusteringQuality::from_silhouette(-0.4), ClusteringQuality::Poor);
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let config: ClusteringConfig = serde_json::from_str(
            r#"{"numClusters":3,"linkage":"average","metric":"cosine","minClusterSize":1,"maxClusters":6}"#,
        )
        .unwrap();

        assert_eq!(config.num_clusters, Some(3));
        assert_eq!(config.linkage, Linkage::Average);
        assert_eq!(config.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn test_unknown_linkage_rejected() {
        let result: Result<Linkage, _> = serde_json::from_str("\"centroid\"");
        assert!(result.is_err());
    }
}
