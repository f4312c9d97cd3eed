// ============================================
// Agglomerative Clustering Engine (凝聚式階層聚類)
// ============================================
//
// 1. Validate config against the cohort size (before any O(n²) work)
// 2. Pairwise distance matrix under the chosen metric
// 3. Full dendrogram via Lance–Williams distance updates
// 4. Cut at the requested k, or at the k in [2, max] with the best silhouette
// 5. Fold clusters smaller than min_cluster_size into their nearest neighbor
// 6. Quality indices + cluster summaries
//
// Pure CPU, no I/O, no randomness: identical input yields identical output.

use super::distance::{pairwise_distances, DistanceMetric};
use super::preparer::ClusteringDataset;
use super::quality::{calinski_harabasz_index, centroids, davies_bouldin_index, silhouette_score};
use super::{
    CandidateScore, Cluster, ClusteringConfig, ClusteringError, ClusteringMetadata,
    ClusteringQuality, ClusteringResult, Linkage, SmallClusterMerge,
};
use ndarray::Array2;
use std::collections::HashMap;
use tracing::debug;

/// One agglomeration step. `left` < `right` are the slot indices of the
/// merged clusters; the merged cluster keeps the `left` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    merges: Vec<Merge>,
    n_samples: usize,
}

impl Dendrogram {
    /// Agglomerates every point into one root. Ties resolve to the
    /// lexicographically smallest (i, j) pair.
    pub fn build(distances: &Array2<f64>, linkage: Linkage) -> Self {
        let n = distances.nrows();
        if n == 0 {
            return Self {
                merges: Vec::new(),
                n_samples: 0,
            };
        }

        let mut dist = distances.clone();
        let mut active = vec![true; n];
        let mut sizes = vec![1usize; n];
        let mut merges = Vec::with_capacity(n - 1);

        for _ in 0..(n - 1) {
            let mut best = f64::INFINITY;
            let mut pair = None;
            for i in 0..n {
                if !active[i] {
                    continue;
                }
                for j in (i + 1)..n {
                    if active[j] && dist[[i, j]] < best {
                        best = dist[[i, j]];
                        pair = Some((i, j));
                    }
                }
            }

            let Some((i, j)) = pair else { break };
            let (n_i, n_j) = (sizes[i] as f64, sizes[j] as f64);

            for k in 0..n {
                if !active[k] || k == i || k == j {
                    continue;
                }
                let n_k = sizes[k] as f64;
                let d_ik = dist[[i, k]];
                let d_jk = dist[[j, k]];

                let updated = match linkage {
                    Linkage::Single => d_ik.min(d_jk),
                    Linkage::Complete => d_ik.max(d_jk),
                    Linkage::Average => (n_i * d_ik + n_j * d_jk) / (n_i + n_j),
                    Linkage::Ward => {
                        let squared = ((n_i + n_k) * d_ik * d_ik + (n_j + n_k) * d_jk * d_jk
                            - n_k * best * best)
                            / (n_i + n_j + n_k);
                        squared.max(0.0).sqrt()
                    }
                };

                dist[[i, k]] = updated;
                dist[[k, i]] = updated;
            }

            active[j] = false;
            sizes[i] += sizes[j];
            merges.push(Merge {
                left: i,
                right: j,
                distance: best,
                size: sizes[i],
            });
        }

        Self {
            merges,
            n_samples: n,
        }
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn heights(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.distance).collect()
    }

    /// Dense labels for k clusters, numbered by first appearance in input order
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let n = self.n_samples;
        let mut labels: Vec<usize> = (0..n).collect();
        let steps = n.saturating_sub(k.max(1)).min(self.merges.len());

        for merge in self.merges.iter().take(steps) {
            let (keep, drop) = (labels[merge.left], labels[merge.right]);
            for label in labels.iter_mut() {
                if *label == drop {
                    *label = keep;
                }
            }
        }

        renumber(&mut labels);
        labels
    }
}

/// Relabels to 0..k in order of first appearance; returns k
fn renumber(labels: &mut [usize]) -> usize {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    for label in labels.iter_mut() {
        let next = mapping.len();
        *label = *mapping.entry(*label).or_insert(next);
    }
    mapping.len()
}

#[derive(Debug, Clone, Default)]
pub struct AgglomerativeClustering {
    config: ClusteringConfig,
}

impl AgglomerativeClustering {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Cheap checks that must pass before the distance matrix is built
    pub fn validate(&self, n_users: usize) -> Result<(), ClusteringError> {
        let config = &self.config;

        if config.min_cluster_size == 0 {
            return Err(ClusteringError::InvalidConfig(
                "minClusterSize must be at least 1".to_string(),
            ));
        }
        if config.max_clusters < 2 {
            return Err(ClusteringError::InvalidConfig(
                "maxClusters must be at least 2".to_string(),
            ));
        }
        if config.linkage == Linkage::Ward && config.metric != DistanceMetric::Euclidean {
            return Err(ClusteringError::InvalidConfig(format!(
                "ward linkage requires euclidean distance, got {}",
                config.metric.as_str()
            )));
        }

        if let Some(k) = config.num_clusters {
            if k < 2 {
                return Err(ClusteringError::InvalidConfig(
                    "numClusters must be at least 2".to_string(),
                ));
            }
            if n_users < k {
                return Err(ClusteringError::InvalidConfig(format!(
                    "cohort of {} users cannot form {} clusters",
                    n_users, k
                )));
            }
        }

        if n_users < 2 {
            return Err(ClusteringError::InsufficientData(format!(
                "need at least 2 users with valid feature vectors, got {}",
                n_users
            )));
        }

        if let Some(k) = config.num_clusters {
            let required = config.min_cluster_size * k;
            if n_users < required {
                return Err(ClusteringError::InsufficientData(format!(
                    "{} clusters of at least {} users need {} users, got {}",
                    k, config.min_cluster_size, required, n_users
                )));
            }
        }

        Ok(())
    }

    pub fn fit(&self, dataset: &ClusteringDataset) -> Result<ClusteringResult, ClusteringError> {
        let n = dataset.len();
        self.validate(n)?;
        if dataset.matrix.ncols() == 0 {
            return Err(ClusteringError::InvalidConfig(
                "dataset has no feature columns".to_string(),
            ));
        }

        let config = &self.config;
        let distances = pairwise_distances(&dataset.matrix, config.metric);
        if distances.iter().all(|d| *d == 0.0) {
            return Err(ClusteringError::Degenerate(format!(
                "all pairwise {} distances are zero; users are indistinguishable",
                config.metric.as_str()
            )));
        }
        if distances.iter().any(|d| !d.is_finite()) {
            return Err(ClusteringError::Degenerate(
                "distance matrix contains non-finite values".to_string(),
            ));
        }

        let dendrogram = Dendrogram::build(&distances, config.linkage);

        let mut candidate_scores = Vec::new();
        let (mut labels, enforce_min_size) = match config.num_clusters {
            Some(k) => (dendrogram.cut(k), true),
            None => {
                let upper = config
                    .max_clusters
                    .min(n - 1)
                    .min(n / config.min_cluster_size);

                if upper < 2 {
                    // Too few users for two min-size clusters
                    (dendrogram.cut(2), false)
                } else {
                    let mut best: Option<(usize, f64, Vec<usize>)> = None;
                    for k in 2..=upper {
                        let labels = dendrogram.cut(k);
                        let score = silhouette_score(&distances, &labels, k);
                        candidate_scores.push(CandidateScore {
                            k,
                            silhouette_score: score,
                        });
                        let better = match &best {
                            Some((_, top, _)) => score > *top,
                            None => true,
                        };
                        if better {
                            best = Some((k, score, labels));
                        }
                    }
                    match best {
                        Some((_, _, labels)) => (labels, true),
                        None => (dendrogram.cut(2), true),
                    }
                }
            }
        };

        let merged_small_clusters = if enforce_min_size {
            merge_small_clusters(
                &mut labels,
                &dataset.matrix,
                config.metric,
                config.min_cluster_size,
            )
        } else {
            Vec::new()
        };
        let k = renumber(&mut labels);

        let silhouette = silhouette_score(&distances, &labels, k);
        let davies_bouldin = davies_bouldin_index(&dataset.matrix, &labels, k, config.metric);
        let calinski_harabasz = calinski_harabasz_index(&dataset.matrix, &labels, k);
        let clusters = build_clusters(dataset, &labels, k, config.metric);

        debug!(
            users = n,
            clusters = k,
            merged = merged_small_clusters.len(),
            silhouette = silhouette,
            "Agglomerative clustering finished"
        );

        Ok(ClusteringResult {
            clusters,
            metadata: ClusteringMetadata {
                num_clusters: k,
                silhouette_score: silhouette,
                davies_bouldin_index: davies_bouldin,
                calinski_harabasz_index: calinski_harabasz,
                clustering_quality: ClusteringQuality::from_silhouette(silhouette),
                total_users: n,
                linkage_criteria: config.linkage,
                distance_metric: config.metric,
                requested_clusters: config.num_clusters,
                candidate_scores,
                merged_small_clusters,
                min_cluster_size_enforced: enforce_min_size,
                dendrogram_heights: dendrogram.heights(),
            },
        })
    }
}

/// Repeatedly folds the smallest under-sized cluster (ties: lowest label) into
/// the cluster with the nearest centroid (ties: lowest label). Labels are left
/// sparse; the caller renumbers.
fn merge_small_clusters(
    labels: &mut [usize],
    matrix: &Array2<f64>,
    metric: DistanceMetric,
    min_size: usize,
) -> Vec<SmallClusterMerge> {
    let mut merges = Vec::new();

    loop {
        let width = labels.iter().copied().max().map_or(0, |m| m + 1);
        let mut sizes = vec![0usize; width];
        for &label in labels.iter() {
            sizes[label] += 1;
        }

        let live: Vec<usize> = (0..width).filter(|&c| sizes[c] > 0).collect();
        if live.len() < 2 {
            break;
        }

        let smallest = live
            .iter()
            .copied()
            .filter(|&c| sizes[c] < min_size)
            .min_by_key(|&c| (sizes[c], c));
        let Some(from) = smallest else { break };

        let centers = centroids(matrix, labels, width);
        let mut into = None;
        let mut nearest = f64::INFINITY;
        for &c in &live {
            if c == from {
                continue;
            }
            let d = metric.compute(centers.row(from), centers.row(c));
            if d < nearest || into.is_none() {
                nearest = d;
                into = Some(c);
            }
        }
        let Some(into) = into else { break };

        for label in labels.iter_mut() {
            if *label == from {
                *label = into;
            }
        }
        merges.push(SmallClusterMerge {
            from,
            into,
            size: sizes[from],
        });
    }

    merges
}

fn build_clusters(
    dataset: &ClusteringDataset,
    labels: &[usize],
    k: usize,
    metric: DistanceMetric,
) -> Vec<Cluster> {
    let centers = centroids(&dataset.matrix, labels, k);

    (0..k)
        .map(|c| {
            let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == c).collect();
            let center = centers.row(c);
            let spread = members
                .iter()
                .map(|&i| metric.compute(dataset.matrix.row(i), center))
                .sum::<f64>()
                / members.len().max(1) as f64;

            Cluster {
                cluster_id: c,
                user_ids: members
                    .iter()
                    .map(|&i| dataset.user_ids[i].clone())
                    .collect(),
                centroid: center.to_vec(),
                cluster_size: members.len(),
                intra_cluster_distance: spread,
                characteristics: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::features::Feature;
    use ndarray::arr2;

    fn dataset(rows: Array2<f64>) -> ClusteringDataset {
        let users = (0..rows.nrows()).map(|i| format!("u{}", i)).collect();
        let features = Feature::ALL[..rows.ncols()].to_vec();
        ClusteringDataset::from_matrix(users, features, rows).unwrap()
    }

    fn three_groups() -> Array2<f64> {
        arr2(&[
            [0.0, 0.0],
            [0.1, 0.1],
            [0.0, 0.2],
            [5.0, 5.0],
            [5.1, 5.2],
            [5.2, 5.0],
            [10.0, 0.0],
            [10.1, 0.2],
            [10.2, 0.1],
        ])
    }

    #[test]
    fn test_dendrogram_has_n_minus_one_merges() {
        let d = pairwise_distances(&three_groups(), DistanceMetric::Euclidean);
        for linkage in Linkage::ALL {
            let dendrogram = Dendrogram::build(&d, linkage);
            assert_eq!(dendrogram.merges().len(), 8, "{}", linkage.as_str());
            assert_eq!(dendrogram.merges().last().map(|m| m.size), Some(9));
        }
    }

    #[test]
    fn test_merge_heights_are_monotone() {
        let d = pairwise_distances(&three_groups(), DistanceMetric::Euclidean);
        for linkage in Linkage::ALL {
            let heights = Dendrogram::build(&d, linkage).heights();
            for pair in heights.windows(2) {
                assert!(pair[0] <= pair[1] + 1e-9, "{} not monotone", linkage.as_str());
            }
        }
    }

    #[test]
    fn test_cut_recovers_groups() {
        let d = pairwise_distances(&three_groups(), DistanceMetric::Euclidean);
        let labels = Dendrogram::build(&d, Linkage::Average).cut(3);
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);

        let all = Dendrogram::build(&d, Linkage::Average).cut(1);
        assert!(all.iter().all(|l| *l == 0));
    }

    #[test]
    fn test_auto_k_picks_best_silhouette() {
        let engine = AgglomerativeClustering::new(ClusteringConfig::default());
        let result = engine.fit(&dataset(three_groups())).unwrap();

        assert_eq!(result.metadata.num_clusters, 3);
        assert!(!result.metadata.candidate_scores.is_empty());
        assert_eq!(result.metadata.candidate_scores[0].k, 2);
        assert!(result.metadata.silhouette_score > 0.7);
    }

    #[test]
    fn test_ward_requires_euclidean() {
        let engine = AgglomerativeClustering::new(ClusteringConfig {
            metric: DistanceMetric::Cosine,
            ..Default::default()
        });
        assert!(matches!(
            engine.validate(20),
            Err(ClusteringError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validation_order() {
        let engine = AgglomerativeClustering::new(ClusteringConfig {
            num_clusters: Some(4),
            min_cluster_size: 3,
            ..Default::default()
        });

        assert!(matches!(engine.validate(3), Err(ClusteringError::InvalidConfig(_))));
        assert!(matches!(
            engine.validate(10),
            Err(ClusteringError::InsufficientData(_))
        ));
        assert!(engine.validate(12).is_ok());

        let auto = AgglomerativeClustering::new(ClusteringConfig::default());
        assert!(matches!(auto.validate(1), Err(ClusteringError::InsufficientData(_))));
    }

    #[test]
    fn test_identical_users_are_degenerate() {
        let engine = AgglomerativeClustering::new(ClusteringConfig::default());
        let result = engine.fit(&dataset(arr2(&[[0.5, 0.5], [0.5, 0.5], [0.5, 0.5]])));
        assert!(matches!(result, Err(ClusteringError::Degenerate(_))));
    }

    #[test]
    fn test_outlier_folded_into_nearest_cluster() {
        let rows = arr2(&[
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [30.0, 30.0],
        ]);
        let engine = AgglomerativeClustering::new(ClusteringConfig {
            num_clusters: Some(3),
            linkage: Linkage::Single,
            min_cluster_size: 2,
            ..Default::default()
        });
        let result = engine.fit(&dataset(rows)).unwrap();

        assert_eq!(result.metadata.num_clusters, 2);
        assert_eq!(result.metadata.merged_small_clusters.len(), 1);
        assert_eq!(result.metadata.merged_small_clusters[0].size, 1);
        let outlier = result.cluster_of("u6").unwrap();
        assert!(outlier.user_ids.contains(&"u3".to_string()));
        assert!(result.clusters.iter().all(|c| c.cluster_size >= 2));
    }

    #[test]
    fn test_tiny_cohort_falls_back_without_merge() {
        let engine = AgglomerativeClustering::new(ClusteringConfig {
            min_cluster_size: 3,
            ..Default::default()
        });
        let result = engine
            .fit(&dataset(arr2(&[[0.0, 0.0], [1.0, 1.0], [1.1, 1.0]])))
            .unwrap();

        assert_eq!(result.metadata.num_clusters, 2);
        assert!(!result.metadata.min_cluster_size_enforced);
        assert!(result.metadata.merged_small_clusters.is_empty());
    }

    #[test]
    fn test_partition_covers_every_user_once() {
        let engine = AgglomerativeClustering::new(ClusteringConfig {
            num_clusters: Some(3),
            linkage: Linkage::Complete,
            metric: DistanceMetric::Manhattan,
            min_cluster_size: 1,
            ..Default::default()
        });
        let result = engine.fit(&dataset(three_groups())).unwrap();

        let total: usize = result.clusters.iter().map(|c| c.cluster_size).sum();
        assert_eq!(total, 9);
        let mut seen: Vec<String> = result
            .clusters
            .iter()
            .flat_map(|c| c.user_ids.clone())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 9);
    }
}
