// ============================================
// Clustering Preparer (聚類資料準備)
// ============================================
//
// Assembles a cohort's feature vectors into a rectangular matrix:
// 1. Select features (named objective or the full canonical set)
// 2. Z-score standardize per column (std == 0 → constant 0 column)
// 3. Apply objective weights to the scaled columns
//
// Also provides diagnostics over the cohort: Pearson correlation report
// and per-feature summary statistics.

use super::ClusteringError;
use crate::services::features::{Feature, FeatureVector, FEATURE_COUNT};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Columns with a standard deviation below this are treated as constant
const MIN_STD: f64 = 1e-12;

/// |r| at or above this flags a feature pair as redundant
pub const HIGH_CORRELATION_THRESHOLD: f64 = 0.8;

/// Named feature-weight presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringObjective {
    EngagementFocused,
    ContentPreference,
    DiscoveryBehavior,
    TemporalPatterns,
    LearningFocused,
    Comprehensive,
}

impl ClusteringObjective {
    pub const ALL: [ClusteringObjective; 6] = [
        ClusteringObjective::EngagementFocused,
        ClusteringObjective::ContentPreference,
        ClusteringObjective::DiscoveryBehavior,
        ClusteringObjective::TemporalPatterns,
        ClusteringObjective::LearningFocused,
        ClusteringObjective::Comprehensive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringObjective::EngagementFocused => "engagement_focused",
            ClusteringObjective::ContentPreference => "content_preference",
            ClusteringObjective::DiscoveryBehavior => "discovery_behavior",
            ClusteringObjective::TemporalPatterns => "temporal_patterns",
            ClusteringObjective::LearningFocused => "learning_focused",
            ClusteringObjective::Comprehensive => "comprehensive",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ClusteringObjective::EngagementFocused => "How much and how often users watch",
            ClusteringObjective::ContentPreference => "What kind of content users gravitate to",
            ClusteringObjective::DiscoveryBehavior => "How users find new content",
            ClusteringObjective::TemporalPatterns => "When users are active",
            ClusteringObjective::LearningFocused => "Completion, quality and feedback habits",
            ClusteringObjective::Comprehensive => "Every behavioral indicator with equal weight",
        }
    }

    /// Selected features and their weights, in canonical order
    pub fn weights(&self) -> Vec<(Feature, f64)> {
        use Feature::*;

        let mut weights: Vec<(Feature, f64)> = match self {
            ClusteringObjective::EngagementFocused => vec![
                (EngagementIntensity, 1.0),
                (ActivityFrequency, 0.8),
                (SessionDepth, 0.8),
                (BingeWatchingScore, 0.7),
                (RecencyScore, 0.5),
                (PlatformTenure, 0.4),
            ],
            ClusteringObjective::ContentPreference => vec![
                (ContentDiversityIndex, 1.0),
                (AverageWatchDuration, 0.8),
                (QualityPreferenceScore, 0.8),
                (PlaylistUsage, 0.7),
                (ContentCompletionTendency, 0.6),
                (RewatchRate, 0.5),
            ],
            ClusteringObjective::DiscoveryBehavior => vec![
                (SearchReliance, 1.0),
                (ContentExplorationRate, 1.0),
                (SearchDrivenDiscovery, 0.9),
                (QueryDiversity, 0.6),
                (HoverEngagement, 0.6),
                (HoverConversionRate, 0.5),
                (NavigationBreadth, 0.5),
            ],
            ClusteringObjective::TemporalPatterns => vec![
                (PeakHourConcentration, 1.0),
                (NightOwlScore, 0.9),
                (WeekendPreference, 0.9),
                (SessionRegularity, 0.8),
                (ActivityFrequency, 0.5),
            ],
            ClusteringObjective::LearningFocused => vec![
                (ContentCompletionTendency, 1.0),
                (QualityPreferenceScore, 0.9),
                (AverageWatchDuration, 0.7),
                (RatingFrequency, 0.6),
                (SessionRegularity, 0.6),
                (ReviewVerbosity, 0.5),
                (RatingCriticalness, 0.4),
            ],
            ClusteringObjective::Comprehensive => Feature::ALL.iter().map(|f| (*f, 1.0)).collect(),
        };

        weights.sort_by_key(|(feature, _)| feature.index());
        weights
    }
}

/// Per-column standardization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParams {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// Rectangular cohort matrix ready for clustering.
///
/// Invariant: `matrix.nrows() == user_ids.len()`, `matrix.ncols() == features.len()`,
/// and `profiles` holds the unscaled canonical features in the same row order.
#[derive(Debug, Clone)]
pub struct ClusteringDataset {
    pub user_ids: Vec<String>,
    pub features: Vec<Feature>,
    pub matrix: Array2<f64>,
    pub scaling: Option<ScalingParams>,
    pub weights: Vec<f64>,
    pub profiles: Array2<f64>,
}

impl ClusteringDataset {
    /// Dataset over an already-prepared matrix. Profiles are scattered from
    /// the given columns; features not present stay 0.
    pub fn from_matrix(
        user_ids: Vec<String>,
        features: Vec<Feature>,
        matrix: Array2<f64>,
    ) -> Result<Self, ClusteringError> {
        if matrix.nrows() != user_ids.len() || matrix.ncols() != features.len() {
            return Err(ClusteringError::InvalidConfig(format!(
                "matrix shape {:?} does not match {} users x {} features",
                matrix.dim(),
                user_ids.len(),
                features.len()
            )));
        }

        let mut profiles = Array2::<f64>::zeros((user_ids.len(), FEATURE_COUNT));
        for (col, feature) in features.iter().enumerate() {
            profiles
                .column_mut(feature.index())
                .assign(&matrix.column(col));
        }

        Ok(Self {
            weights: vec![1.0; features.len()],
            user_ids,
            features,
            matrix,
            scaling: None,
            profiles,
        })
    }

    pub fn len(&self) -> usize {
        self.user_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }

    pub fn profile_column(&self, feature: Feature) -> ArrayView1<'_, f64> {
        self.profiles.column(feature.index())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusteringPreparer;

impl ClusteringPreparer {
    pub fn new() -> Self {
        Self
    }

    pub fn prepare(
        &self,
        vectors: &[FeatureVector],
        objective: Option<ClusteringObjective>,
        scale_features: bool,
    ) -> Result<ClusteringDataset, ClusteringError> {
        if vectors.is_empty() {
            return Err(ClusteringError::InsufficientData(
                "no feature vectors to prepare".to_string(),
            ));
        }

        let selection: Vec<(Feature, f64)> = match objective {
            Some(objective) => objective.weights(),
            None => Feature::ALL.iter().map(|f| (*f, 1.0)).collect(),
        };
        let features: Vec<Feature> = selection.iter().map(|(f, _)| *f).collect();
        let weights: Vec<f64> = selection.iter().map(|(_, w)| *w).collect();

        let n = vectors.len();
        let profiles = Array2::from_shape_fn((n, FEATURE_COUNT), |(i, j)| vectors[i].values()[j]);
        let mut matrix =
            Array2::from_shape_fn((n, features.len()), |(i, j)| vectors[i].get(features[j]));

        let scaling = if scale_features {
            Some(standardize(&mut matrix))
        } else {
            None
        };

        for (mut column, weight) in matrix.axis_iter_mut(Axis(1)).zip(weights.iter()) {
            column.mapv_inplace(|v| v * weight);
        }

        Ok(ClusteringDataset {
            user_ids: vectors.iter().map(|v| v.user_id.clone()).collect(),
            features,
            matrix,
            scaling,
            weights,
            profiles,
        })
    }

    /// Pairwise Pearson correlation over the canonical feature profiles
    pub fn correlation_report(&self, dataset: &ClusteringDataset) -> FeatureCorrelationReport {
        let features: Vec<Feature> = Feature::ALL.to_vec();
        let d = features.len();
        let mut matrix = vec![vec![0.0; d]; d];
        let mut redundant_pairs = Vec::new();

        for a in 0..d {
            matrix[a][a] = 1.0;
            for b in (a + 1)..d {
                let r = pearson(dataset.profiles.column(a), dataset.profiles.column(b));
                matrix[a][b] = r;
                matrix[b][a] = r;
                if r.abs() >= HIGH_CORRELATION_THRESHOLD {
                    redundant_pairs.push(CorrelatedPair {
                        feature_a: features[a],
                        feature_b: features[b],
                        correlation: r,
                    });
                }
            }
        }

        redundant_pairs.sort_by(|x, y| {
            y.correlation
                .abs()
                .partial_cmp(&x.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        FeatureCorrelationReport {
            features,
            matrix,
            threshold: HIGH_CORRELATION_THRESHOLD,
            redundant_pairs,
        }
    }

    /// min / max / mean / std / null count per canonical feature
    pub fn feature_statistics(&self, dataset: &ClusteringDataset) -> Vec<FeatureStatistics> {
        Feature::ALL
            .iter()
            .map(|feature| {
                let column = dataset.profile_column(*feature);
                let finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
                let null_count = column.len() - finite.len();

                if finite.is_empty() {
                    return FeatureStatistics {
                        feature: *feature,
                        min: 0.0,
                        max: 0.0,
                        mean: 0.0,
                        std: 0.0,
                        null_count,
                    };
                }

                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                let variance =
                    finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;

                FeatureStatistics {
                    feature: *feature,
                    min: finite.iter().copied().fold(f64::INFINITY, f64::min),
                    max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    mean,
                    std: variance.sqrt(),
                    null_count,
                }
            })
            .collect()
    }
}

/// In-place z-score standardization with population std
pub fn standardize(matrix: &mut Array2<f64>) -> ScalingParams {
    let n = matrix.nrows().max(1) as f64;
    let mut means = Vec::with_capacity(matrix.ncols());
    let mut stds = Vec::with_capacity(matrix.ncols());

    for mut column in matrix.axis_iter_mut(Axis(1)) {
        let mean = column.sum() / n;
        let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        if std < MIN_STD {
            column.fill(0.0);
        } else {
            column.mapv_inplace(|v| (v - mean) / std);
        }

        means.push(mean);
        stds.push(std);
    }

    ScalingParams { means, stds }
}

/// Pearson r; 0 when either column is constant
pub fn pearson(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let n = a.len();
    if n < 2 {
        return 0.0;
    }

    let mean_a = a.sum() / n as f64;
    let mean_b = b.sum() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    if var_a < MIN_STD || var_b < MIN_STD {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedPair {
    pub feature_a: Feature,
    pub feature_b: Feature,
    pub correlation: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCorrelationReport {
    pub features: Vec<Feature>,
    pub matrix: Vec<Vec<f64>>,
    pub threshold: f64,
    pub redundant_pairs: Vec<CorrelatedPair>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStatistics {
    pub feature: Feature,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub null_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn vector(user: &str, base: f64) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (base + i as f64 * 0.01).min(1.0);
        }
        FeatureVector::new(user, values)
    }

    #[test]
    fn test_prepare_full_feature_set() {
        let vectors = vec![vector("a", 0.1), vector("b", 0.5), vector("c", 0.9)];
        let dataset = ClusteringPreparer::new().prepare(&vectors, None, false).unwrap();

        assert_eq!(dataset.user_ids, vec!["a", "b", "c"]);
        assert_eq!(dataset.features.len(), FEATURE_COUNT);
        assert_eq!(dataset.matrix.dim(), (3, FEATURE_COUNT));
        assert_eq!(dataset.profiles, dataset.matrix);
        assert!(dataset.scaling.is_none());
    }

    #[test]
    fn test_objective_restricts_and_weights() {
        let vectors = vec![vector("a", 0.1), vector("b", 0.5)];
        let objective = ClusteringObjective::EngagementFocused;
        let dataset = ClusteringPreparer::new()
            .prepare(&vectors, Some(objective), false)
            .unwrap();

        assert_eq!(dataset.features.len(), objective.weights().len());
        assert_eq!(dataset.features[0], Feature::EngagementIntensity);
        // ActivityFrequency is weighted 0.8
        let expected = vectors[1].get(Feature::ActivityFrequency) * 0.8;
        assert!((dataset.matrix[[1, 1]] - expected).abs() < 1e-12);
        // Profiles keep every canonical feature unweighted
        assert_eq!(dataset.profiles.ncols(), FEATURE_COUNT);
    }

    #[test]
    fn test_standardize_constant_column_is_zero() {
        let mut m = arr2(&[[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]]);
        let params = standardize(&mut m);

        assert_eq!(params.stds[1], 0.0);
        assert!(m.column(1).iter().all(|v| *v == 0.0));
        assert!(m.column(0).sum().abs() < 1e-12);
    }

    #[test]
    fn test_standardize_is_idempotent() {
        let mut m = arr2(&[[0.1, 3.0], [0.4, 1.0], [0.9, 7.0], [0.2, 2.0]]);
        standardize(&mut m);
        let once = m.clone();
        standardize(&mut m);

        for (a, b) in once.iter().zip(m.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pearson() {
        let a = ndarray::arr1(&[1.0, 2.0, 3.0, 4.0]);
        let b = ndarray::arr1(&[2.0, 4.0, 6.0, 8.0]);
        let c = ndarray::arr1(&[4.0, 3.0, 2.0, 1.0]);
        let flat = ndarray::arr1(&[1.0, 1.0, 1.0, 1.0]);

        assert!((pearson(a.view(), b.view()) - 1.0).abs() < 1e-12);
        assert!((pearson(a.view(), c.view()) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(a.view(), flat.view()), 0.0);
    }

    #[test]
    fn test_correlation_report_flags_redundant_pairs() {
        // Every feature is a linear function of the base value
        let vectors = vec![vector("a", 0.1), vector("b", 0.3), vector("c", 0.6)];
        let preparer = ClusteringPreparer::new();
        let dataset = preparer.prepare(&vectors, None, true).unwrap();
        let report = preparer.correlation_report(&dataset);

        assert_eq!(report.matrix.len(), FEATURE_COUNT);
        assert!(!report.redundant_pairs.is_empty());
        assert!(report
            .redundant_pairs
            .iter()
            .all(|p| p.correlation.abs() >= HIGH_CORRELATION_THRESHOLD));
    }

    #[test]
    fn test_feature_statistics() {
        let vectors = vec![vector("a", 0.2), vector("b", 0.4)];
        let preparer = ClusteringPreparer::new();
        let dataset = preparer.prepare(&vectors, None, false).unwrap();
        let stats = preparer.feature_statistics(&dataset);

        assert_eq!(stats.len(), FEATURE_COUNT);
        let first = &stats[0];
        assert!((first.min - 0.2).abs() < 1e-12);
        assert!((first.max - 0.4).abs() < 1e-12);
        assert!((first.mean - 0.3).abs() < 1e-12);
        assert!((first.std - 0.1).abs() < 1e-12);
        assert_eq!(first.null_count, 0);
    }

    #[test]
    fn test_from_matrix_rejects_ragged_shape() {
        let m = arr2(&[[0.1, 0.2], [0.3, 0.4]]);
        let result = ClusteringDataset::from_matrix(
            vec!["a".into()],
            vec![Feature::EngagementIntensity, Feature::SessionDepth],
            m,
        );
        assert!(result.is_err());
    }
}
