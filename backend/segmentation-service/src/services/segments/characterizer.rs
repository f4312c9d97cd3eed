use super::{DominantFeature, EngagementLevel, SegmentCharacteristics, UserType};
use crate::services::clustering::{Cluster, ClusteringDataset, ClusteringResult};
use crate::services::features::{Feature, FEATURE_COUNT};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_DOMINANT_FEATURES: usize = 5;

const MIN_STD: f64 = 1e-12;

/// One row of the archetype decision table: every `(feature, minimum)` must hold
#[derive(Debug, Clone, Copy)]
pub struct UserTypeRule {
    pub user_type: UserType,
    pub conditions: &'static [(Feature, f64)],
}

/// Evaluated top to bottom; first full match wins, otherwise `CasualViewer`.
/// When the segment stands out on some features, a row also needs one of its
/// features among those the segment is above the cohort on.
pub const USER_TYPE_RULES: &[UserTypeRule] = &[
    UserTypeRule {
        user_type: UserType::BingeWatcher,
        conditions: &[
            (Feature::BingeWatchingScore, 0.5),
            (Feature::ContentCompletionTendency, 0.6),
        ],
    },
    UserTypeRule {
        user_type: UserType::ActiveExplorer,
        conditions: &[
            (Feature::ContentExplorationRate, 0.5),
            (Feature::SearchDrivenDiscovery, 0.3),
        ],
    },
    UserTypeRule {
        user_type: UserType::FocusedLearner,
        conditions: &[
            (Feature::ContentCompletionTendency, 0.7),
            (Feature::QualityPreferenceScore, 0.55),
        ],
    },
    UserTypeRule {
        user_type: UserType::ContentExplorer,
        conditions: &[(Feature::ContentDiversityIndex, 0.6)],
    },
];

#[derive(Debug, Clone, Copy)]
enum Bound {
    AtLeast(f64),
    Below(f64),
}

impl Bound {
    fn holds(&self, value: f64) -> bool {
        match self {
            Bound::AtLeast(min) => value >= *min,
            Bound::Below(max) => value < *max,
        }
    }
}

const CONTENT_PREFERENCE_RULES: &[(Feature, Bound, &str)] = &[
    (Feature::AverageWatchDuration, Bound::AtLeast(0.6), "long_form_content"),
    (Feature::AverageWatchDuration, Bound::Below(0.25), "short_form_content"),
    (Feature::PlaylistUsage, Bound::AtLeast(0.3), "playlists_and_series"),
    (Feature::ContentDiversityIndex, Bound::AtLeast(0.6), "broad_topic_mix"),
    (Feature::ContentDiversityIndex, Bound::Below(0.2), "narrow_topic_focus"),
    (Feature::QualityPreferenceScore, Bound::AtLeast(0.6), "highly_rated_content"),
    (Feature::RewatchRate, Bound::AtLeast(0.2), "rewatches_favorites"),
];

const BEHAVIOR_PATTERN_RULES: &[(Feature, Bound, &str)] = &[
    (Feature::BingeWatchingScore, Bound::AtLeast(0.5), "binge_sessions"),
    (Feature::NightOwlScore, Bound::AtLeast(0.3), "night_owl"),
    (Feature::WeekendPreference, Bound::AtLeast(0.4), "weekend_viewer"),
    (Feature::SearchReliance, Bound::AtLeast(0.3), "heavy_searcher"),
    (Feature::HoverConversionRate, Bound::AtLeast(0.4), "preview_driven"),
    (Feature::RatingFrequency, Bound::AtLeast(0.3), "active_rater"),
    (Feature::SessionRegularity, Bound::AtLeast(0.5), "regular_schedule"),
    (Feature::RecencyScore, Bound::Below(0.2), "lapsing"),
];

/// Labels clusters from the unscaled canonical feature profiles
#[derive(Debug, Clone)]
pub struct SegmentCharacterizer {
    top_n: usize,
}

impl Default for SegmentCharacterizer {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_DOMINANT_FEATURES,
        }
    }
}

impl SegmentCharacterizer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Attaches characteristics to every cluster of a result
    pub fn characterize_all(&self, result: &mut ClusteringResult, dataset: &ClusteringDataset) {
        let rows: HashMap<&str, usize> = dataset
            .user_ids
            .iter()
            .enumerate()
            .map(|(i, u)| (u.as_str(), i))
            .collect();

        for cluster in result.clusters.iter_mut() {
            let members = member_rows(cluster, &rows);
            cluster.characteristics = Some(self.characterize_rows(&members, dataset));
        }
    }

    pub fn characterize(&self, cluster: &Cluster, dataset: &ClusteringDataset) -> SegmentCharacteristics {
        let rows: HashMap<&str, usize> = dataset
            .user_ids
            .iter()
            .enumerate()
            .map(|(i, u)| (u.as_str(), i))
            .collect();
        let members = member_rows(cluster, &rows);
        self.characterize_rows(&members, dataset)
    }

    fn characterize_rows(&self, members: &[usize], dataset: &ClusteringDataset) -> SegmentCharacteristics {
        let profile = mean_profile(members, dataset);
        let dominant_features = self.dominant_features(&profile, dataset);
        let user_type = classify(&profile, &dominant_features);

        SegmentCharacteristics {
            user_type,
            engagement_level: engagement_level(
                profile[Feature::EngagementIntensity.index()],
                dataset,
            ),
            recommendation_strategy: user_type.strategy(),
            dominant_features,
            content_preferences: apply_rules(CONTENT_PREFERENCE_RULES, &profile),
            behavior_patterns: apply_rules(BEHAVIOR_PATTERN_RULES, &profile),
            feature_profile: Feature::ALL
                .iter()
                .map(|f| (*f, profile[f.index()]))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Top features by |cluster mean - cohort mean| / cohort std.
    /// Constant features carry no signal and are skipped.
    fn dominant_features(
        &self,
        profile: &[f64; FEATURE_COUNT],
        dataset: &ClusteringDataset,
    ) -> Vec<DominantFeature> {
        let n = dataset.len().max(1) as f64;
        let mut ranked: Vec<DominantFeature> = Feature::ALL
            .iter()
            .filter_map(|feature| {
                let column = dataset.profile_column(*feature);
                let mean = column.sum() / n;
                let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
                if std < MIN_STD {
                    return None;
                }
                let centroid_value = profile[feature.index()];
                let deviation = (centroid_value - mean) / std;
                Some(DominantFeature {
                    feature: *feature,
                    centroid_value,
                    global_mean: mean,
                    deviation,
                    importance: deviation.abs(),
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        ranked.truncate(self.top_n);
        ranked
    }
}

fn member_rows(cluster: &Cluster, rows: &HashMap<&str, usize>) -> Vec<usize> {
    cluster
        .user_ids
        .iter()
        .filter_map(|u| rows.get(u.as_str()).copied())
        .collect()
}

fn mean_profile(members: &[usize], dataset: &ClusteringDataset) -> [f64; FEATURE_COUNT] {
    let mut profile = [0.0; FEATURE_COUNT];
    if members.is_empty() {
        return profile;
    }
    for &row in members {
        for (j, value) in profile.iter_mut().enumerate() {
            *value += dataset.profiles[[row, j]];
        }
    }
    for value in profile.iter_mut() {
        *value /= members.len() as f64;
    }
    profile
}

/// First matching row of the decision table over the profile and the
/// segment's dominant features
pub fn classify(profile: &[f64; FEATURE_COUNT], dominant: &[DominantFeature]) -> UserType {
    let elevated: Vec<Feature> = dominant
        .iter()
        .filter(|d| d.deviation > 0.0)
        .map(|d| d.feature)
        .collect();

    USER_TYPE_RULES
        .iter()
        .find(|rule| {
            let thresholds = rule
                .conditions
                .iter()
                .all(|(feature, min)| profile[feature.index()] >= *min);
            // No elevated features (single segment, flat cohort): thresholds alone
            let distinctive = elevated.is_empty()
                || rule.conditions.iter().any(|(feature, _)| elevated.contains(feature));
            thresholds && distinctive
        })
        .map(|rule| rule.user_type)
        .unwrap_or(UserType::CasualViewer)
}

/// Tertile bucket of a cluster's mean engagement within the cohort distribution
fn engagement_level(cluster_mean: f64, dataset: &ClusteringDataset) -> EngagementLevel {
    let mut values: Vec<f64> = dataset
        .profile_column(Feature::EngagementIntensity)
        .iter()
        .copied()
        .collect();
    if values.is_empty() {
        return EngagementLevel::Medium;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let lower = quantile(&values, 1.0 / 3.0);
    let upper = quantile(&values, 2.0 / 3.0);
    if upper - lower < MIN_STD {
        EngagementLevel::Medium
    } else if cluster_mean >= upper {
        EngagementLevel::High
    } else if cluster_mean <= lower {
        EngagementLevel::Low
    } else {
        EngagementLevel::Medium
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    let frac = position - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn apply_rules(rules: &[(Feature, Bound, &str)], profile: &[f64; FEATURE_COUNT]) -> Vec<String> {
    rules
        .iter()
        .filter(|(feature, bound, _)| bound.holds(profile[feature.index()]))
        .map(|(_, _, label)| label.to_string())
        .collect()
}
