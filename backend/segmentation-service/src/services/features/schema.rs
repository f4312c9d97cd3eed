// ============================================
// Engineered Feature Schema (行為特徵定義)
// ============================================
//
// Fixed, enum-indexed feature set shared by the engineer, the clustering
// preparer and the segment characterizer. Values are stored in canonical
// order in a fixed-size array, so a feature name can never drift between
// producer and consumer.

use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    // Engagement / activity
    EngagementIntensity,
    ActivityFrequency,
    SessionDepth,
    // Consumption patterns
    ContentCompletionTendency,
    BingeWatchingScore,
    AverageWatchDuration,
    RewatchRate,
    ContentDiversityIndex,
    PlaylistUsage,
    // Discovery / search
    SearchReliance,
    SearchDrivenDiscovery,
    QueryDiversity,
    ContentExplorationRate,
    HoverEngagement,
    HoverConversionRate,
    NavigationBreadth,
    // Feedback
    RatingFrequency,
    RatingCriticalness,
    ReviewVerbosity,
    QualityPreferenceScore,
    // Temporal
    PeakHourConcentration,
    NightOwlScore,
    WeekendPreference,
    SessionRegularity,
    // Loyalty / maturity
    PlatformTenure,
    RecencyScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    Engagement,
    Consumption,
    Discovery,
    Feedback,
    Temporal,
    Loyalty,
}

impl Feature {
    /// Canonical order; `Feature::ALL[f.index()] == f`
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::EngagementIntensity,
        Feature::ActivityFrequency,
        Feature::SessionDepth,
        Feature::ContentCompletionTendency,
        Feature::BingeWatchingScore,
        Feature::AverageWatchDuration,
        Feature::RewatchRate,
        Feature::ContentDiversityIndex,
        Feature::PlaylistUsage,
        Feature::SearchReliance,
        Feature::SearchDrivenDiscovery,
        Feature::QueryDiversity,
        Feature::ContentExplorationRate,
        Feature::HoverEngagement,
        Feature::HoverConversionRate,
        Feature::NavigationBreadth,
        Feature::RatingFrequency,
        Feature::RatingCriticalness,
        Feature::ReviewVerbosity,
        Feature::QualityPreferenceScore,
        Feature::PeakHourConcentration,
        Feature::NightOwlScore,
        Feature::WeekendPreference,
        Feature::SessionRegularity,
        Feature::PlatformTenure,
        Feature::RecencyScore,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::EngagementIntensity => "engagementIntensity",
            Feature::ActivityFrequency => "activityFrequency",
            Feature::SessionDepth => "sessionDepth",
            Feature::ContentCompletionTendency => "contentCompletionTendency",
            Feature::BingeWatchingScore => "bingeWatchingScore",
            Feature::AverageWatchDuration => "averageWatchDuration",
            Feature::RewatchRate => "rewatchRate",
            Feature::ContentDiversityIndex => "contentDiversityIndex",
            Feature::PlaylistUsage => "playlistUsage",
            Feature::SearchReliance => "searchReliance",
            Feature::SearchDrivenDiscovery => "searchDrivenDiscovery",
            Feature::QueryDiversity => "queryDiversity",
            Feature::ContentExplorationRate => "contentExplorationRate",
            Feature::HoverEngagement => "hoverEngagement",
            Feature::HoverConversionRate => "hoverConversionRate",
            Feature::NavigationBreadth => "navigationBreadth",
            Feature::RatingFrequency => "ratingFrequency",
            Feature::RatingCriticalness => "ratingCriticalness",
            Feature::ReviewVerbosity => "reviewVerbosity",
            Feature::QualityPreferenceScore => "qualityPreferenceScore",
            Feature::PeakHourConcentration => "peakHourConcentration",
            Feature::NightOwlScore => "nightOwlScore",
            Feature::WeekendPreference => "weekendPreference",
            Feature::SessionRegularity => "sessionRegularity",
            Feature::PlatformTenure => "platformTenure",
            Feature::RecencyScore => "recencyScore",
        }
    }

    pub fn group(&self) -> FeatureGroup {
        match self {
            Feature::EngagementIntensity | Feature::ActivityFrequency | Feature::SessionDepth => {
                FeatureGroup::Engagement
            }
            Feature::ContentCompletionTendency
            | Feature::BingeWatchingScore
            | Feature::AverageWatchDuration
            | Feature::RewatchRate
            | Feature::ContentDiversityIndex
            | Feature::PlaylistUsage => FeatureGroup::Consumption,
            Feature::SearchReliance
            | Feature::SearchDrivenDiscovery
            | Feature::QueryDiversity
            | Feature::ContentExplorationRate
            | Feature::HoverEngagement
            | Feature::HoverConversionRate
            | Feature::NavigationBreadth => FeatureGroup::Discovery,
            Feature::RatingFrequency
            | Feature::RatingCriticalness
            | Feature::ReviewVerbosity
            | Feature::QualityPreferenceScore => FeatureGroup::Feedback,
            Feature::PeakHourConcentration
            | Feature::NightOwlScore
            | Feature::WeekendPreference
            | Feature::SessionRegularity => FeatureGroup::Temporal,
            Feature::PlatformTenure | Feature::RecencyScore => FeatureGroup::Loyalty,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engineered behavioral indicators of one user. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub user_id: String,
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Values are clamped to [0, 1]; non-finite values become 0.
    pub fn new(user_id: impl Into<String>, values: [f64; FEATURE_COUNT]) -> Self {
        let mut values = values;
        for v in values.iter_mut() {
            *v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        }
        Self {
            user_id: user_id.into(),
            values,
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_matches_index() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i, "{} out of order", feature);
        }
    }

    #[test]
    fn test_names_are_unique() {
        let names: std::collections::HashSet<_> = Feature::ALL.iter().map(|f| f.as_str()).collect();
        assert_eq!(names.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&Feature::BingeWatchingScore).unwrap();
        assert_eq!(json, "\"bingeWatchingScore\"");
    }

    #[test]
    fn test_vector_clamps_values() {
        let mut values = [0.5; FEATURE_COUNT];
        values[0] = 1.7;
        values[1] = -0.2;
        values[2] = f64::NAN;

        let v = FeatureVector::new("u1", values);
        assert_eq!(v.get(Feature::EngagementIntensity), 1.0);
        assert_eq!(v.get(Feature::ActivityFrequency), 0.0);
        assert_eq!(v.get(Feature::SessionDepth), 0.0);
    }
}
