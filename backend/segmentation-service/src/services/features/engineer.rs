// ============================================
// Feature Engineer (行為特徵工程)
// ============================================
//
// Derives the fixed behavioral indicator set from RawUserMetrics. Every
// indicator is bounded to [0, 1] and stays finite for users with very
// little data: ratios use Laplace-style smoothing (+1 denominators) and
// unbounded quantities are squashed with 1 - exp(-x / scale).

use super::extractor::RawUserMetrics;
use super::schema::{Feature, FeatureVector, FEATURE_COUNT};

/// Platform-wide prior for the average rating when a cohort has no ratings
pub const DEFAULT_COHORT_RATING: f64 = 3.5;

/// Cohort-level context needed by relative indicators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortContext {
    pub average_rating: f64,
}

impl Default for CohortContext {
    fn default() -> Self {
        Self {
            average_rating: DEFAULT_COHORT_RATING,
        }
    }
}

impl CohortContext {
    /// Rating-count weighted average over the cohort
    pub fn from_metrics(cohort: &[RawUserMetrics]) -> Self {
        let count: u32 = cohort.iter().map(|m| m.rating_count).sum();
        if count == 0 {
            return Self::default();
        }
        let sum: f64 = cohort.iter().map(|m| m.rating_sum).sum();
        Self {
            average_rating: sum / count as f64,
        }
    }
}

/// 1 - e^(-x/scale): 0 at x = 0, ~0.63 at x = scale, → 1
fn saturate(x: f64, scale: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        1.0 - (-x / scale).exp()
    }
}

/// (num + prior * strength) / (den + strength)
fn smoothed_ratio(num: f64, den: f64, prior: f64, strength: f64) -> f64 {
    (num + prior * strength) / (den + strength)
}

/// Shannon entropy of a histogram normalized by ln(k). 0 for k <= 1.
pub fn normalized_entropy<'a>(counts: impl IntoIterator<Item = &'a u32>) -> f64 {
    let counts: Vec<f64> = counts
        .into_iter()
        .filter(|&&c| c > 0)
        .map(|&c| c as f64)
        .collect();
    if counts.len() <= 1 {
        return 0.0;
    }

    let total: f64 = counts.iter().sum();
    let entropy: f64 = counts
        .iter()
        .map(|c| {
            let p = c / total;
            -p * p.ln()
        })
        .sum();

    entropy / (counts.len() as f64).ln()
}

#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    pub fn engineer(&self, raw: &RawUserMetrics, cohort: &CohortContext) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        let views = raw.view_count as f64;

        // Engagement / activity
        let watch_hours_per_day = raw.total_watch_seconds / 3600.0 / raw.active_days.max(1) as f64;
        values[Feature::EngagementIntensity.index()] = saturate(watch_hours_per_day, 1.5);
        values[Feature::ActivityFrequency.index()] =
            raw.active_days as f64 / (raw.observation_days.max(0.0) + 1.0);
        let session_depth = saturate(raw.avg_videos_per_session, 4.0);
        values[Feature::SessionDepth.index()] = session_depth;

        // Consumption
        values[Feature::ContentCompletionTendency.index()] =
            smoothed_ratio(raw.completion_sum, views, 0.5, 1.0);
        values[Feature::BingeWatchingScore.index()] = Self::binge_score(raw, session_depth);
        values[Feature::AverageWatchDuration.index()] =
            saturate(raw.total_watch_seconds / views.max(1.0) / 60.0, 15.0);
        values[Feature::RewatchRate.index()] =
            (views - raw.unique_videos() as f64).max(0.0) / (views + 1.0);
        values[Feature::ContentDiversityIndex.index()] =
            normalized_entropy(raw.category_histogram.values());
        values[Feature::PlaylistUsage.index()] = raw.playlist_views as f64 / (views + 1.0);

        // Discovery / search
        let searches = raw.search_count as f64;
        values[Feature::SearchReliance.index()] = searches / (searches + views + 1.0);
        values[Feature::SearchDrivenDiscovery.index()] =
            (raw.search_clicks as f64).min(views) / (views + 1.0);
        values[Feature::QueryDiversity.index()] = raw.unique_search_terms as f64 / (searches + 1.0);
        values[Feature::ContentExplorationRate.index()] = 0.5 * raw.unique_videos() as f64
            / (views + 1.0)
            + 0.5 * saturate(raw.category_histogram.len() as f64, 4.0);
        let hovers = raw.hover_count as f64;
        values[Feature::HoverEngagement.index()] = raw.significant_hover_count as f64 / (hovers + 1.0);
        values[Feature::HoverConversionRate.index()] = raw.hover_click_count as f64 / (hovers + 1.0);
        values[Feature::NavigationBreadth.index()] =
            raw.unique_page_types as f64 / (raw.unique_page_types as f64 + 3.0);

        // Feedback
        let ratings = raw.rating_count as f64;
        values[Feature::RatingFrequency.index()] = ratings / (views.max(ratings) + 1.0);
        values[Feature::RatingCriticalness.index()] = Self::rating_criticalness(raw, cohort);
        values[Feature::ReviewVerbosity.index()] = if raw.review_count == 0 {
            0.0
        } else {
            saturate(raw.review_chars_total as f64 / raw.review_count as f64, 200.0)
        };
        values[Feature::QualityPreferenceScore.index()] = smoothed_ratio(
            (raw.high_rating_count + raw.completed_views) as f64,
            ratings + views,
            0.5,
            1.0,
        );

        // Temporal
        let peak_hour = raw.hour_histogram.iter().copied().max().unwrap_or(0) as f64;
        values[Feature::PeakHourConcentration.index()] = peak_hour / (views + 1.0);
        values[Feature::NightOwlScore.index()] = raw.night_views as f64 / (views + 1.0);
        values[Feature::WeekendPreference.index()] = raw.weekend_views as f64 / (views + 1.0);
        values[Feature::SessionRegularity.index()] = Self::session_regularity(raw);

        // Loyalty / maturity
        values[Feature::PlatformTenure.index()] = saturate(raw.tenure_days, 90.0);
        values[Feature::RecencyScore.index()] = if raw.last_activity.is_some() {
            (-raw.days_since_last_activity / 14.0).exp()
        } else {
            0.0
        };

        FeatureVector::new(raw.user_id.clone(), values)
    }

    /// Rewards sessions that are long, binge-qualified and rarely interrupted
    fn binge_score(raw: &RawUserMetrics, session_depth: f64) -> f64 {
        let binge_share = raw.binge_session_count as f64 / (raw.session_count as f64 + 1.0);
        let interruptions_per_view = raw.total_interruptions as f64 / (raw.view_count.max(1)) as f64;
        let continuity = 1.0 - saturate(interruptions_per_view, 2.0);
        0.6 * binge_share + 0.4 * session_depth * continuity
    }

    /// 0.5 = rates like the cohort; > 0.5 rates lower than the cohort
    fn rating_criticalness(raw: &RawUserMetrics, cohort: &CohortContext) -> f64 {
        if raw.rating_count == 0 {
            return 0.5;
        }
        let smoothed = smoothed_ratio(
            raw.rating_sum,
            raw.rating_count as f64,
            cohort.average_rating,
            1.0,
        );
        0.5 + (cohort.average_rating - smoothed) / 4.0
    }

    /// 1 / (1 + coefficient of variation) of inter-session gaps
    fn session_regularity(raw: &RawUserMetrics) -> f64 {
        if raw.session_count < 3 || raw.session_gap_mean_hours <= 0.0 {
            return 0.0;
        }
        let cv = raw.session_gap_std_hours / raw.session_gap_mean_hours;
        1.0 / (1.0 + cv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_zero_activity_is_finite_and_bounded() {
        let raw = RawUserMetrics {
            user_id: "idle".into(),
            observation_days: 90.0,
            ..Default::default()
        };

        let vector = FeatureEngineer::new().engineer(&raw, &CohortContext::default());
        for feature in Feature::ALL {
            let v = vector.get(feature);
            assert!(v.is_finite(), "{} not finite", feature);
            assert!((0.0..=1.0).contains(&v), "{} out of range: {}", feature, v);
        }
        assert_eq!(vector.get(Feature::EngagementIntensity), 0.0);
        assert_eq!(vector.get(Feature::ContentCompletionTendency), 0.5);
        assert_eq!(vector.get(Feature::RatingCriticalness), 0.5);
    }

    #[test]
    fn test_normalized_entropy() {
        let uniform = [5u32, 5, 5, 5];
        assert!((normalized_entropy(uniform.iter()) - 1.0).abs() < 1e-9);

        let single = [10u32];
        assert_eq!(normalized_entropy(single.iter()), 0.0);

        let skewed = [9u32, 1];
        let e = normalized_entropy(skewed.iter());
        assert!(e > 0.0 && e < 1.0);
    }

    #[test]
    fn test_diversity_from_category_histogram() {
        let mut histogram = BTreeMap::new();
        histogram.insert("math".to_string(), 4);
        histogram.insert("history".to_string(), 4);
        let raw = RawUserMetrics {
            user_id: "u".into(),
            view_count: 8,
            category_histogram: histogram,
            ..Default::default()
        };

        let vector = FeatureEngineer::new().engineer(&raw, &CohortContext::default());
        assert!((vector.get(Feature::ContentDiversityIndex) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rating_criticalness_relative_to_cohort() {
        let harsh = RawUserMetrics {
            user_id: "harsh".into(),
            rating_count: 10,
            rating_sum: 15.0,
            ..Default::default()
        };
        let generous = RawUserMetrics {
            user_id: "generous".into(),
            rating_count: 10,
            rating_sum: 50.0,
            ..Default::default()
        };
        let cohort = CohortContext::from_metrics(&[harsh.clone(), generous.clone()]);
        assert!((cohort.average_rating - 3.25).abs() < 1e-9);

        let engineer = FeatureEngineer::new();
        let h = engineer.engineer(&harsh, &cohort).get(Feature::RatingCriticalness);
        let g = engineer.engineer(&generous, &cohort).get(Feature::RatingCriticalness);
        assert!(h > 0.5);
        assert!(g < 0.5);
    }

    #[test]
    fn test_binge_score_rewards_long_uninterrupted_sessions() {
        let binger = RawUserMetrics {
            user_id: "binger".into(),
            view_count: 20,
            session_count: 4,
            binge_session_count: 4,
            avg_videos_per_session: 5.0,
            total_interruptions: 0,
            ..Default::default()
        };
        let sampler = RawUserMetrics {
            user_id: "sampler".into(),
            view_count: 20,
            session_count: 20,
            binge_session_count: 0,
            avg_videos_per_session: 1.0,
            total_interruptions: 60,
            ..Default::default()
        };

        let engineer = FeatureEngineer::new();
        let cohort = CohortContext::default();
        let b = engineer.engineer(&binger, &cohort).get(Feature::BingeWatchingScore);
        let s = engineer.engineer(&sampler, &cohort).get(Feature::BingeWatchingScore);
        assert!(b > 0.7, "binger score {}", b);
        assert!(s < 0.1, "sampler score {}", s);
    }
}
