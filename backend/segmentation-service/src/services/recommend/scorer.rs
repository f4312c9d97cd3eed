/// Segment-aware candidate scoring
///
/// Scores the catalog for one user from three terms: what peers in the same
/// segment watch, how well an item fits the segment's profile, and how new
/// the item's category is to the user.
use super::{ClusterInfo, RecommendOptions, Recommendation, TermWeights};
use crate::models::CandidateItem;
use crate::services::clustering::Cluster;
use crate::services::features::{normalize_category, Feature, RawUserMetrics};
use crate::services::segments::SegmentCharacteristics;
use std::collections::HashMap;
use tracing::debug;

/// Score given to items without a category for the novelty term
const UNKNOWN_CATEGORY_NOVELTY: f64 = 0.5;
/// Minutes at which an item counts as ~63% "long form"
const LONG_FORM_SCALE_MINUTES: f64 = 15.0;
const MAX_RATING: f64 = 5.0;

/// Viewing counts of a user's segment peers (target excluded)
#[derive(Debug, Clone, Default)]
pub struct PeerActivity {
    peer_count: usize,
    item_viewers: HashMap<String, usize>,
}

impl PeerActivity {
    pub fn from_peers<'a>(peers: impl IntoIterator<Item = &'a RawUserMetrics>) -> Self {
        let mut activity = Self::default();
        for peer in peers {
            activity.peer_count += 1;
            for item in &peer.viewed_items {
                *activity.item_viewers.entry(item.clone()).or_insert(0) += 1;
            }
        }
        activity
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    /// Share of peers who viewed the item
    pub fn share(&self, item_id: &str) -> f64 {
        if self.peer_count == 0 {
            return 0.0;
        }
        self.item_viewers.get(item_id).copied().unwrap_or(0) as f64 / self.peer_count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Collaborative,
    Content,
    Exploration,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentRecommender;

impl SegmentRecommender {
    pub fn new() -> Self {
        Self
    }

    /// Ranks candidates for `target`. Viewed items are dropped before scoring
    /// when `exclude_viewed` is set; an empty pool yields an empty list.
    pub fn recommend(
        &self,
        target: &RawUserMetrics,
        cluster: &Cluster,
        characteristics: &SegmentCharacteristics,
        peers: &PeerActivity,
        candidates: &[CandidateItem],
        options: &RecommendOptions,
    ) -> Vec<Recommendation> {
        let weights = TermWeights::for_strategy(characteristics.recommendation_strategy)
            .adjusted(options.context_type, options.include_exploration);

        let pool: Vec<&CandidateItem> = candidates
            .iter()
            .filter(|item| !(options.exclude_viewed && target.viewed_items.contains(&item.item_id)))
            .collect();

        let max_views = pool.iter().map(|i| i.view_count.max(0)).max().unwrap_or(0);
        let top_category_count = target.category_histogram.values().copied().max().unwrap_or(0);

        let mut scored: Vec<Recommendation> = pool
            .into_iter()
            .map(|item| {
                let collaborative = peers.share(&item.item_id);
                let content = 0.5 * category_affinity(item, target, top_category_count)
                    + 0.5 * profile_match(item, characteristics, max_views);
                let exploration = novelty(item, target);

                let contributions = [
                    (Term::Collaborative, weights.collaborative * collaborative),
                    (Term::Content, weights.content * content),
                    (Term::Exploration, weights.exploration * exploration),
                ];
                let score = contributions.iter().map(|(_, c)| c).sum::<f64>().clamp(0.0, 1.0);
                let dominant = contributions
                    .iter()
                    .fold(contributions[0], |best, next| if next.1 > best.1 { *next } else { best })
                    .0;

                Recommendation {
                    item_id: item.item_id.clone(),
                    title: item.title.clone(),
                    score,
                    segment_strategy: characteristics.recommendation_strategy,
                    reasoning: reasoning(dominant, item, collaborative, characteristics),
                    cluster_info: ClusterInfo {
                        cluster_id: cluster.cluster_id,
                        cluster_size: cluster.cluster_size,
                        user_type: characteristics.user_type,
                    },
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        scored.truncate(options.count);

        debug!(
            user_id = %target.user_id,
            strategy = characteristics.recommendation_strategy.as_str(),
            returned = scored.len(),
            "Scored candidates"
        );

        scored
    }
}

fn views_in_category(target: &RawUserMetrics, category: &str) -> u32 {
    target
        .category_histogram
        .get(&normalize_category(category))
        .copied()
        .unwrap_or(0)
}

/// Share of the user's views in the item's category, relative to their top category
fn category_affinity(item: &CandidateItem, target: &RawUserMetrics, top_count: u32) -> f64 {
    match &item.category {
        Some(category) if top_count > 0 => {
            views_in_category(target, category) as f64 / top_count as f64
        }
        _ => 0.0,
    }
}

/// 1 - weighted mean gap between item attributes and the segment's preferences.
/// Attributes tied to a dominant feature weigh 1 + its importance.
fn profile_match(item: &CandidateItem, segment: &SegmentCharacteristics, max_views: i64) -> f64 {
    let popularity = if max_views > 0 {
        (1.0 + item.view_count.max(0) as f64).ln() / (1.0 + max_views as f64).ln()
    } else {
        0.0
    };
    let long_form = 1.0 - (-(item.duration_seconds.max(0.0) / 60.0) / LONG_FORM_SCALE_MINUTES).exp();

    let pairs = [
        (Feature::PlaylistUsage, if item.is_series { 1.0 } else { 0.0 }),
        (
            Feature::QualityPreferenceScore,
            (item.average_rating / MAX_RATING).clamp(0.0, 1.0),
        ),
        (Feature::AverageWatchDuration, long_form),
        (Feature::ContentExplorationRate, 1.0 - popularity),
    ];

    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (feature, attribute) in pairs {
        let weight = 1.0
            + segment
                .dominant_features
                .iter()
                .find(|d| d.feature == feature)
                .map_or(0.0, |d| d.importance);
        let preference = segment.profile_value(feature);
        total += weight * (1.0 - (attribute - preference).abs());
        weight_sum += weight;
    }

    (total / weight_sum).clamp(0.0, 1.0)
}

/// 1 for unseen categories, decaying with how often the user watched it
fn novelty(item: &CandidateItem, target: &RawUserMetrics) -> f64 {
    match &item.category {
        Some(category) => {
            let seen = views_in_category(target, category);
            1.0 / (1.0 + seen as f64)
        }
        None => UNKNOWN_CATEGORY_NOVELTY,
    }
}

fn reasoning(
    term: Term,
    item: &CandidateItem,
    peer_share: f64,
    segment: &SegmentCharacteristics,
) -> String {
    match term {
        Term::Collaborative => format!(
            "Watched by {:.0}% of viewers in your {} segment",
            peer_share * 100.0,
            segment.user_type.as_str()
        ),
        Term::Content => match &item.category {
            Some(category) => format!(
                "Matches your interest in {} and the {} profile of your segment",
                category,
                segment.recommendation_strategy.as_str()
            ),
            None => format!(
                "Fits the {} profile of your segment",
                segment.recommendation_strategy.as_str()
            ),
        },
        Term::Exploration => match &item.category {
            Some(category) => format!("Something new outside your usual topics: {}", category),
            None => "Something new outside your usual topics".to_string(),
        },
    }
}
