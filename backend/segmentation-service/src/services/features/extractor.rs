// ============================================
// Feature Extractor (原始行為指標抽取)
// ============================================
//
// Reduces a user's raw interaction logs into a flat RawUserMetrics record:
// 1. Viewing sessions (completion, interruptions, binge sessions)
// 2. Search queries (volume, click-through, term diversity)
// 3. Feedback (rating volume/average, review length)
// 4. Hover interactions (significant hovers, hover-to-click)
// 5. Navigation (page breadth)
//
// Missing log kinds aggregate to zero. A user with no record in any kind
// is reported as DataUnavailable.

use crate::db::InteractionStore;
use crate::error::{AppError, Result};
use crate::models::{Feedback, HoverEvent, NavigationEvent, SearchQuery, ViewingSession};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Views at or above this completion count as completed
const COMPLETED_VIEW_THRESHOLD: f64 = 0.9;
/// Minimum videos in one session for it to count as a binge
const BINGE_MIN_VIDEOS: usize = 3;
/// Minimum mean completion inside a binge session
const BINGE_MIN_COMPLETION: f64 = 0.7;
/// Ratings at or above this are "high" ratings
const HIGH_RATING: i32 = 4;

/// Canonical form of a category label. Histogram keys and catalog lookups
/// must both go through this.
pub fn normalize_category(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Per-user aggregates pulled from the logs. Created fresh per request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawUserMetrics {
    pub user_id: String,

    // Viewing
    pub view_count: u32,
    pub viewed_items: BTreeSet<String>,
    pub total_watch_seconds: f64,
    pub completion_sum: f64,
    pub avg_completion_rate: f64,
    pub completed_views: u32,
    pub total_interruptions: u32,
    pub playlist_views: u32,
    pub category_histogram: BTreeMap<String, u32>,
    pub hour_histogram: [u32; 24],
    pub weekend_views: u32,
    pub night_views: u32,

    // Sessions
    pub session_count: u32,
    pub binge_session_count: u32,
    pub avg_videos_per_session: f64,
    /// Mean hours between consecutive session starts
    pub session_gap_mean_hours: f64,
    pub session_gap_std_hours: f64,

    // Search
    pub search_count: u32,
    pub unique_search_terms: u32,
    pub search_clicks: u32,

    // Feedback
    pub rating_count: u32,
    pub rating_sum: f64,
    pub high_rating_count: u32,
    pub review_count: u32,
    pub review_chars_total: u64,

    // Hover
    pub hover_count: u32,
    pub significant_hover_count: u32,
    pub hover_click_count: u32,

    // Navigation
    pub navigation_count: u32,
    pub unique_page_types: u32,

    // Activity span
    pub active_days: u32,
    pub observation_days: f64,
    pub first_activity: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub tenure_days: f64,
    pub days_since_last_activity: f64,
}

impl RawUserMetrics {
    pub fn avg_rating(&self) -> Option<f64> {
        if self.rating_count == 0 {
            None
        } else {
            Some(self.rating_sum / self.rating_count as f64)
        }
    }

    pub fn unique_videos(&self) -> u32 {
        self.viewed_items.len() as u32
    }

    pub fn has_activity(&self) -> bool {
        self.view_count > 0
            || self.search_count > 0
            || self.rating_count > 0
            || self.hover_count > 0
            || self.navigation_count > 0
    }
}

/// All log kinds of one user within the lookback window
#[derive(Debug, Clone, Default)]
pub struct InteractionLogs {
    pub views: Vec<ViewingSession>,
    pub searches: Vec<SearchQuery>,
    pub feedback: Vec<Feedback>,
    pub hovers: Vec<HoverEvent>,
    pub navigation: Vec<NavigationEvent>,
}

impl InteractionLogs {
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
            && self.searches.is_empty()
            && self.feedback.is_empty()
            && self.hovers.is_empty()
            && self.navigation.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub lookback_days: i64,
    /// Hovers at or above this duration count as significant
    pub significant_hover_ms: u32,
    /// Views further apart than this start a new session
    pub binge_gap_minutes: i64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            significant_hover_ms: 1500,
            binge_gap_minutes: 30,
        }
    }
}

pub struct FeatureExtractor {
    store: Arc<dyn InteractionStore>,
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(store: Arc<dyn InteractionStore>, config: ExtractorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Fetch all log kinds for a user and reduce them.
    pub async fn extract(&self, user_id: &str, now: DateTime<Utc>) -> Result<RawUserMetrics> {
        let since = now - Duration::days(self.config.lookback_days);

        let (views, searches, feedback, hovers, navigation) = tokio::try_join!(
            self.store.fetch_viewing_sessions(user_id, since),
            self.store.fetch_search_queries(user_id, since),
            self.store.fetch_feedback(user_id, since),
            self.store.fetch_hover_events(user_id, since),
            self.store.fetch_navigation_events(user_id, since),
        )?;

        let logs = InteractionLogs {
            views,
            searches,
            feedback,
            hovers,
            navigation,
        };

        if logs.is_empty() {
            warn!(user_id = user_id, "No interaction records in any log kind");
            return Err(AppError::DataUnavailable(user_id.to_string()));
        }

        debug!(
            user_id = user_id,
            views = logs.views.len(),
            searches = logs.searches.len(),
            ratings = logs.feedback.len(),
            hovers = logs.hovers.len(),
            navigation = logs.navigation.len(),
            "Fetched interaction logs"
        );

        Ok(self.reduce(user_id, &logs, now))
    }

    /// Pure reduction of logs into raw metrics
    pub fn reduce(&self, user_id: &str, logs: &InteractionLogs, now: DateTime<Utc>) -> RawUserMetrics {
        let mut metrics = RawUserMetrics {
            user_id: user_id.to_string(),
            observation_days: self.config.lookback_days as f64,
            ..Default::default()
        };

        self.reduce_views(&mut metrics, &logs.views);
        self.reduce_sessions(&mut metrics, &logs.views);
        Self::reduce_searches(&mut metrics, &logs.searches);
        Self::reduce_feedback(&mut metrics, &logs.feedback);
        self.reduce_hovers(&mut metrics, &logs.hovers);
        Self::reduce_navigation(&mut metrics, &logs.navigation);
        Self::reduce_activity_span(&mut metrics, logs, now);

        metrics
    }

    fn reduce_views(&self, metrics: &mut RawUserMetrics, views: &[ViewingSession]) {
        for view in views {
            let completion = view.completion_rate.clamp(0.0, 1.0);

            metrics.view_count += 1;
            metrics.viewed_items.insert(view.video_id.clone());
            metrics.total_watch_seconds += view.watch_seconds.max(0.0);
            metrics.completion_sum += completion;
            if completion >= COMPLETED_VIEW_THRESHOLD {
                metrics.completed_views += 1;
            }
            metrics.total_interruptions += (view.pause_count.max(0) + view.seek_count.max(0)) as u32;
            if view.from_playlist {
                metrics.playlist_views += 1;
            }
            if let Some(category) = &view.category {
                *metrics
                    .category_histogram
                    .entry(normalize_category(category))
                    .or_insert(0) += 1;
            }

            let hour = view.started_at.hour() as usize;
            metrics.hour_histogram[hour] += 1;
            if matches!(view.started_at.weekday(), Weekday::Sat | Weekday::Sun) {
                metrics.weekend_views += 1;
            }
            if hour >= 22 || hour < 5 {
                metrics.night_views += 1;
            }
        }

        if metrics.view_count > 0 {
            metrics.avg_completion_rate = metrics.completion_sum / metrics.view_count as f64;
        }
    }

    /// Group views into sessions and detect binge sessions
    fn reduce_sessions(&self, metrics: &mut RawUserMetrics, views: &[ViewingSession]) {
        if views.is_empty() {
            return;
        }

        let mut ordered: Vec<&ViewingSession> = views.iter().collect();
        ordered.sort_by_key(|v| v.started_at);

        let max_gap = Duration::minutes(self.config.binge_gap_minutes);
        let mut sessions: Vec<Vec<&ViewingSession>> = Vec::new();
        let mut current: Vec<&ViewingSession> = Vec::new();
        let mut previous_end: Option<DateTime<Utc>> = None;

        for view in ordered {
            if let Some(end) = previous_end {
                if view.started_at - end > max_gap {
                    sessions.push(std::mem::take(&mut current));
                }
            }
            let watched = Duration::milliseconds((view.watch_seconds.max(0.0) * 1000.0) as i64);
            previous_end = Some(view.started_at + watched);
            current.push(view);
        }
        if !current.is_empty() {
            sessions.push(current);
        }

        metrics.session_count = sessions.len() as u32;
        metrics.avg_videos_per_session = views.len() as f64 / sessions.len() as f64;
        metrics.binge_session_count = sessions
            .iter()
            .filter(|s| {
                s.len() >= BINGE_MIN_VIDEOS
                    && s.iter().map(|v| v.completion_rate.clamp(0.0, 1.0)).sum::<f64>()
                        / s.len() as f64
                        >= BINGE_MIN_COMPLETION
            })
            .count() as u32;

        // Gaps between session starts
        let gaps: Vec<f64> = sessions
            .windows(2)
            .map(|pair| (pair[1][0].started_at - pair[0][0].started_at).num_seconds() as f64 / 3600.0)
            .collect();
        if !gaps.is_empty() {
            let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
            let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
            metrics.session_gap_mean_hours = mean;
            metrics.session_gap_std_hours = variance.sqrt();
        }
    }

    fn reduce_searches(metrics: &mut RawUserMetrics, searches: &[SearchQuery]) {
        let mut terms: HashSet<String> = HashSet::new();
        for search in searches {
            metrics.search_count += 1;
            metrics.search_clicks += search.results_clicked.max(0) as u32;
            let normalized = search.query.trim().to_lowercase();
            if !normalized.is_empty() {
                terms.insert(normalized);
            }
        }
        metrics.unique_search_terms = terms.len() as u32;
    }

    fn reduce_feedback(metrics: &mut RawUserMetrics, feedback: &[Feedback]) {
        for entry in feedback {
            let rating = entry.rating.clamp(1, 5);
            metrics.rating_count += 1;
            metrics.rating_sum += rating as f64;
            if rating >= HIGH_RATING {
                metrics.high_rating_count += 1;
            }
            if let Some(review) = entry.review.as_deref().map(str::trim) {
                if !review.is_empty() {
                    metrics.review_count += 1;
                    metrics.review_chars_total += review.chars().count() as u64;
                }
            }
        }
    }

    fn reduce_hovers(&self, metrics: &mut RawUserMetrics, hovers: &[HoverEvent]) {
        for hover in hovers {
            metrics.hover_count += 1;
            if hover.hover_ms.max(0) as u32 >= self.config.significant_hover_ms {
                metrics.significant_hover_count += 1;
            }
            if hover.clicked {
                metrics.hover_click_count += 1;
            }
        }
    }

    fn reduce_navigation(metrics: &mut RawUserMetrics, navigation: &[NavigationEvent]) {
        let pages: HashSet<&str> = navigation.iter().map(|n| n.page_type.as_str()).collect();
        metrics.navigation_count = navigation.len() as u32;
        metrics.unique_page_types = pages.len() as u32;
    }

    fn reduce_activity_span(metrics: &mut RawUserMetrics, logs: &InteractionLogs, now: DateTime<Utc>) {
        let timestamps: Vec<DateTime<Utc>> = logs
            .views
            .iter()
            .map(|v| v.started_at)
            .chain(logs.searches.iter().map(|s| s.searched_at))
            .chain(logs.feedback.iter().map(|f| f.created_at))
            .chain(logs.hovers.iter().map(|h| h.hovered_at))
            .chain(logs.navigation.iter().map(|n| n.visited_at))
            .collect();

        let days: HashSet<NaiveDate> = timestamps.iter().map(|ts| ts.date_naive()).collect();
        metrics.active_days = days.len() as u32;
        metrics.first_activity = timestamps.iter().min().copied();
        metrics.last_activity = timestamps.iter().max().copied();

        if let Some(first) = metrics.first_activity {
            metrics.tenure_days = ((now - first).num_seconds() as f64 / 86400.0).max(0.0);
        }
        if let Some(last) = metrics.last_activity {
            metrics.days_since_last_activity = ((now - last).num_seconds() as f64 / 86400.0).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryInteractionStore;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        // 2024-06-03 is a Monday
        Utc.with_ymd_and_hms(2024, 6, day, hour, minute, 0).unwrap()
    }

    fn view(video_id: &str, category: &str, at: DateTime<Utc>, completion: f64) -> ViewingSession {
        ViewingSession {
            video_id: video_id.to_string(),
            category: Some(category.to_string()),
            watch_seconds: 600.0 * completion,
            video_duration_seconds: 600.0,
            completion_rate: completion,
            pause_count: 1,
            seek_count: 0,
            from_playlist: false,
            started_at: at,
        }
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(
            Arc::new(InMemoryInteractionStore::new()),
            ExtractorConfig::default(),
        )
    }

    #[test]
    fn test_binge_session_detection() {
        let logs = InteractionLogs {
            views: vec![
                view("a", "math", ts(3, 20, 0), 1.0),
                view("b", "math", ts(3, 20, 12), 0.9),
                view("c", "math", ts(3, 20, 25), 0.8),
                // Next day: separate, short session
                view("d", "art", ts(4, 9, 0), 0.2),
            ],
            ..Default::default()
        };

        let metrics = extractor().reduce("u1", &logs, ts(5, 0, 0));
        assert_eq!(metrics.session_count, 2);
        assert_eq!(metrics.binge_session_count, 1);
        assert_eq!(metrics.view_count, 4);
        assert_eq!(metrics.completed_views, 2);
        assert_eq!(metrics.category_histogram.get("math"), Some(&3));
        assert!((metrics.avg_videos_per_session - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_temporal_buckets() {
        let logs = InteractionLogs {
            views: vec![
                view("a", "math", ts(8, 23, 0), 0.5), // Saturday night
                view("b", "math", ts(3, 12, 0), 0.5), // Monday noon
            ],
            ..Default::default()
        };

        let metrics = extractor().reduce("u1", &logs, ts(10, 0, 0));
        assert_eq!(metrics.weekend_views, 1);
        assert_eq!(metrics.night_views, 1);
        assert_eq!(metrics.hour_histogram[23], 1);
        assert_eq!(metrics.active_days, 2);
    }

    #[test]
    fn test_category_labels_are_normalized() {
        let logs = InteractionLogs {
            views: vec![
                view("a", "Math", ts(3, 10, 0), 0.5),
                view("b", " math ", ts(4, 10, 0), 0.5),
            ],
            ..Default::default()
        };

        let metrics = extractor().reduce("u1", &logs, ts(10, 0, 0));
        assert_eq!(metrics.category_histogram.len(), 1);
        assert_eq!(metrics.category_histogram.get("math"), Some(&2));
    }

    #[test]
    fn test_feedback_and_hovers() {
        let logs = InteractionLogs {
            feedback: vec![
                Feedback {
                    video_id: "a".into(),
                    rating: 5,
                    review: Some("Great explanation".into()),
                    created_at: ts(3, 10, 0),
                },
                Feedback {
                    video_id: "b".into(),
                    rating: 2,
                    review: Some("   ".into()),
                    created_at: ts(3, 11, 0),
                },
            ],
            hovers: vec![
                HoverEvent {
                    video_id: "a".into(),
                    hover_ms: 2000,
                    clicked: true,
                    hovered_at: ts(3, 9, 0),
                },
                HoverEvent {
                    video_id: "b".into(),
                    hover_ms: 300,
                    clicked: false,
                    hovered_at: ts(3, 9, 1),
                },
            ],
            ..Default::default()
        };

        let metrics = extractor().reduce("u1", &logs, ts(4, 0, 0));
        assert_eq!(metrics.rating_count, 2);
        assert_eq!(metrics.high_rating_count, 1);
        assert_eq!(metrics.review_count, 1);
        assert_eq!(metrics.avg_rating(), Some(3.5));
        assert_eq!(metrics.significant_hover_count, 1);
        assert_eq!(metrics.hover_click_count, 1);
        assert_eq!(metrics.view_count, 0);
        assert!(metrics.has_activity());
    }

    #[tokio::test]
    async fn test_user_without_records_is_unavailable() {
        let store = InMemoryInteractionStore::new().with_user("idle");
        let extractor = FeatureExtractor::new(Arc::new(store), ExtractorConfig::default());

        let result = extractor.extract("idle", Utc::now()).await;
        assert!(matches!(result, Err(AppError::DataUnavailable(_))));
    }
}
