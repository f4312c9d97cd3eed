//! In-process [`InteractionStore`] used by tests and local runs without a database.

use super::InteractionStore;
use crate::error::Result;
use crate::models::{
    CandidateItem, Feedback, HoverEvent, NavigationEvent, SearchQuery, ViewingSession,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// All logs recorded for one user
#[derive(Debug, Clone, Default)]
pub struct UserLogs {
    pub views: Vec<ViewingSession>,
    pub searches: Vec<SearchQuery>,
    pub feedback: Vec<Feedback>,
    pub hovers: Vec<HoverEvent>,
    pub navigation: Vec<NavigationEvent>,
}

impl UserLogs {
    fn latest_activity(&self) -> Option<DateTime<Utc>> {
        self.views
            .iter()
            .map(|v| v.started_at)
            .chain(self.searches.iter().map(|s| s.searched_at))
            .chain(self.feedback.iter().map(|f| f.created_at))
            .chain(self.hovers.iter().map(|h| h.hovered_at))
            .chain(self.navigation.iter().map(|n| n.visited_at))
            .max()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryInteractionStore {
    users: BTreeMap<String, UserLogs>,
    items: Vec<CandidateItem>,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, optionally without any activity
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.users.entry(user_id.into()).or_default();
        self
    }

    pub fn with_logs(mut self, user_id: impl Into<String>, logs: UserLogs) -> Self {
        self.users.insert(user_id.into(), logs);
        self
    }

    pub fn with_views(mut self, user_id: impl Into<String>, views: Vec<ViewingSession>) -> Self {
        self.users.entry(user_id.into()).or_default().views.extend(views);
        self
    }

    pub fn with_items(mut self, items: Vec<CandidateItem>) -> Self {
        self.items.extend(items);
        self
    }

    fn logs(&self, user_id: &str) -> Option<&UserLogs> {
        self.users.get(user_id)
    }
}

#[async_trait]
impl InteractionStore for InMemoryInteractionStore {
    async fn user_exists(&self, user_id: &str) -> Result<bool> {
        Ok(self.users.contains_key(user_id))
    }

    async fn fetch_viewing_sessions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ViewingSession>> {
        Ok(self
            .logs(user_id)
            .map(|l| {
                l.views
                    .iter()
                    .filter(|v| v.started_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_search_queries(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchQuery>> {
        Ok(self
            .logs(user_id)
            .map(|l| {
                l.searches
                    .iter()
                    .filter(|s| s.searched_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_feedback(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Feedback>> {
        Ok(self
            .logs(user_id)
            .map(|l| {
                l.feedback
                    .iter()
                    .filter(|f| f.created_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_hover_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<HoverEvent>> {
        Ok(self
            .logs(user_id)
            .map(|l| {
                l.hovers
                    .iter()
                    .filter(|h| h.hovered_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_navigation_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<NavigationEvent>> {
        Ok(self
            .logs(user_id)
            .map(|l| {
                l.navigation
                    .iter()
                    .filter(|n| n.visited_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_active_users(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<String>> {
        let mut active: Vec<(DateTime<Utc>, &String)> = self
            .users
            .iter()
            .filter_map(|(id, logs)| logs.latest_activity().map(|ts| (ts, id)))
            .filter(|(ts, _)| *ts >= since)
            .collect();

        // Newest first, ties by id for a stable cohort
        active.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        Ok(active
            .into_iter()
            .take(limit)
            .map(|(_, id)| id.clone())
            .collect())
    }

    async fn fetch_candidate_items(
        &self,
        limit: usize,
        exclude_viewed_by: Option<String>,
    ) -> Result<Vec<CandidateItem>> {
        let viewed: HashSet<&str> = exclude_viewed_by
            .as_deref()
            .and_then(|user_id| self.logs(user_id))
            .map(|l| l.views.iter().map(|v| v.video_id.as_str()).collect())
            .unwrap_or_default();

        Ok(self
            .items
            .iter()
            .filter(|item| !viewed.contains(item.item_id.as_str()))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn view(video_id: &str, at: DateTime<Utc>) -> ViewingSession {
        ViewingSession {
            video_id: video_id.to_string(),
            category: Some("math".to_string()),
            watch_seconds: 300.0,
            video_duration_seconds: 600.0,
            completion_rate: 0.5,
            pause_count: 0,
            seek_count: 0,
            from_playlist: false,
            started_at: at,
        }
    }

    #[tokio::test]
    async fn test_registered_user_without_activity() {
        let store = InMemoryInteractionStore::new().with_user("idle");

        assert!(store.user_exists("idle").await.unwrap());
        assert!(!store.user_exists("ghost").await.unwrap());

        let since = Utc::now() - Duration::days(30);
        let active = store.list_active_users(since, 10).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_search_only_user_is_active() {
        let now = Utc::now();
        let logs = UserLogs {
            searches: vec![SearchQuery {
                query: "linear algebra".into(),
                results_clicked: 1,
                searched_at: now - Duration::hours(1),
            }],
            ..Default::default()
        };
        let store = InMemoryInteractionStore::new()
            .with_logs("searcher", logs)
            .with_views("viewer", vec![view("v1", now - Duration::days(3))]);

        let active = store
            .list_active_users(now - Duration::days(30), 10)
            .await
            .unwrap();
        // Most recent activity first
        assert_eq!(active, vec!["searcher".to_string(), "viewer".to_string()]);
    }

    fn catalog_item(item_id: &str) -> CandidateItem {
        CandidateItem {
            item_id: item_id.to_string(),
            title: item_id.to_string(),
            category: Some("math".to_string()),
            average_rating: 4.0,
            duration_seconds: 600.0,
            view_count: 10,
            is_series: false,
        }
    }

    #[tokio::test]
    async fn test_candidates_exclude_views_outside_lookback() {
        let now = Utc::now();
        let store = InMemoryInteractionStore::new()
            .with_views("u1", vec![view("long-ago", now - Duration::days(200))])
            .with_items(vec![catalog_item("long-ago"), catalog_item("fresh")]);

        let all = store.fetch_candidate_items(10, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let unseen = store
            .fetch_candidate_items(10, Some("u1".to_string()))
            .await
            .unwrap();
        assert_eq!(
            unseen.iter().map(|i| i.item_id.as_str()).collect::<Vec<_>>(),
            vec!["fresh"]
        );
    }

    #[tokio::test]
    async fn test_lookback_window_filters_old_views() {
        let now = Utc::now();
        let store = InMemoryInteractionStore::new().with_views(
            "u1",
            vec![view("old", now - Duration::days(100)), view("new", now)],
        );

        let views = store
            .fetch_viewing_sessions("u1", now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].video_id, "new");
    }
}
