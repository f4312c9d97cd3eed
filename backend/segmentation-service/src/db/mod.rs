// ============================================
// Interaction Store (行為日誌讀取層)
// ============================================
//
// Read-only access to the five interaction log kinds the feature
// extractor consumes, plus the recommendable catalog. The store is an
// I/O boundary: timeouts are enforced by the caller.

pub mod memory_store;
pub mod pg_store;

pub use memory_store::{InMemoryInteractionStore, UserLogs};
pub use pg_store::PgInteractionStore;

use crate::error::Result;
use crate::models::{
    CandidateItem, Feedback, HoverEvent, NavigationEvent, SearchQuery, ViewingSession,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Whether the user exists in the user store at all
    async fn user_exists(&self, user_id: &str) -> Result<bool>;

    async fn fetch_viewing_sessions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ViewingSession>>;

    async fn fetch_search_queries(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchQuery>>;

    async fn fetch_feedback(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Feedback>>;

    async fn fetch_hover_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<HoverEvent>>;

    async fn fetch_navigation_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<NavigationEvent>>;

    /// Most recently active users, newest first
    async fn list_active_users(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<String>>;

    /// Most popular live items. With `exclude_viewed_by`, items that user has
    /// ever viewed are dropped before the limit applies, regardless of the
    /// lookback window.
    async fn fetch_candidate_items(
        &self,
        limit: usize,
        exclude_viewed_by: Option<String>,
    ) -> Result<Vec<CandidateItem>>;
}
