//! Interaction log records read from the store, plus the candidate catalog entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One video view.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ViewingSession {
    pub video_id: String,
    pub category: Option<String>,
    pub watch_seconds: f64,
    pub video_duration_seconds: f64,
    /// Fraction of the video watched (0-1)
    pub completion_rate: f64,
    pub pause_count: i32,
    pub seek_count: i32,
    pub from_playlist: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchQuery {
    pub query: String,
    pub results_clicked: i32,
    pub searched_at: DateTime<Utc>,
}

/// Rating (1-5) with an optional written review.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub video_id: String,
    pub rating: i32,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HoverEvent {
    pub video_id: String,
    pub hover_ms: i32,
    pub clicked: bool,
    pub hovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NavigationEvent {
    pub page_type: String,
    pub time_on_page_seconds: f64,
    pub visited_at: DateTime<Utc>,
}

/// Recommendable catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    pub item_id: String,
    pub title: String,
    pub category: Option<String>,
    pub average_rating: f64,
    pub duration_seconds: f64,
    pub view_count: i64,
    /// Part of a playlist or series
    pub is_series: bool,
}
