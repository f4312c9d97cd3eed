//! PostgreSQL implementation of [`InteractionStore`].
//!
//! Reads the web application's log tables (`video_views`, `search_logs`,
//! `video_ratings`, `hover_interactions`, `navigation_events`) joined with
//! `videos` for category and duration.

use super::InteractionStore;
use crate::error::Result;
use crate::models::{
    CandidateItem, Feedback, HoverEvent, NavigationEvent, SearchQuery, ViewingSession,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

/// Upper bound on rows read per log kind and user
const MAX_ROWS_PER_KIND: i64 = 20_000;

#[derive(Clone)]
pub struct PgInteractionStore {
    pool: PgPool,
}

impl PgInteractionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InteractionStore for PgInteractionStore {
    async fn user_exists(&self, user_id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id::text = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn fetch_viewing_sessions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ViewingSession>> {
        let rows = sqlx::query_as::<_, ViewingSession>(
            r#"
            SELECT
                vv.video_id::text AS video_id,
                v.category AS category,
                vv.watch_seconds::FLOAT8 AS watch_seconds,
                COALESCE(v.duration_seconds, 0)::FLOAT8 AS video_duration_seconds,
                LEAST(GREATEST(vv.completion_rate, 0), 1)::FLOAT8 AS completion_rate,
                COALESCE(vv.pause_count, 0)::INT4 AS pause_count,
                COALESCE(vv.seek_count, 0)::INT4 AS seek_count,
                (vv.playlist_id IS NOT NULL) AS from_playlist,
                vv.started_at AS started_at
            FROM video_views vv
            LEFT JOIN videos v ON v.id = vv.video_id
            WHERE vv.user_id::text = $1 AND vv.started_at >= $2
            ORDER BY vv.started_at ASC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(MAX_ROWS_PER_KIND)
        .fetch_all(&self.pool)
        .await?;

        debug!(user_id = user_id, count = rows.len(), "Fetched viewing sessions");
        Ok(rows)
    }

    async fn fetch_search_queries(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchQuery>> {
        let rows = sqlx::query_as::<_, SearchQuery>(
            r#"
            SELECT
                query,
                COALESCE(results_clicked, 0)::INT4 AS results_clicked,
                searched_at
            FROM search_logs
            WHERE user_id::text = $1 AND searched_at >= $2
            ORDER BY searched_at ASC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(MAX_ROWS_PER_KIND)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn fetch_feedback(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, Feedback>(
            r#"
            SELECT
                video_id::text AS video_id,
                rating::INT4 AS rating,
                review,
                created_at
            FROM video_ratings
            WHERE user_id::text = $1 AND created_at >= $2
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(MAX_ROWS_PER_KIND)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn fetch_hover_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<HoverEvent>> {
        let rows = sqlx::query_as::<_, HoverEvent>(
            r#"
            SELECT
                video_id::text AS video_id,
                hover_ms::INT4 AS hover_ms,
                clicked,
                hovered_at
            FROM hover_interactions
            WHERE user_id::text = $1 AND hovered_at >= $2
            ORDER BY hovered_at ASC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(MAX_ROWS_PER_KIND)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn fetch_navigation_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<NavigationEvent>> {
        let rows = sqlx::query_as::<_, NavigationEvent>(
            r#"
            SELECT
                page_type,
                COALESCE(time_on_page_seconds, 0)::FLOAT8 AS time_on_page_seconds,
                visited_at
            FROM navigation_events
            WHERE user_id::text = $1 AND visited_at >= $2
            ORDER BY visited_at ASC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(MAX_ROWS_PER_KIND)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_active_users(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<String>> {
        let users: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM (
                SELECT user_id::text AS user_id, started_at AS ts FROM video_views WHERE started_at >= $1
                UNION ALL
                SELECT user_id::text, searched_at FROM search_logs WHERE searched_at >= $1
                UNION ALL
                SELECT user_id::text, created_at FROM video_ratings WHERE created_at >= $1
            ) activity
            GROUP BY user_id
            ORDER BY MAX(ts) DESC, user_id ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn fetch_candidate_items(
        &self,
        limit: usize,
        exclude_viewed_by: Option<String>,
    ) -> Result<Vec<CandidateItem>> {
        let items = sqlx::query_as::<_, CandidateItem>(
            r#"
            SELECT
                v.id::text AS item_id,
                v.title,
                v.category,
                COALESCE(v.average_rating, 0)::FLOAT8 AS average_rating,
                COALESCE(v.duration_seconds, 0)::FLOAT8 AS duration_seconds,
                COALESCE(v.view_count, 0)::INT8 AS view_count,
                (v.series_id IS NOT NULL) AS is_series
            FROM videos v
            WHERE v.deleted_at IS NULL
              AND (
                $2::text IS NULL
                OR NOT EXISTS (
                    SELECT 1 FROM video_views vv
                    WHERE vv.user_id::text = $2 AND vv.video_id = v.id
                )
              )
            ORDER BY v.view_count DESC NULLS LAST, v.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .bind(exclude_viewed_by.as_deref())
        .fetch_all(&self.pool)
        .await?;

        debug!(
            count = items.len(),
            exclude_viewed_by = ?exclude_viewed_by,
            "Fetched candidate items"
        );
        Ok(items)
    }
}
