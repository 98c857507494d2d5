//! Site comments, mirrored from the relational store.
//!
//! The only database access in the service.  One bounded query per refresh,
//! so the cache size is fixed no matter how large the table grows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{DataSource, FeedItem, Platform};
use crate::error::FetchError;

const ANONYMOUS: &str = "anonymous";

/// One row of the most-recent-comments query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub target_id: Option<String>,
}

impl CommentRow {
    /// `None` for comments with no visible text.
    pub fn into_feed_item(self) -> Option<FeedItem> {
        if self.content.trim().is_empty() {
            return None;
        }

        let author = self
            .author_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let mut item = FeedItem::new(Platform::Comment, author.as_str(), self.content);
        item.id = Some(self.id.to_string());
        item.author_display_name = Some(author);
        item.author_avatar_url = self.author_avatar;
        item.timestamp = self.created_at.to_rfc3339();
        item.user_id = Some(self.user_id.to_string());
        item.target_id = self.target_id;
        Some(item)
    }
}

pub struct CommentsSource {
    pool: PgPool,
    limit: i64,
}

impl CommentsSource {
    /// `limit` is the fixed ceiling on mirrored comments, normally
    /// `per_source * max_pages`.
    pub fn new(pool: PgPool, limit: usize) -> Self {
        Self {
            pool,
            limit: i64::try_from(limit).unwrap_or(i64::MAX),
        }
    }

    async fn recent_comments(&self) -> Result<Vec<CommentRow>, sqlx::Error> {
        // Casts keep decoding independent of the exact integer / timestamp
        // column types.
        sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id::BIGINT AS id,
                   user_id::BIGINT AS user_id,
                   content,
                   created_at::TIMESTAMPTZ AS created_at,
                   author_name,
                   author_avatar,
                   target_id::TEXT AS target_id
            FROM comments
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(self.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl DataSource for CommentsSource {
    fn name(&self) -> &str {
        "comments"
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, FetchError> {
        let rows = self.recent_comments().await?;
        Ok(rows
            .into_iter()
            .filter_map(CommentRow::into_feed_item)
            .collect())
    }
}
