use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::ArticleRow;

/// Articles not yet downloaded, skipped, or failed, in two priority tiers:
/// first those published inside the current notification window (oldest
/// first, so fresh news ships in order), then the backlog (newest first, so
/// it catches up toward the present).
pub async fn select_pending(
    pool: &PgPool,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<ArticleRow>> {
    let limit = limit as i64;

    let mut rows: Vec<(i64, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, url, published_at FROM articles
         WHERE content_path IS NULL AND NOT skipped AND NOT failed
           AND published_at >= $1 AND published_at < $2
         ORDER BY published_at ASC
         LIMIT $3",
    )
    .bind(window_start)
    .bind(window_end)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let remaining = limit - rows.len() as i64;
    if remaining > 0 {
        let backlog: Vec<(i64, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, url, published_at FROM articles
             WHERE content_path IS NULL AND NOT skipped AND NOT failed
               AND (published_at < $1 OR published_at >= $2)
             ORDER BY published_at DESC
             LIMIT $3",
        )
        .bind(window_start)
        .bind(window_end)
        .bind(remaining)
        .fetch_all(pool)
        .await?;
        rows.extend(backlog);
    }

    Ok(rows
        .into_iter()
        .map(|(id, url, published_at)| ArticleRow {
            id,
            url,
            published_at,
        })
        .collect())
}

/// Source-declared category paths of one article.
pub async fn categories(pool: &PgPool, article_id: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT category_path FROM article_categories WHERE article_id = $1 ORDER BY category_path",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(path,)| path).collect())
}

pub async fn mark_skipped(pool: &PgPool, article_id: i64) -> Result<()> {
    sqlx::query("UPDATE articles SET skipped = true WHERE id = $1")
        .bind(article_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, article_id: i64) -> Result<()> {
    sqlx::query("UPDATE articles SET failed = true WHERE id = $1")
        .bind(article_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a completed download. Kept separate from analysis so a transient
/// LLM failure never loses the downloaded content.
pub async fn set_content_path(pool: &PgPool, article_id: i64, content_path: &str) -> Result<()> {
    sqlx::query("UPDATE articles SET content_path = $1 WHERE id = $2")
        .bind(content_path)
        .bind(article_id)
        .execute(pool)
        .await?;
    Ok(())
}
