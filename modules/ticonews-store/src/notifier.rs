use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{NotifierArticleRow, SmartCategory};

/// Record the outcome of one article's analysis: the chosen smart category
/// (upserted first when freshly minted by the finalizer) and the notifier
/// projection, in one transaction. The projection is written at most once
/// per article.
pub async fn record_analysis(
    pool: &PgPool,
    new_category: Option<&SmartCategory>,
    row: &NotifierArticleRow,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    if let Some(category) = new_category {
        // Concurrent minting of the same name by another article loses
        // quietly; readers tolerate either description.
        sqlx::query(
            "INSERT INTO smart_categories (name, description, ignore)
             VALUES ($1, $2, $3) ON CONFLICT (name) DO NOTHING",
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.ignore)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "INSERT INTO notifier_articles
             (article_id, published_at, relation, smart_category, skip, failed)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (article_id) DO NOTHING",
    )
    .bind(row.article_id)
    .bind(row.published_at)
    .bind(row.relation.as_str())
    .bind(&row.smart_category)
    .bind(row.skip)
    .bind(row.failed)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Whether an article already has a notifier projection (analysis ran).
pub async fn is_analyzed(pool: &PgPool, article_id: i64) -> Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT article_id FROM notifier_articles WHERE article_id = $1")
            .bind(article_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

/// One publishable article as selected for a trigger.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub article_id: i64,
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub smart_category: String,
}

/// Publishable candidates inside the half-open window, oldest first:
/// relevant relation, not skipped, not failed, category not ignored, and
/// never sent before.
pub async fn candidates(
    pool: &PgPool,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<Candidate>> {
    let rows: Vec<(i64, DateTime<Utc>, String, String)> = sqlx::query_as(
        "SELECT n.article_id, n.published_at, a.url, n.smart_category
         FROM notifier_articles n
         JOIN articles a ON a.id = n.article_id
         JOIN smart_categories c ON c.name = n.smart_category
         WHERE n.published_at >= $1 AND n.published_at < $2
           AND NOT n.skip AND NOT n.failed
           AND n.relation IN ('direct', 'indirect')
           AND NOT c.ignore
           AND NOT EXISTS (SELECT 1 FROM sent_log s WHERE s.article_id = n.article_id)
         ORDER BY n.published_at ASC",
    )
    .bind(window_start)
    .bind(window_end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(article_id, published_at, url, smart_category)| Candidate {
            article_id,
            published_at,
            url,
            smart_category,
        })
        .collect())
}

/// Mark one article sent. Separate transaction per article, immediately
/// after the send, so a crash between send and commit can duplicate at most
/// one message.
pub async fn record_sent(pool: &PgPool, article_id: i64, published_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "INSERT INTO sent_log (article_id, published_at)
         VALUES ($1, $2) ON CONFLICT (article_id) DO NOTHING",
    )
    .bind(article_id)
    .bind(published_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop sent-log rows older than the retention horizon. Retention is longer
/// than the trigger spacing, so in-window duplicates stay prevented.
pub async fn prune_sent_log(pool: &PgPool, horizon: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sent_log WHERE published_at < $1")
        .bind(horizon)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
