use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;

/// One article as extracted from a day's index document.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub id: i64,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub categories: Vec<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DayIngestOutcome {
    pub new_articles: usize,
    pub new_categories: usize,
}

/// Ingest one day's index in a single transaction: new catalog entries, new
/// article rows (content null, flags false), category links, and the
/// `daily_index` marker. All-or-nothing; re-running over an already covered
/// day inserts nothing and is therefore idempotent.
pub async fn ingest_day(
    pool: &PgPool,
    day: NaiveDate,
    index_file_path: &str,
    entries: &[NewArticle],
) -> Result<DayIngestOutcome> {
    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    let mut paths: Vec<String> = entries
        .iter()
        .flat_map(|e| e.categories.iter().cloned())
        .collect();
    paths.sort();
    paths.dedup();

    let mut tx = pool.begin().await?;

    let existing_ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
    let existing_ids: std::collections::HashSet<i64> =
        existing_ids.into_iter().map(|(id,)| id).collect();

    let existing_paths: Vec<(String,)> =
        sqlx::query_as("SELECT path FROM categories_catalog WHERE path = ANY($1)")
            .bind(&paths)
            .fetch_all(&mut *tx)
            .await?;
    let existing_paths: std::collections::HashSet<String> =
        existing_paths.into_iter().map(|(path,)| path).collect();

    let mut outcome = DayIngestOutcome::default();

    for path in paths.iter().filter(|p| !existing_paths.contains(*p)) {
        sqlx::query("INSERT INTO categories_catalog (path) VALUES ($1)")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        outcome.new_categories += 1;
    }

    for entry in entries.iter().filter(|e| !existing_ids.contains(&e.id)) {
        sqlx::query(
            "INSERT INTO articles (id, url, published_at, content_path, skipped, failed)
             VALUES ($1, $2, $3, NULL, false, false)",
        )
        .bind(entry.id)
        .bind(&entry.url)
        .bind(entry.published_at)
        .execute(&mut *tx)
        .await?;

        for path in &entry.categories {
            sqlx::query(
                "INSERT INTO article_categories (article_id, category_path)
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(entry.id)
            .bind(path)
            .execute(&mut *tx)
            .await?;
        }
        outcome.new_articles += 1;
    }

    sqlx::query(
        "INSERT INTO daily_index (day, file_path)
         VALUES ($1, $2) ON CONFLICT (day) DO NOTHING",
    )
    .bind(day)
    .bind(index_file_path)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        day = %day,
        new_articles = outcome.new_articles,
        new_categories = outcome.new_categories,
        "Day ingested"
    );
    Ok(outcome)
}
