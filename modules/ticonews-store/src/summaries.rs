use anyhow::Result;
use sqlx::PgPool;

/// Record a persisted summary file. `(article, lang)` is unique; a re-run
/// after a crash overwrites the path it already wrote.
pub async fn record(pool: &PgPool, article_id: i64, lang: &str, file_path: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO summaries (article_id, lang, file_path)
         VALUES ($1, $2, $3)
         ON CONFLICT (article_id, lang) DO UPDATE SET file_path = excluded.file_path",
    )
    .bind(article_id)
    .bind(lang)
    .bind(file_path)
    .execute(pool)
    .await?;
    Ok(())
}

/// Path of one article's summary in `lang`, if recorded.
pub async fn file_path(pool: &PgPool, article_id: i64, lang: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT file_path FROM summaries WHERE article_id = $1 AND lang = $2",
    )
    .bind(article_id)
    .bind(lang)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(path,)| path))
}
