use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::smart_categories;

/// Run idempotent schema migrations. Every service calls this at startup;
/// the statements are safe to repeat.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running schema migrations...");

    let statements = [
        "CREATE TABLE IF NOT EXISTS categories_catalog (
            path text PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS daily_index (
            day date PRIMARY KEY,
            file_path text NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS gap_ranges (
            from_day date PRIMARY KEY,
            to_day date NOT NULL,
            CHECK (from_day < to_day)
        )",
        "CREATE TABLE IF NOT EXISTS articles (
            id bigint PRIMARY KEY,
            url text NOT NULL,
            published_at timestamptz NOT NULL,
            content_path text,
            skipped boolean NOT NULL DEFAULT false,
            failed boolean NOT NULL DEFAULT false
        )",
        "CREATE INDEX IF NOT EXISTS articles_pending_idx
            ON articles (published_at)
            WHERE content_path IS NULL AND NOT skipped AND NOT failed",
        "CREATE TABLE IF NOT EXISTS article_categories (
            article_id bigint NOT NULL REFERENCES articles(id),
            category_path text NOT NULL REFERENCES categories_catalog(path),
            PRIMARY KEY (article_id, category_path)
        )",
        "CREATE TABLE IF NOT EXISTS smart_categories (
            name text PRIMARY KEY,
            description text NOT NULL,
            ignore boolean NOT NULL DEFAULT false
        )",
        "CREATE TABLE IF NOT EXISTS summaries (
            article_id bigint NOT NULL REFERENCES articles(id),
            lang text NOT NULL,
            file_path text NOT NULL,
            PRIMARY KEY (article_id, lang)
        )",
        "CREATE TABLE IF NOT EXISTS notifier_articles (
            article_id bigint PRIMARY KEY REFERENCES articles(id),
            published_at timestamptz NOT NULL,
            relation text NOT NULL
                CHECK (relation IN ('direct', 'indirect', 'not_applicable')),
            smart_category text NOT NULL REFERENCES smart_categories(name),
            skip boolean NOT NULL,
            failed boolean NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS notifier_articles_window_idx
            ON notifier_articles (published_at)",
        "CREATE TABLE IF NOT EXISTS sent_log (
            article_id bigint PRIMARY KEY,
            published_at timestamptz NOT NULL
        )",
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    smart_categories::seed_if_empty(pool).await?;

    info!("Schema migrations complete");
    Ok(())
}
