pub mod articles;
pub mod daily_index;
pub mod gaps;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod notifier;
pub mod smart_categories;
pub mod summaries;

pub use migrate::migrate;
pub use models::{ArticleRow, NotifierArticleRow, Relation, SmartCategory};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Open the shared connection pool. Each service owns its own pool; the
/// database is the only coordination point between them.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}
