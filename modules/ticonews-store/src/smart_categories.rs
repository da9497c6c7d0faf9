use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::models::SmartCategory;

/// Fallback category recorded when LLM analysis fails. Always present,
/// never deleted, never published (articles carrying it are failed).
pub const UNKNOWN_CATEGORY: &str = "__unknown__";

/// Starter set for an empty catalog. The labeler grows it from here.
const SEED: &[(&str, &str, bool)] = &[
    (
        UNKNOWN_CATEGORY,
        "Fallback for articles whose analysis failed.",
        true,
    ),
    (
        "politics/domestic",
        "Costa Rican government, legislation, elections and public institutions.",
        false,
    ),
    (
        "economy",
        "Prices, employment, taxes, business and the national economy.",
        false,
    ),
    (
        "society",
        "Daily life, education, health, culture and communities.",
        false,
    ),
    (
        "incidents",
        "Crime, accidents and emergencies.",
        false,
    ),
    (
        "weather/nature",
        "Weather, climate, earthquakes, volcanoes and the environment.",
        false,
    ),
];

pub async fn seed_if_empty(pool: &PgPool) -> Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM smart_categories")
        .fetch_one(pool)
        .await?;

    if count == 0 {
        for (name, description, ignore) in SEED {
            sqlx::query(
                "INSERT INTO smart_categories (name, description, ignore)
                 VALUES ($1, $2, $3) ON CONFLICT (name) DO NOTHING",
            )
            .bind(name)
            .bind(description)
            .bind(ignore)
            .execute(pool)
            .await?;
        }
        info!(categories = SEED.len(), "Seeded smart categories");
        return Ok(());
    }

    // The fallback row must exist even in a pre-seeded database.
    sqlx::query(
        "INSERT INTO smart_categories (name, description, ignore)
         VALUES ($1, $2, true) ON CONFLICT (name) DO NOTHING",
    )
    .bind(UNKNOWN_CATEGORY)
    .bind("Fallback for articles whose analysis failed.")
    .execute(pool)
    .await?;

    Ok(())
}

/// All categories, ordered by name. The labeler receives this list verbatim
/// (minus the fallback row).
pub async fn list(pool: &PgPool) -> Result<Vec<SmartCategory>> {
    let rows: Vec<(String, String, bool)> =
        sqlx::query_as("SELECT name, description, ignore FROM smart_categories ORDER BY name")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(name, description, ignore)| SmartCategory {
            name,
            description,
            ignore,
        })
        .collect())
}
