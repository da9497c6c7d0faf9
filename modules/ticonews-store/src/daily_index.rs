use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;

/// Whether `day`'s index has been ingested.
pub async fn has_day(pool: &PgPool, day: NaiveDate) -> Result<bool> {
    let row: Option<(NaiveDate,)> = sqlx::query_as("SELECT day FROM daily_index WHERE day = $1")
        .bind(day)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Most recent ingested day, if any.
pub async fn last_day(pool: &PgPool) -> Result<Option<NaiveDate>> {
    let (last,): (Option<NaiveDate>,) = sqlx::query_as("SELECT max(day) FROM daily_index")
        .fetch_one(pool)
        .await?;
    Ok(last)
}
