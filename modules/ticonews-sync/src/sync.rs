use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crhoy_client::CrhoyClient;
use ticonews_common::sleep::{sleep_for, DEFAULT_QUANTUM};
use ticonews_common::{Config, FileManager, Shutdown};
use ticonews_store::ingest::{ingest_day, NewArticle};
use ticonews_store::{daily_index, gaps};

/// Keeps the per-day article index complete from the configured first day up
/// to today, recording and backfilling gaps.
pub struct Synchronizer {
    pool: PgPool,
    client: CrhoyClient,
    files: FileManager,
    config: Config,
    shutdown: Shutdown,
}

impl Synchronizer {
    pub fn new(pool: PgPool, config: Config, shutdown: Shutdown) -> Result<Self> {
        let client = CrhoyClient::new(&config.api_base, Duration::from_secs(30), 3)
            .context("Failed to build source API client")?;
        let files = FileManager::new(&config.data_dir, config.timezone);
        Ok(Self {
            pool,
            client,
            files,
            config,
            shutdown,
        })
    }

    pub async fn run(&self, once: bool) -> Result<()> {
        loop {
            if self.shutdown.is_requested() {
                break;
            }
            if let Err(e) = self.cycle().await {
                error!(error = %e, "Synchronizer cycle failed");
            }
            if once {
                break;
            }
            if !sleep_for(
                self.config.sync.check_updates_interval,
                DEFAULT_QUANTUM,
                &self.shutdown,
            )
            .await
            {
                break;
            }
        }
        info!("Synchronizer stopped");
        Ok(())
    }

    /// One cycle: probe, detect a day switch, process today, then backfill
    /// one chunk of the earliest gap.
    async fn cycle(&self) -> Result<()> {
        if !self.client.internet_available().await {
            warn!("Internet unavailable, skipping cycle");
            return Ok(());
        }
        if !self.client.api_available().await {
            warn!("Source API unavailable, skipping cycle");
            return Ok(());
        }

        let today = Utc::now().with_timezone(&self.config.timezone).date_naive();
        let last = daily_index::last_day(&self.pool).await?;
        let today_ingested = daily_index::has_day(&self.pool, today).await?;

        if let Some((from, to)) =
            missing_interval(last, self.config.sync.first_day, today, today_ingested)
        {
            gaps::open(&self.pool, from, to).await?;
        }

        // Today first: the current day's index grows during the day, and
        // fresh articles matter more than backlog.
        if let Err(e) = self.process_day(today).await {
            warn!(day = %today, error = %e, "Failed to process today's index");
        }

        self.process_gap_chunk().await?;
        Ok(())
    }

    /// Fetch one day's index, persist the raw document, and ingest it
    /// transactionally.
    async fn process_day(&self, day: NaiveDate) -> Result<()> {
        let (raw, entries) = self.client.daily_index(day).await?;

        let index_path = self.files.index_path(day);
        self.files.write(&index_path, &raw).await?;

        let articles: Vec<NewArticle> = entries
            .into_iter()
            .map(|e| NewArticle {
                id: e.id,
                url: e.url,
                published_at: e.published_at,
                categories: e.categories,
            })
            .collect();

        ingest_day(
            &self.pool,
            day,
            &index_path.to_string_lossy(),
            &articles,
        )
        .await?;
        Ok(())
    }

    /// Backfill up to `days_chunk_size` days of the earliest gap, oldest
    /// first, shrinking the range as days are covered.
    async fn process_gap_chunk(&self) -> Result<()> {
        let Some(mut gap) = gaps::earliest(&self.pool).await? else {
            return Ok(());
        };

        let chunk: Vec<NaiveDate> = gap
            .days()
            .take(self.config.sync.days_chunk_size as usize)
            .collect();

        for day in chunk {
            if self.shutdown.is_requested() {
                break;
            }

            // A restore can leave covered days inside a recorded gap; they
            // only need the range advanced.
            if !daily_index::has_day(&self.pool, day).await? {
                if let Err(e) = self.process_day(day).await {
                    warn!(day = %day, error = %e, "Failed to backfill day, leaving gap");
                    break;
                }
            }

            let new_from = match day.succ_opt() {
                Some(next) => next,
                None => gap.to,
            };
            gaps::advance(&self.pool, &gap, new_from).await?;
            if new_from >= gap.to {
                break;
            }
            gap.from = new_from;
        }
        Ok(())
    }
}

/// The interval `[last+1, today)` (or `[first_day, today)` on a clean
/// database) that a day switch leaves uncovered. `None` when today is
/// already ingested or nothing is missing.
fn missing_interval(
    last: Option<NaiveDate>,
    first_day: NaiveDate,
    today: NaiveDate,
    today_ingested: bool,
) -> Option<(NaiveDate, NaiveDate)> {
    if today_ingested {
        return None;
    }
    let start = match last {
        Some(last) => last.succ_opt()?,
        None => first_day,
    };
    (start < today).then_some((start, today))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn day_switch_opens_interval_between_last_and_today() {
        // Scenario: last ingested 2024-06-01, clock now at 2024-06-04.
        let interval = missing_interval(
            Some(day("2024-06-01")),
            day("2024-01-01"),
            day("2024-06-04"),
            false,
        );
        assert_eq!(interval, Some((day("2024-06-02"), day("2024-06-04"))));
    }

    #[test]
    fn consecutive_days_leave_no_gap() {
        let interval = missing_interval(
            Some(day("2024-06-03")),
            day("2024-01-01"),
            day("2024-06-04"),
            false,
        );
        assert_eq!(interval, None);
    }

    #[test]
    fn clean_database_is_missing_from_first_day() {
        let interval = missing_interval(None, day("2024-06-01"), day("2024-06-04"), false);
        assert_eq!(interval, Some((day("2024-06-01"), day("2024-06-04"))));
    }

    #[test]
    fn ingested_today_suppresses_gap_opening() {
        let interval = missing_interval(
            Some(day("2024-06-01")),
            day("2024-01-01"),
            day("2024-06-04"),
            true,
        );
        assert_eq!(interval, None);
    }

    #[test]
    fn first_day_today_on_clean_database() {
        let interval = missing_interval(None, day("2024-06-04"), day("2024-06-04"), false);
        assert_eq!(interval, None);
    }
}
