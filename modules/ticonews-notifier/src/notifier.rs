use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};

use telegram_client::TelegramClient;
use ticonews_common::sleep::{sleep_for, sleep_until, DEFAULT_QUANTUM};
use ticonews_common::{windows, Config, FileManager, Shutdown};
use ticonews_store::notifier::{self, Candidate};
use ticonews_store::summaries;

use crate::message;

/// Publishes summaries to the channel at the configured trigger times,
/// selecting unsent articles from the shifted window.
pub struct Notifier {
    pool: PgPool,
    telegram: TelegramClient,
    files: FileManager,
    config: Config,
    shutdown: Shutdown,
}

impl Notifier {
    pub fn new(pool: PgPool, config: Config, shutdown: Shutdown) -> Self {
        let telegram = TelegramClient::new(
            &config.notifier.bot_token,
            &config.notifier.channel_id,
            config.notifier.max_retries,
        );
        let files = FileManager::new(&config.data_dir, config.timezone);
        Self {
            pool,
            telegram,
            files,
            config,
            shutdown,
        }
    }

    pub async fn run(&self, once: bool) -> Result<()> {
        if once {
            // Operator convenience: one cycle with the window ending now.
            self.cycle(Utc::now()).await?;
            return Ok(());
        }

        loop {
            if self.shutdown.is_requested() {
                break;
            }
            let now = Utc::now();
            let Some(trigger) = windows::next_trigger(
                &self.config.notifier.trigger_times,
                self.config.timezone,
                now,
            ) else {
                anyhow::bail!("No trigger times configured");
            };
            info!(trigger = %trigger, "Sleeping until next trigger");

            if !sleep_until(
                trigger,
                self.config.notifier.max_inactivity_interval,
                &self.shutdown,
            )
            .await
            {
                break;
            }

            if let Err(e) = self.cycle(trigger).await {
                error!(error = %e, "Notifier cycle failed");
            }
        }
        info!("Notifier stopped");
        Ok(())
    }

    /// One publication cycle for the trigger at `trigger`.
    async fn cycle(&self, trigger: DateTime<Utc>) -> Result<()> {
        let retention =
            chrono::Duration::days(self.config.notifier.sent_log_retention_days as i64);
        let pruned = notifier::prune_sent_log(&self.pool, trigger - retention).await?;
        if pruned > 0 {
            info!(pruned, "Pruned sent log");
        }

        let Some((window_start, window_end)) = windows::selection_window(
            &self.config.notifier.trigger_times,
            self.config.timezone,
            trigger,
            self.config.notifier.window_shift,
        ) else {
            return Ok(());
        };

        let candidates = notifier::candidates(&self.pool, window_start, window_end).await?;
        if candidates.is_empty() {
            info!(
                window_start = %window_start,
                window_end = %window_end,
                "No articles to publish"
            );
            return Ok(());
        }
        info!(count = candidates.len(), "Publishing articles");

        for candidate in &candidates {
            if self.shutdown.is_requested() {
                break;
            }
            if let Err(e) = self.publish(candidate).await {
                // Left unsent: the next trigger retries it while its
                // timestamp is still in-window.
                warn!(article_id = candidate.article_id, error = %e, "Publish failed");
            }
            if !sleep_for(
                self.config.notifier.message_delay,
                DEFAULT_QUANTUM,
                &self.shutdown,
            )
            .await
            {
                break;
            }
        }
        Ok(())
    }

    /// Send one article and mark it sent in its own transaction right after.
    async fn publish(&self, candidate: &Candidate) -> Result<()> {
        let lang = &self.config.notifier.notification_language;
        let Some(path) = summaries::file_path(&self.pool, candidate.article_id, lang).await?
        else {
            warn!(
                article_id = candidate.article_id,
                lang = %lang,
                "Summary missing, leaving unsent"
            );
            return Ok(());
        };

        let summary = self.files.read(Path::new(&path)).await?;
        let text = message::format_message(
            &summary,
            candidate.published_at,
            self.config.timezone,
            &candidate.url,
            &candidate.smart_category,
        );

        self.telegram.send_message(&text).await?;
        notifier::record_sent(&self.pool, candidate.article_id, candidate.published_at).await?;
        info!(article_id = candidate.article_id, "Article published");
        Ok(())
    }
}
