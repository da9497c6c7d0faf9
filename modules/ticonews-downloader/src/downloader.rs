use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crhoy_client::CrhoyClient;
use ticonews_common::sleep::{sleep_for, DEFAULT_QUANTUM};
use ticonews_common::{windows, Config, FileManager, Shutdown};
use ticonews_store::smart_categories::UNKNOWN_CATEGORY;
use ticonews_store::{
    articles, notifier, smart_categories, summaries, ArticleRow, NotifierArticleRow, Relation,
    SmartCategory,
};

use crate::analysis::{self, CategoryChoice, SessionFactory};
use crate::parser;

/// Fetches article bodies, analyzes them with the LLM pipeline, and stores
/// summaries. Generic over the session factory so the pipeline is testable
/// without an engine.
pub struct Downloader<F: SessionFactory> {
    pool: PgPool,
    client: CrhoyClient,
    files: FileManager,
    config: Config,
    shutdown: Shutdown,
    sessions: F,
}

impl<F: SessionFactory> Downloader<F> {
    pub fn new(pool: PgPool, config: Config, shutdown: Shutdown, sessions: F) -> Result<Self> {
        let client = CrhoyClient::new(
            &config.api_base,
            config.downloader.request_timeout,
            config.downloader.max_retries,
        )
        .context("Failed to build source API client")?;
        let files = FileManager::new(&config.data_dir, config.timezone);
        Ok(Self {
            pool,
            client,
            files,
            config,
            shutdown,
            sessions,
        })
    }

    pub async fn run(&self, once: bool) -> Result<()> {
        loop {
            if self.shutdown.is_requested() {
                break;
            }
            if let Err(e) = self.cycle().await {
                error!(error = %e, "Downloader cycle failed");
            }
            if once {
                break;
            }
            if !sleep_for(
                self.config.downloader.download_interval,
                DEFAULT_QUANTUM,
                &self.shutdown,
            )
            .await
            {
                break;
            }
        }
        info!("Downloader stopped");
        Ok(())
    }

    async fn cycle(&self) -> Result<()> {
        if !self.client.internet_available().await {
            warn!("Internet unavailable, skipping cycle");
            return Ok(());
        }

        let (window_start, window_end) = self.current_window();
        let pending = articles::select_pending(
            &self.pool,
            window_start,
            window_end,
            self.config.downloader.downloads_chunk_size,
        )
        .await?;

        if pending.is_empty() {
            return Ok(());
        }
        info!(count = pending.len(), "Processing article batch");

        for article in &pending {
            if self.shutdown.is_requested() {
                break;
            }
            if let Err(e) = self.process_article(article).await {
                // Storage-level failure: state unchanged, retried next cycle.
                error!(article_id = article.id, error = %e, "Article processing failed");
            }
        }
        Ok(())
    }

    /// The window the notifier will publish from at its next trigger.
    /// Articles inside it are downloaded first so they make that trigger.
    fn current_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        let times = &self.config.notifier.trigger_times;
        windows::next_trigger(times, self.config.timezone, now)
            .and_then(|trigger| {
                windows::selection_window(
                    times,
                    self.config.timezone,
                    trigger,
                    self.config.notifier.window_shift,
                )
            })
            .unwrap_or((now, now))
    }

    async fn process_article(&self, article: &ArticleRow) -> Result<()> {
        let categories = articles::categories(&self.pool, article.id).await?;
        if let Some(category) = categories
            .iter()
            .find(|c| is_ignored(c, &self.config.downloader.ignore_categories))
        {
            articles::mark_skipped(&self.pool, article.id).await?;
            info!(article_id = article.id, category = %category, "Article skipped");
            return Ok(());
        }

        let html = match self.client.article_html(&article.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(article_id = article.id, error = %e, "Article download failed");
                articles::mark_failed(&self.pool, article.id).await?;
                return Ok(());
            }
        };

        let parsed = match parser::parse_article(&html, &article.url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(article_id = article.id, error = %e, "Article parse failed");
                articles::mark_failed(&self.pool, article.id).await?;
                return Ok(());
            }
        };

        let content_path = self.files.article_path(article.id, article.published_at);
        self.files.write(&content_path, &parsed.markdown).await?;
        articles::set_content_path(&self.pool, article.id, &content_path.to_string_lossy())
            .await?;
        info!(article_id = article.id, title = %parsed.title, "Article downloaded");

        if self.too_old_for_analysis(article) {
            info!(article_id = article.id, "Analysis skipped, article beyond age horizon");
            return Ok(());
        }

        if notifier::is_analyzed(&self.pool, article.id).await? {
            return Ok(());
        }

        self.analyze_article(article, &parsed.markdown).await
    }

    fn too_old_for_analysis(&self, article: &ArticleRow) -> bool {
        if self.config.downloader.force_analysis {
            return false;
        }
        let horizon = chrono::Duration::from_std(self.config.downloader.analysis_age_horizon)
            .unwrap_or_else(|_| chrono::Duration::hours(48));
        Utc::now().signed_duration_since(article.published_at) > horizon
    }

    /// Run the LLM pipeline in its own transactions. A failed pipeline still
    /// records a fallback projection; the download itself is never lost.
    async fn analyze_article(&self, article: &ArticleRow, markdown: &str) -> Result<()> {
        let catalog = smart_categories::list(&self.pool).await?;

        match analysis::analyze(
            &self.sessions,
            markdown,
            &catalog,
            &self.config.downloader.summary_languages,
        )
        .await
        {
            Ok(outcome) => {
                for summary in &outcome.summaries {
                    let path =
                        self.files
                            .summary_path(article.id, article.published_at, &summary.lang);
                    self.files.write(&path, &summary.text).await?;
                    summaries::record(
                        &self.pool,
                        article.id,
                        &summary.lang,
                        &path.to_string_lossy(),
                    )
                    .await?;
                }

                let new_category = match &outcome.category {
                    CategoryChoice::New { name, description } => Some(SmartCategory {
                        name: name.clone(),
                        description: description.clone(),
                        ignore: false,
                    }),
                    CategoryChoice::Existing(_) => None,
                };

                notifier::record_analysis(
                    &self.pool,
                    new_category.as_ref(),
                    &NotifierArticleRow {
                        article_id: article.id,
                        published_at: article.published_at,
                        relation: outcome.relation,
                        smart_category: outcome.category.name().to_string(),
                        skip: !outcome.relation.is_relevant(),
                        failed: false,
                    },
                )
                .await?;
                info!(
                    article_id = article.id,
                    relation = outcome.relation.as_str(),
                    category = outcome.category.name(),
                    "Article analyzed"
                );
            }
            Err(e) => {
                warn!(article_id = article.id, error = %e, "Analysis failed, recording fallback");
                notifier::record_analysis(
                    &self.pool,
                    None,
                    &NotifierArticleRow {
                        article_id: article.id,
                        published_at: article.published_at,
                        relation: e.relation.unwrap_or(Relation::NotApplicable),
                        smart_category: UNKNOWN_CATEGORY.to_string(),
                        skip: false,
                        failed: true,
                    },
                )
                .await?;
            }
        }
        Ok(())
    }
}

/// A category is ignored when it matches an entry exactly or sits below it
/// in the source's `parent/child` hierarchy.
fn is_ignored(category: &str, ignore_list: &[String]) -> bool {
    ignore_list
        .iter()
        .any(|entry| category == entry || category.starts_with(&format!("{entry}/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_matches_exact_and_children() {
        let ignore = vec!["deportes".to_string()];
        assert!(is_ignored("deportes", &ignore));
        assert!(is_ignored("deportes/futbol", &ignore));
        assert!(!is_ignored("deportivo", &ignore));
        assert!(!is_ignored("nacionales", &ignore));
    }

    #[test]
    fn empty_ignore_list_matches_nothing() {
        assert!(!is_ignored("deportes", &[]));
    }
}
