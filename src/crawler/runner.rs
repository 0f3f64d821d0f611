//! Crawl-run recorder
//!
//! Wraps a crawl pass in the [`CrawlLog`] lifecycle: the log is created in
//! the `running` state before any page is fetched, appended to throughout,
//! and finalized exactly once as `completed` or `failed`. A completed run
//! also advances the site's `last_crawled_at`.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::crawler::engine::{CrawlEngine, CrawlResult};
use crate::error::CrawlError;
use crate::models::{CrawlLog, LogLevel};
use crate::storage::{CrawlLogRepository, SiteRepository};

/// Executes crawl runs for sites by id, with persisted crawl logs
pub struct CrawlRunner {
    engine: Arc<CrawlEngine>,
    sites: Arc<dyn SiteRepository>,
    logs: Arc<dyn CrawlLogRepository>,
}

impl CrawlRunner {
    pub fn new(
        engine: Arc<CrawlEngine>,
        sites: Arc<dyn SiteRepository>,
        logs: Arc<dyn CrawlLogRepository>,
    ) -> Self {
        Self {
            engine,
            sites,
            logs,
        }
    }

    /// Run one recorded crawl for the site with the given id
    ///
    /// # Errors
    ///
    /// Returns the underlying [`CrawlError`] when the run aborts; the
    /// persisted log is finalized as `failed` in that case.
    pub async fn run(
        &self,
        site_id: &str,
        cancel: &CancellationToken,
    ) -> Result<CrawlResult, CrawlError> {
        let site = self.sites.find_by_id(site_id).await?;

        let mut log = CrawlLog::start(site_id);
        log.add_entry(LogLevel::Info, format!("starting crawl for site: {}", site.name));
        log.add_entry(LogLevel::Info, format!("base URL: {}", site.base_url));

        if let Err(e) = self.logs.create(&log).await {
            // The run proceeds even when the log cannot be persisted up front
            tracing::warn!(site = %site.name, error = %e, "failed to create crawl log");
            log.add_entry(LogLevel::Warning, format!("failed to create crawl log: {e}"));
        }

        match self.engine.crawl(&site, cancel).await {
            Ok(result) => {
                log.jobs_found = result.jobs_found;
                log.jobs_saved = result.jobs_saved;
                log.jobs_skipped = result.jobs_skipped;
                log.pages_crawled = result.pages_crawled;
                for error in &result.errors {
                    log.add_error(error.clone());
                }
                log.complete();
                log.add_entry(
                    LogLevel::Info,
                    format!(
                        "crawl completed: {} jobs found, {} saved, {} skipped",
                        result.jobs_found, result.jobs_saved, result.jobs_skipped
                    ),
                );
                self.persist_log(&log).await;

                if let Err(e) = self.sites.update_last_crawled(site_id, Utc::now()).await {
                    tracing::warn!(site = %site.name, error = %e, "failed to update last_crawled_at");
                }

                Ok(result)
            }
            Err(e) => {
                log.fail(e.to_string());
                self.persist_log(&log).await;
                Err(e)
            }
        }
    }

    async fn persist_log(&self, log: &CrawlLog) {
        // The log row may not exist if the initial create failed
        if self.logs.update(log).await.is_err() {
            if let Err(e) = self.logs.create(log).await {
                tracing::error!(log_id = %log.id, error = %e, "failed to persist crawl log");
            }
        }
    }
}
