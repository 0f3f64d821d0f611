//! Crawl engine: one full crawl pass for one site
//!
//! The engine executes a strictly sequential page-by-page, job-by-job
//! pipeline. A returned error is reserved for conditions that abort the
//! entire run (pagination URL generation); per-page and per-job failures are
//! recorded in the result's error list and do not abort the run.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scraper::Html;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::crawler::fetcher::PageFetcher;
use crate::error::{CrawlError, StorageError};
use crate::extractor::Extractor;
use crate::models::{CrawlSite, CrawledJob};
use crate::paginator::Paginator;
use crate::storage::JobRepository;

/// Summary of one crawl pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlResult {
    pub jobs_found: u64,
    pub jobs_saved: u64,
    pub jobs_skipped: u64,
    pub pages_crawled: u64,
    pub errors: Vec<String>,
}

/// Crawl orchestrator
pub struct CrawlEngine {
    fetcher: Arc<dyn PageFetcher>,
    jobs: Arc<dyn JobRepository>,
}

impl CrawlEngine {
    pub fn new(fetcher: Arc<dyn PageFetcher>, jobs: Arc<dyn JobRepository>) -> Self {
        Self { fetcher, jobs }
    }

    /// Execute one crawl pass for `site`
    ///
    /// Cancellation stops further page processing promptly; partial results
    /// already accumulated are still returned.
    ///
    /// # Errors
    ///
    /// Only pagination URL generation failure aborts the run.
    pub async fn crawl(
        &self,
        site: &CrawlSite,
        cancel: &CancellationToken,
    ) -> Result<CrawlResult, CrawlError> {
        let paginator = Paginator::new(site.pagination_config.clone());
        let extractor = Extractor::new(site.extraction_rules.clone());

        let mut queue: VecDeque<String> = paginator.page_urls(&site.base_url)?.into();
        // Guards link_follow against next-link cycles
        let mut visited: HashSet<String> = queue.iter().cloned().collect();

        let mut result = CrawlResult::default();

        while let Some(page_url) = queue.pop_front() {
            if cancel.is_cancelled() {
                tracing::info!(site = %site.name, "crawl cancelled, reporting partial results");
                break;
            }

            result.pages_crawled += 1;

            // Politeness delay before each fetch
            if site.request_delay > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(site.request_delay)) => {}
                }
            }

            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                fetched = self.fetcher.fetch(&page_url, site.effective_user_agent()) => fetched,
            };

            let html = match fetched {
                Ok(html) => html,
                Err(e) => {
                    result
                        .errors
                        .push(format!("failed to fetch {page_url}: {e}"));
                    continue;
                }
            };

            // The parsed document is not Send; keep it scoped so no await
            // happens while it is alive.
            let (jobs, next_url) = {
                let document = Html::parse_document(&html);

                let jobs = match extractor.extract_jobs(&document, &page_url) {
                    Ok(jobs) => jobs,
                    Err(e) => {
                        result
                            .errors
                            .push(format!("failed to extract jobs from {page_url}: {e}"));
                        Vec::new()
                    }
                };

                let next_url = if paginator.has_next_page(&document) {
                    paginator.next_page_url(&document, &page_url).ok()
                } else {
                    None
                };

                (jobs, next_url)
            };

            result.jobs_found += jobs.len() as u64;

            for job in jobs {
                match self.dedupe_and_save(job, site).await {
                    Ok(true) => result.jobs_saved += 1,
                    Ok(false) => result.jobs_skipped += 1,
                    Err(e) => {
                        result.jobs_skipped += 1;
                        result.errors.push(format!("failed to save job: {e}"));
                    }
                }
            }

            if let Some(next_url) = next_url {
                if visited.insert(next_url.clone()) {
                    queue.push_back(next_url);
                } else {
                    tracing::debug!(url = %next_url, "next page already visited, stopping link follow");
                }
            }
        }

        tracing::info!(
            site = %site.name,
            pages = result.pages_crawled,
            found = result.jobs_found,
            saved = result.jobs_saved,
            skipped = result.jobs_skipped,
            errors = result.errors.len(),
            "crawl pass finished"
        );

        Ok(result)
    }

    /// Persist a candidate unless an equivalent record already exists
    ///
    /// Returns `Ok(true)` when saved, `Ok(false)` for a duplicate. The
    /// fingerprint is always recomputed here; incoming hashes are never
    /// trusted.
    async fn dedupe_and_save(
        &self,
        mut job: CrawledJob,
        site: &CrawlSite,
    ) -> Result<bool, StorageError> {
        job.site_id = site.id.clone();
        job.deduplication_hash = site.deduplication_key.fingerprint(&job);

        if site
            .deduplication_key
            .is_duplicate(self.jobs.as_ref(), &job)
            .await?
        {
            return Ok(false);
        }

        let now = Utc::now();
        job.id = Uuid::new_v4().to_string();
        job.created_at = now;
        job.updated_at = now;
        job.synced = false;
        job.synced_at = None;

        self.jobs.create(&job).await?;
        Ok(true)
    }
}
