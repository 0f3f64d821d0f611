//! Per-site cron scheduling
//!
//! Owns a set of live triggers, one per active site, parsed from the site's
//! cron schedule (six fields, seconds first). A fired trigger invokes the
//! crawl runner; firing failures are logged, never propagated, and never
//! unschedule the site. The trigger map is guarded so there is at most one
//! live trigger per site id at any time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::crawler::CrawlRunner;
use crate::error::SchedulerError;
use crate::models::CrawlSite;
use crate::storage::SiteRepository;

/// Scheduler mapping site schedules to live crawl triggers
pub struct CrawlScheduler {
    scheduler: JobScheduler,
    runner: Arc<CrawlRunner>,
    sites: Arc<dyn SiteRepository>,
    entries: Mutex<HashMap<String, Uuid>>,
    cancel: CancellationToken,
}

impl CrawlScheduler {
    /// Create a scheduler; no triggers are installed yet
    ///
    /// # Errors
    ///
    /// Fails when the underlying cron runner cannot be created.
    pub async fn new(
        runner: Arc<CrawlRunner>,
        sites: Arc<dyn SiteRepository>,
    ) -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            runner,
            sites,
            entries: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Load all active sites, schedule each, and start the runner
    ///
    /// A site with an invalid schedule is logged and skipped; it does not
    /// prevent the remaining sites from being scheduled.
    ///
    /// # Errors
    ///
    /// Fails when the active-site query or the runner start fails.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let sites = self.sites.find_active().await?;
        for site in &sites {
            if let Err(e) = self.schedule_site(site).await {
                tracing::error!(site = %site.name, error = %e, "failed to schedule site");
            }
        }

        self.scheduler.start().await?;
        tracing::info!(sites = sites.len(), "scheduler started");
        Ok(())
    }

    /// Install (or replace) the live trigger for a site
    ///
    /// Any pre-existing trigger for the same site id is removed first, so
    /// re-scheduling is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidSchedule`] when the cron expression
    /// does not parse.
    pub async fn schedule_site(&self, site: &CrawlSite) -> Result<(), SchedulerError> {
        let mut entries = self.entries.lock().await;

        if let Some(existing) = entries.remove(&site.id) {
            if let Err(e) = self.scheduler.remove(&existing).await {
                tracing::warn!(site = %site.name, error = %e, "failed to remove stale trigger");
            }
        }

        let runner = self.runner.clone();
        let site_id = site.id.clone();
        let site_name = site.name.clone();
        let cancel = self.cancel.clone();

        let job = Job::new_async(site.schedule.as_str(), move |_uuid, _lock| {
            let runner = runner.clone();
            let site_id = site_id.clone();
            let site_name = site_name.clone();
            let cancel = cancel.clone();
            Box::pin(async move {
                tracing::info!(site = %site_name, "scheduled crawl starting");
                match runner.run(&site_id, &cancel).await {
                    Ok(result) => tracing::info!(
                        site = %site_name,
                        found = result.jobs_found,
                        saved = result.jobs_saved,
                        skipped = result.jobs_skipped,
                        "scheduled crawl completed"
                    ),
                    Err(e) => tracing::error!(
                        site = %site_name,
                        error = %e,
                        "scheduled crawl failed"
                    ),
                }
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule {
            site_id: site.id.clone(),
            schedule: site.schedule.clone(),
            reason: e.to_string(),
        })?;

        let trigger_id = self.scheduler.add(job).await?;
        entries.insert(site.id.clone(), trigger_id);

        tracing::info!(site = %site.name, schedule = %site.schedule, "site scheduled");
        Ok(())
    }

    /// Remove the live trigger for a site, if any
    pub async fn unschedule_site(&self, site_id: &str) -> Result<(), SchedulerError> {
        let mut entries = self.entries.lock().await;
        if let Some(trigger_id) = entries.remove(site_id) {
            self.scheduler.remove(&trigger_id).await?;
            tracing::info!(site_id = %site_id, "site unscheduled");
        }
        Ok(())
    }

    /// Re-read a site's configuration and schedule or unschedule it
    /// depending on its active flag
    pub async fn reload_site(&self, site_id: &str) -> Result<(), SchedulerError> {
        let site = self.sites.find_by_id(site_id).await?;
        if site.active {
            self.schedule_site(&site).await
        } else {
            self.unschedule_site(site_id).await
        }
    }

    /// Number of live triggers (diagnostic)
    pub async fn scheduled_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Halt all triggers and cancel in-flight crawl runs
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        self.cancel.cancel();
        self.scheduler.shutdown().await?;
        self.entries.lock().await.clear();
        tracing::info!("scheduler stopped");
        Ok(())
    }
}
