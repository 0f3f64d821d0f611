//! Batched synchronization to the downstream job board
//!
//! Drains the not-yet-synced backlog in fixed-size batches, normalizes
//! vendor vocabulary to the downstream schema, POSTs each record with
//! bearer-token authentication, and marks per-record success. A single
//! record's failure never blocks the rest of the batch.
//!
//! Marking synced is the only side effect gating re-submission, so a crash
//! between a successful POST and the local mark can resubmit a record on the
//! next pass; the downstream API is expected to ingest idempotently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, StorageError, SyncError};
use crate::models::CrawledJob;
use crate::storage::{JobRepository, SiteRepository};

/// Default number of records submitted per batch
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default interval between periodic sync passes
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Summary of one sync pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub success_count: u64,
    pub failure_count: u64,
    pub errors: Vec<String>,
}

/// Failure of a single record within a pass; isolated, never fatal
#[derive(Error, Debug)]
enum RecordError {
    #[error("failed to get site: {0}")]
    ResolveSite(StorageError),

    #[error("failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend API error: {status} - {body}")]
    Backend { status: u16, body: String },

    #[error("failed to mark job as synced: {0}")]
    MarkSynced(StorageError),
}

/// Normalized payload shape expected by the downstream job board
#[derive(Debug, Serialize)]
struct BackendJob<'a> {
    startup_id: &'a str,
    title: &'a str,
    description: &'a str,
    requirements: &'a str,
    job_type: &'a str,
    location_type: &'a str,
    city: &'a str,
    country: &'a str,
    currency: String,
    application_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    salary_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    salary_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

/// Sync service against the downstream REST API
pub struct SyncService {
    backend_url: String,
    api_token: String,
    client: Client,
    jobs: Arc<dyn JobRepository>,
    sites: Arc<dyn SiteRepository>,
    batch_size: usize,
}

impl SyncService {
    /// Create a sync service with a 30 second client timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(
        backend_url: impl Into<String>,
        api_token: impl Into<String>,
        jobs: Arc<dyn JobRepository>,
        sites: Arc<dyn SiteRepository>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            client,
            jobs,
            sites,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Override the batch size (mainly for tests)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sync all unsynced jobs to the downstream API
    ///
    /// # Errors
    ///
    /// Only failure to load the backlog is fatal; everything per-record is
    /// aggregated into the returned [`SyncResult`].
    pub async fn sync_jobs(&self) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::default();

        let jobs = self.jobs.find_unsynced(None).await?;
        if jobs.is_empty() {
            return Ok(result);
        }

        tracing::info!(backlog = jobs.len(), batch_size = self.batch_size, "starting sync pass");

        for batch in jobs.chunks(self.batch_size) {
            for job in batch {
                match self.sync_job(job).await {
                    Ok(()) => result.success_count += 1,
                    Err(e) => {
                        result.failure_count += 1;
                        result.errors.push(format!("job {}: {e}", job.id));
                    }
                }
            }
        }

        tracing::info!(
            success = result.success_count,
            failures = result.failure_count,
            "sync pass finished"
        );
        Ok(result)
    }

    /// Submit one record and mark it synced on a 2xx response
    async fn sync_job(&self, job: &CrawledJob) -> Result<(), RecordError> {
        let site = self
            .sites
            .find_by_id(&job.site_id)
            .await
            .map_err(RecordError::ResolveSite)?;

        let payload = build_payload(job, &site.backend_startup_id);

        let response = self
            .client
            .post(format!("{}/api/v1/token/jobs", self.backend_url))
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecordError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        self.jobs
            .mark_synced(&job.id, Utc::now())
            .await
            .map_err(RecordError::MarkSynced)
    }

    /// Run sync passes on a fixed cadence until cancelled
    pub async fn run_periodic(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would sync at startup; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("sync service stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.sync_jobs().await {
                        Ok(result) if result.failure_count > 0 => {
                            tracing::warn!(
                                success = result.success_count,
                                failures = result.failure_count,
                                "sync pass had failures"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "sync pass failed"),
                    }
                }
            }
        }
    }
}

fn build_payload<'a>(job: &'a CrawledJob, startup_id: &'a str) -> BackendJob<'a> {
    BackendJob {
        startup_id,
        title: &job.title,
        description: &job.description,
        requirements: &job.requirements,
        job_type: normalize_job_type(&job.job_type),
        location_type: normalize_location_type(&job.location_type),
        city: &job.city,
        country: &job.country,
        currency: normalize_currency(&job.currency),
        application_url: job.application_url.as_deref(),
        salary_min: job.salary_min,
        salary_max: job.salary_max,
        application_email: job.application_email.as_deref(),
        expires_at: job.expires_at.map(|t| t.to_rfc3339()),
    }
}

/// Map vendor job-type vocabulary to the downstream schema
fn normalize_job_type(job_type: &str) -> &'static str {
    match job_type {
        "full-time" | "fulltime" | "full_time" => "full_time",
        "part-time" | "parttime" | "part_time" => "part_time",
        "contract" | "freelance" => "contract",
        "internship" => "internship",
        _ => "full_time",
    }
}

/// Map vendor location-type vocabulary to the downstream schema
fn normalize_location_type(location_type: &str) -> &'static str {
    match location_type {
        "remote" => "remote",
        "hybrid" => "hybrid",
        "onsite" | "on-site" | "office" => "onsite",
        _ => "remote",
    }
}

/// Currency codes must be exactly three characters; anything else falls back
/// to USD
fn normalize_currency(currency: &str) -> String {
    let trimmed = currency.trim();
    if trimmed.len() == 3 {
        trimmed.to_uppercase()
    } else {
        "USD".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_normalization_table() {
        assert_eq!(normalize_job_type("fulltime"), "full_time");
        assert_eq!(normalize_job_type("full-time"), "full_time");
        assert_eq!(normalize_job_type("parttime"), "part_time");
        assert_eq!(normalize_job_type("freelance"), "contract");
        assert_eq!(normalize_job_type("internship"), "internship");
        // Unrecognized values take the documented default
        assert_eq!(normalize_job_type("gig"), "full_time");
        assert_eq!(normalize_job_type(""), "full_time");
    }

    #[test]
    fn location_type_normalization_table() {
        assert_eq!(normalize_location_type("on-site"), "onsite");
        assert_eq!(normalize_location_type("office"), "onsite");
        assert_eq!(normalize_location_type("hybrid"), "hybrid");
        assert_eq!(normalize_location_type("somewhere"), "remote");
    }

    #[test]
    fn currency_normalization() {
        assert_eq!(normalize_currency("EUR"), "EUR");
        assert_eq!(normalize_currency("usd"), "USD");
        assert_eq!(normalize_currency(" gbp "), "GBP");
        assert_eq!(normalize_currency("$"), "USD");
        assert_eq!(normalize_currency("dollars"), "USD");
        assert_eq!(normalize_currency(""), "USD");
    }

    #[test]
    fn payload_omits_absent_optionals() {
        let job = CrawledJob {
            title: "Engineer".to_string(),
            job_type: "fulltime".to_string(),
            currency: "eur".to_string(),
            ..Default::default()
        };
        let payload = build_payload(&job, "startup-1");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["startup_id"], "startup-1");
        assert_eq!(json["job_type"], "full_time");
        assert_eq!(json["currency"], "EUR");
        // application_url is always present, even when null
        assert!(json.as_object().unwrap().contains_key("application_url"));
        assert!(json["application_url"].is_null());
        assert!(!json.as_object().unwrap().contains_key("salary_min"));
        assert!(!json.as_object().unwrap().contains_key("expires_at"));
    }

    #[test]
    fn payload_formats_expiry_as_rfc3339() {
        let job = CrawledJob {
            expires_at: Some(Utc::now()),
            salary_min: Some(50000),
            ..Default::default()
        };
        let payload = build_payload(&job, "s");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["salary_min"], 50000);
        assert!(json["expires_at"].as_str().unwrap().contains('T'));
    }
}
