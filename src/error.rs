//! Error types for the jobharvest crawler
//!
//! One error enum per concern, following the taxonomy in the component
//! design: configuration errors are fatal to the operation that raised
//! them, pagination errors abort a crawl run, and per-page / per-record
//! errors are accumulated into result summaries without aborting.

use thiserror::Error;

/// Errors that can occur during HTTP page fetching
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error (transport, timeout, DNS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code from the target site
    #[error("unexpected status code: {0}")]
    Status(u16),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while extracting jobs from a document
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The configured job-list selector does not parse as CSS
    #[error("invalid job list selector: {0}")]
    InvalidListSelector(String),
}

/// Errors raised by the pagination layer
#[derive(Error, Debug)]
pub enum PaginationError {
    /// The site base URL could not be parsed
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Next-page discovery is only meaningful for link-follow pagination
    #[error("next page URL extraction only supported for link_follow pagination")]
    NotLinkFollow,

    /// The configured next-page selector does not parse as CSS
    #[error("invalid next page selector: {0}")]
    InvalidNextPageSelector(String),

    /// Next-page link missing or unusable
    #[error("next page link not found")]
    NextLinkNotFound,
}

/// Errors that abort an entire crawl run
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Page URL generation failed
    #[error("failed to generate page URLs: {0}")]
    Pagination(#[from] PaginationError),

    /// Site lookup or update failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The run was cancelled before it could start
    #[error("crawl cancelled")]
    Cancelled,
}

/// Errors raised by the sync service for a whole sync pass
///
/// Per-record failures are not represented here; they are aggregated
/// into the sync result's error strings.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Could not load the unsynced backlog
    #[error("failed to fetch unsynced jobs: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by the scheduler
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The underlying cron runner rejected the operation
    #[error("scheduler error: {0}")]
    Runner(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// The site's schedule expression is not a valid cron string
    #[error("invalid schedule '{schedule}' for site {site_id}: {reason}")]
    InvalidSchedule {
        site_id: String,
        schedule: String,
        reason: String,
    },

    /// Site lookup failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the repository layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored JSON configuration failed to (de)serialize
    #[error("configuration serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity validation failed before persistence
    #[error("invalid entity: {0}")]
    Validation(#[from] ValidationError),

    /// No row for the requested identity
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl StorageError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Site configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("site name is required")]
    MissingName,

    #[error("base URL is required")]
    MissingBaseUrl,

    #[error("schedule is required")]
    MissingSchedule,
}
