//! jobharvest - configuration-driven job listing crawler
//!
//! Periodically harvests job listings from configured external websites and
//! forwards newly discovered, deduplicated records to a downstream job board
//! via a batched sync protocol.
//!
//! # Architecture
//!
//! - [`config`] - process configuration from the environment
//! - [`models`] - sites, extraction/pagination configuration, jobs, crawl logs
//! - [`extractor`] - rule-driven HTML extraction engine
//! - [`paginator`] - page enumeration strategies
//! - [`crawler`] - fetch client, crawl orchestrator, and run recorder
//! - [`dedup`] - deduplication strategies
//! - [`scheduler`] - per-site cron triggers
//! - [`sync`] - batched sync to the downstream API
//! - [`storage`] - repository traits and SQLite implementations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jobharvest::crawler::{CrawlEngine, HttpFetcher};
//! use jobharvest::storage::SqliteJobRepository;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(site: jobharvest::models::CrawlSite) -> anyhow::Result<()> {
//! let jobs = Arc::new(SqliteJobRepository::new("data/jobharvest.db")?);
//! let engine = CrawlEngine::new(Arc::new(HttpFetcher::new()?), jobs);
//! let result = engine.crawl(&site, &CancellationToken::new()).await?;
//! println!("saved {} of {} jobs", result.jobs_saved, result.jobs_found);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod error;
pub mod extractor;
pub mod models;
pub mod paginator;
pub mod scheduler;
pub mod storage;
pub mod sync;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{CrawlEngine, CrawlResult, CrawlRunner, HttpFetcher, PageFetcher};
    pub use crate::dedup::DedupStrategy;
    pub use crate::error::{CrawlError, FetchError, SchedulerError, StorageError, SyncError};
    pub use crate::extractor::Extractor;
    pub use crate::models::{
        CrawlLog, CrawlSite, CrawlStatus, CrawledJob, ExtractionRules, PaginationConfig,
    };
    pub use crate::paginator::Paginator;
    pub use crate::scheduler::CrawlScheduler;
    pub use crate::storage::{CrawlLogRepository, JobRepository, SiteRepository};
    pub use crate::sync::{SyncResult, SyncService};
}
