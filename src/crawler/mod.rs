//! Crawl orchestration
//!
//! Composes the paginator, extraction engine, and deduplication resolver
//! with an HTTP fetch client to execute one full crawl pass for one site.
//! The orchestrator never schedules or syncs; the [`runner`] wraps a pass
//! in the crawl-log lifecycle for callers that want a persisted record.

pub mod engine;
pub mod fetcher;
pub mod runner;

pub use engine::{CrawlEngine, CrawlResult};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use runner::CrawlRunner;
