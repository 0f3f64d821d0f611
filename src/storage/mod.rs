//! Persistence layer: repository traits and SQLite implementations
//!
//! The crawler core only talks to the three repository traits defined in
//! [`repository`]; SQLite is the bundled default backend.

pub mod repository;

pub use repository::{
    CrawlLogRepository, JobRepository, SiteRepository, SqliteCrawlLogRepository,
    SqliteJobRepository, SqliteSiteRepository,
};
