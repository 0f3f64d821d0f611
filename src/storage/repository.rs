//! Repository traits and SQLite implementations
//!
//! Trait-based repository abstractions decouple the crawl/sync core from the
//! storage backend and make tests cheap: every implementation also offers an
//! `in_memory()` constructor.
//!
//! `PaginationConfig` and `ExtractionRules` are persisted as JSON documents
//! and round-trip losslessly through the models' serde path. Timestamps are
//! stored as RFC3339 text.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StorageError;
use crate::models::{CrawlLog, CrawlSite, CrawlStatus, CrawledJob};

// ============================================================================
// Traits
// ============================================================================

/// Repository for configured crawl sites
#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn create(&self, site: &CrawlSite) -> Result<(), StorageError>;
    async fn update(&self, site: &CrawlSite) -> Result<(), StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
    async fn find_by_id(&self, id: &str) -> Result<CrawlSite, StorageError>;
    async fn find_all(&self) -> Result<Vec<CrawlSite>, StorageError>;
    async fn find_active(&self) -> Result<Vec<CrawlSite>, StorageError>;

    /// Record the completion time of a crawl run
    async fn update_last_crawled(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Repository for harvested job records
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &CrawledJob) -> Result<(), StorageError>;
    async fn update(&self, job: &CrawledJob) -> Result<(), StorageError>;
    async fn find_by_id(&self, id: &str) -> Result<CrawledJob, StorageError>;
    async fn find_by_site(&self, site_id: &str) -> Result<Vec<CrawledJob>, StorageError>;

    /// Not-yet-synced records, oldest first; `None` means no limit
    async fn find_unsynced(&self, limit: Option<usize>) -> Result<Vec<CrawledJob>, StorageError>;

    async fn exists_by_url(&self, url: &str) -> Result<bool, StorageError>;
    async fn exists_by_hash(&self, hash: &str) -> Result<bool, StorageError>;
    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool, StorageError>;

    async fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> Result<(), StorageError>;
    async fn count_unsynced(&self) -> Result<u64, StorageError>;
}

/// Repository for crawl-run logs
#[async_trait]
pub trait CrawlLogRepository: Send + Sync {
    async fn create(&self, log: &CrawlLog) -> Result<(), StorageError>;
    async fn update(&self, log: &CrawlLog) -> Result<(), StorageError>;
    async fn find_by_id(&self, id: &str) -> Result<CrawlLog, StorageError>;

    /// All runs for a site, newest first
    async fn find_by_site(&self, site_id: &str) -> Result<Vec<CrawlLog>, StorageError>;

    async fn find_latest_by_site(&self, site_id: &str) -> Result<Option<CrawlLog>, StorageError>;
}

// ============================================================================
// SQLite helpers
// ============================================================================

fn open_connection(path: &Path) -> Result<Connection, StorageError> {
    if let Some(parent) = path.parent() {
        // Ignore create_dir_all errors here; Connection::open reports them
        let _ = std::fs::create_dir_all(parent);
    }
    let conn = Connection::open(path)?;
    // WAL mode for concurrent scheduler/sync access
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

fn parse_ts(column: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_opt_ts(column: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(column, v)).transpose()
}

fn json_column<T: serde::de::DeserializeOwned>(column: usize, value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ============================================================================
// SQLite site repository
// ============================================================================

/// SQLite implementation of [`SiteRepository`]
pub struct SqliteSiteRepository {
    conn: Mutex<Connection>,
}

impl SqliteSiteRepository {
    /// Open (and create if necessary) a site repository at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = open_connection(path.as_ref())?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        tracing::debug!(path = %path.as_ref().display(), "site repository initialized");
        Ok(repo)
    }

    /// In-memory repository for tests
    pub fn in_memory() -> Result<Self, StorageError> {
        let repo = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("site repository lock poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_sites (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                backend_startup_id TEXT NOT NULL DEFAULT '',
                active INTEGER NOT NULL DEFAULT 1,
                schedule TEXT NOT NULL,
                crawl_interval TEXT NOT NULL DEFAULT '',
                last_crawled_at TEXT,
                next_crawl_at TEXT,
                pagination_config TEXT NOT NULL,
                extraction_rules TEXT NOT NULL,
                deduplication_key TEXT NOT NULL DEFAULT 'url',
                request_delay INTEGER NOT NULL DEFAULT 0,
                user_agent TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_crawl_sites_active
                ON crawl_sites(active);
            "#,
        )?;
        Ok(())
    }

    fn row_to_site(row: &Row<'_>) -> rusqlite::Result<CrawlSite> {
        Ok(CrawlSite {
            id: row.get(0)?,
            name: row.get(1)?,
            base_url: row.get(2)?,
            backend_startup_id: row.get(3)?,
            active: row.get::<_, i64>(4)? != 0,
            schedule: row.get(5)?,
            crawl_interval: row.get(6)?,
            last_crawled_at: parse_opt_ts(7, row.get(7)?)?,
            next_crawl_at: parse_opt_ts(8, row.get(8)?)?,
            pagination_config: json_column(9, row.get(9)?)?,
            extraction_rules: json_column(10, row.get(10)?)?,
            deduplication_key: crate::dedup::DedupStrategy::from(row.get::<_, String>(11)?),
            request_delay: row.get::<_, i64>(12)?.max(0) as u64,
            user_agent: row.get(13)?,
            created_at: parse_ts(14, row.get(14)?)?,
            updated_at: parse_ts(15, row.get(15)?)?,
        })
    }

    fn select_sites(&self, where_clause: &str) -> Result<Vec<CrawlSite>, StorageError> {
        let conn = self.conn.lock().expect("site repository lock poisoned");
        let query = format!(
            "SELECT id, name, base_url, backend_startup_id, active, schedule, \
             crawl_interval, last_crawled_at, next_crawl_at, pagination_config, \
             extraction_rules, deduplication_key, request_delay, user_agent, \
             created_at, updated_at FROM crawl_sites {where_clause} ORDER BY name"
        );
        let mut stmt = conn.prepare(&query)?;
        let sites = stmt
            .query_map([], Self::row_to_site)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sites)
    }
}

#[async_trait]
impl SiteRepository for SqliteSiteRepository {
    async fn create(&self, site: &CrawlSite) -> Result<(), StorageError> {
        site.validate()?;
        let pagination = serde_json::to_string(&site.pagination_config)?;
        let extraction = serde_json::to_string(&site.extraction_rules)?;
        let conn = self.conn.lock().expect("site repository lock poisoned");
        conn.execute(
            "INSERT INTO crawl_sites (id, name, base_url, backend_startup_id, active, \
             schedule, crawl_interval, last_crawled_at, next_crawl_at, pagination_config, \
             extraction_rules, deduplication_key, request_delay, user_agent, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                site.id,
                site.name,
                site.base_url,
                site.backend_startup_id,
                site.active as i64,
                site.schedule,
                site.crawl_interval,
                site.last_crawled_at.map(|t| t.to_rfc3339()),
                site.next_crawl_at.map(|t| t.to_rfc3339()),
                pagination,
                extraction,
                site.deduplication_key.as_str(),
                site.request_delay as i64,
                site.user_agent,
                site.created_at.to_rfc3339(),
                site.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn update(&self, site: &CrawlSite) -> Result<(), StorageError> {
        site.validate()?;
        let pagination = serde_json::to_string(&site.pagination_config)?;
        let extraction = serde_json::to_string(&site.extraction_rules)?;
        let conn = self.conn.lock().expect("site repository lock poisoned");
        let changed = conn.execute(
            "UPDATE crawl_sites SET name = ?2, base_url = ?3, backend_startup_id = ?4, \
             active = ?5, schedule = ?6, crawl_interval = ?7, last_crawled_at = ?8, \
             next_crawl_at = ?9, pagination_config = ?10, extraction_rules = ?11, \
             deduplication_key = ?12, request_delay = ?13, user_agent = ?14, updated_at = ?15 \
             WHERE id = ?1",
            params![
                site.id,
                site.name,
                site.base_url,
                site.backend_startup_id,
                site.active as i64,
                site.schedule,
                site.crawl_interval,
                site.last_crawled_at.map(|t| t.to_rfc3339()),
                site.next_crawl_at.map(|t| t.to_rfc3339()),
                pagination,
                extraction,
                site.deduplication_key.as_str(),
                site.request_delay as i64,
                site.user_agent,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("site", &site.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("site repository lock poisoned");
        let changed = conn.execute("DELETE FROM crawl_sites WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StorageError::not_found("site", id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<CrawlSite, StorageError> {
        let conn = self.conn.lock().expect("site repository lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, base_url, backend_startup_id, active, schedule, \
             crawl_interval, last_crawled_at, next_crawl_at, pagination_config, \
             extraction_rules, deduplication_key, request_delay, user_agent, \
             created_at, updated_at FROM crawl_sites WHERE id = ?1",
        )?;
        stmt.query_row(params![id], Self::row_to_site)
            .optional()?
            .ok_or_else(|| StorageError::not_found("site", id))
    }

    async fn find_all(&self) -> Result<Vec<CrawlSite>, StorageError> {
        self.select_sites("")
    }

    async fn find_active(&self) -> Result<Vec<CrawlSite>, StorageError> {
        self.select_sites("WHERE active = 1")
    }

    async fn update_last_crawled(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("site repository lock poisoned");
        let changed = conn.execute(
            "UPDATE crawl_sites SET last_crawled_at = ?2, updated_at = ?2 WHERE id = ?1",
            params![id, at.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("site", id));
        }
        Ok(())
    }
}

// ============================================================================
// SQLite job repository
// ============================================================================

/// SQLite implementation of [`JobRepository`]
pub struct SqliteJobRepository {
    conn: Mutex<Connection>,
}

impl SqliteJobRepository {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = open_connection(path.as_ref())?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        tracing::debug!(path = %path.as_ref().display(), "job repository initialized");
        Ok(repo)
    }

    /// In-memory repository for tests
    pub fn in_memory() -> Result<Self, StorageError> {
        let repo = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawled_jobs (
                id TEXT PRIMARY KEY,
                site_id TEXT NOT NULL,
                external_id TEXT NOT NULL DEFAULT '',
                detail_url TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                requirements TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                job_type TEXT NOT NULL DEFAULT '',
                location_type TEXT NOT NULL DEFAULT '',
                salary_min INTEGER,
                salary_max INTEGER,
                currency TEXT NOT NULL DEFAULT '',
                application_url TEXT,
                application_email TEXT,
                expires_at TEXT,
                raw_html TEXT NOT NULL DEFAULT '',
                deduplication_hash TEXT NOT NULL DEFAULT '',
                synced INTEGER NOT NULL DEFAULT 0,
                synced_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_crawled_jobs_detail_url
                ON crawled_jobs(detail_url);

            CREATE INDEX IF NOT EXISTS idx_crawled_jobs_hash
                ON crawled_jobs(deduplication_hash);

            CREATE INDEX IF NOT EXISTS idx_crawled_jobs_external_id
                ON crawled_jobs(external_id);

            CREATE INDEX IF NOT EXISTS idx_crawled_jobs_synced
                ON crawled_jobs(synced);
            "#,
        )?;
        Ok(())
    }

    fn row_to_job(row: &Row<'_>) -> rusqlite::Result<CrawledJob> {
        Ok(CrawledJob {
            id: row.get(0)?,
            site_id: row.get(1)?,
            external_id: row.get(2)?,
            detail_url: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            requirements: row.get(6)?,
            company: row.get(7)?,
            location: row.get(8)?,
            city: row.get(9)?,
            country: row.get(10)?,
            job_type: row.get(11)?,
            location_type: row.get(12)?,
            salary_min: row.get(13)?,
            salary_max: row.get(14)?,
            currency: row.get(15)?,
            application_url: row.get(16)?,
            application_email: row.get(17)?,
            expires_at: parse_opt_ts(18, row.get(18)?)?,
            raw_html: row.get(19)?,
            deduplication_hash: row.get(20)?,
            synced: row.get::<_, i64>(21)? != 0,
            synced_at: parse_opt_ts(22, row.get(22)?)?,
            created_at: parse_ts(23, row.get(23)?)?,
            updated_at: parse_ts(24, row.get(24)?)?,
        })
    }

    const JOB_COLUMNS: &'static str = "id, site_id, external_id, detail_url, title, \
        description, requirements, company, location, city, country, job_type, \
        location_type, salary_min, salary_max, currency, application_url, \
        application_email, expires_at, raw_html, deduplication_hash, synced, \
        synced_at, created_at, updated_at";

    fn exists(&self, column: &str, value: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        let query = format!("SELECT 1 FROM crawled_jobs WHERE {column} = ?1 LIMIT 1");
        let mut stmt = conn.prepare(&query)?;
        Ok(stmt.query_row(params![value], |_| Ok(())).optional()?.is_some())
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, job: &CrawledJob) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        conn.execute(
            "INSERT INTO crawled_jobs (id, site_id, external_id, detail_url, title, \
             description, requirements, company, location, city, country, job_type, \
             location_type, salary_min, salary_max, currency, application_url, \
             application_email, expires_at, raw_html, deduplication_hash, synced, \
             synced_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
            params![
                job.id,
                job.site_id,
                job.external_id,
                job.detail_url,
                job.title,
                job.description,
                job.requirements,
                job.company,
                job.location,
                job.city,
                job.country,
                job.job_type,
                job.location_type,
                job.salary_min,
                job.salary_max,
                job.currency,
                job.application_url,
                job.application_email,
                job.expires_at.map(|t| t.to_rfc3339()),
                job.raw_html,
                job.deduplication_hash,
                job.synced as i64,
                job.synced_at.map(|t| t.to_rfc3339()),
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn update(&self, job: &CrawledJob) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        let changed = conn.execute(
            "UPDATE crawled_jobs SET site_id = ?2, external_id = ?3, detail_url = ?4, \
             title = ?5, description = ?6, requirements = ?7, company = ?8, location = ?9, \
             city = ?10, country = ?11, job_type = ?12, location_type = ?13, \
             salary_min = ?14, salary_max = ?15, currency = ?16, application_url = ?17, \
             application_email = ?18, expires_at = ?19, raw_html = ?20, \
             deduplication_hash = ?21, synced = ?22, synced_at = ?23, updated_at = ?24 \
             WHERE id = ?1",
            params![
                job.id,
                job.site_id,
                job.external_id,
                job.detail_url,
                job.title,
                job.description,
                job.requirements,
                job.company,
                job.location,
                job.city,
                job.country,
                job.job_type,
                job.location_type,
                job.salary_min,
                job.salary_max,
                job.currency,
                job.application_url,
                job.application_email,
                job.expires_at.map(|t| t.to_rfc3339()),
                job.raw_html,
                job.deduplication_hash,
                job.synced as i64,
                job.synced_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("job", &job.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<CrawledJob, StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        let query = format!(
            "SELECT {} FROM crawled_jobs WHERE id = ?1",
            Self::JOB_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        stmt.query_row(params![id], Self::row_to_job)
            .optional()?
            .ok_or_else(|| StorageError::not_found("job", id))
    }

    async fn find_by_site(&self, site_id: &str) -> Result<Vec<CrawledJob>, StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        let query = format!(
            "SELECT {} FROM crawled_jobs WHERE site_id = ?1 ORDER BY created_at DESC",
            Self::JOB_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        let jobs = stmt
            .query_map(params![site_id], Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    async fn find_unsynced(&self, limit: Option<usize>) -> Result<Vec<CrawledJob>, StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        let mut query = format!(
            "SELECT {} FROM crawled_jobs WHERE synced = 0 ORDER BY created_at ASC",
            Self::JOB_COLUMNS
        );
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = conn.prepare(&query)?;
        let jobs = stmt
            .query_map([], Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool, StorageError> {
        self.exists("detail_url", url)
    }

    async fn exists_by_hash(&self, hash: &str) -> Result<bool, StorageError> {
        self.exists("deduplication_hash", hash)
    }

    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool, StorageError> {
        self.exists("external_id", external_id)
    }

    async fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        let changed = conn.execute(
            "UPDATE crawled_jobs SET synced = 1, synced_at = ?2, updated_at = ?2 WHERE id = ?1",
            params![id, at.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("job", id));
        }
        Ok(())
    }

    async fn count_unsynced(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock().expect("job repository lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM crawled_jobs WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

// ============================================================================
// SQLite crawl log repository
// ============================================================================

/// SQLite implementation of [`CrawlLogRepository`]
pub struct SqliteCrawlLogRepository {
    conn: Mutex<Connection>,
}

impl SqliteCrawlLogRepository {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = open_connection(path.as_ref())?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        tracing::debug!(path = %path.as_ref().display(), "crawl log repository initialized");
        Ok(repo)
    }

    /// In-memory repository for tests
    pub fn in_memory() -> Result<Self, StorageError> {
        let repo = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("crawl log repository lock poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_logs (
                id TEXT PRIMARY KEY,
                site_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                jobs_found INTEGER NOT NULL DEFAULT 0,
                jobs_saved INTEGER NOT NULL DEFAULT 0,
                jobs_skipped INTEGER NOT NULL DEFAULT 0,
                pages_crawled INTEGER NOT NULL DEFAULT 0,
                errors TEXT NOT NULL DEFAULT '[]',
                entries TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_crawl_logs_site
                ON crawl_logs(site_id, started_at);
            "#,
        )?;
        Ok(())
    }

    fn row_to_log(row: &Row<'_>) -> rusqlite::Result<CrawlLog> {
        let status: String = row.get(2)?;
        Ok(CrawlLog {
            id: row.get(0)?,
            site_id: row.get(1)?,
            status: status.parse::<CrawlStatus>().unwrap_or(CrawlStatus::Failed),
            started_at: parse_ts(3, row.get(3)?)?,
            completed_at: parse_opt_ts(4, row.get(4)?)?,
            duration_ms: row.get(5)?,
            jobs_found: row.get::<_, i64>(6)?.max(0) as u64,
            jobs_saved: row.get::<_, i64>(7)?.max(0) as u64,
            jobs_skipped: row.get::<_, i64>(8)?.max(0) as u64,
            pages_crawled: row.get::<_, i64>(9)?.max(0) as u64,
            errors: json_column(10, row.get(10)?)?,
            entries: json_column(11, row.get(11)?)?,
            created_at: parse_ts(12, row.get(12)?)?,
        })
    }

    const LOG_COLUMNS: &'static str = "id, site_id, status, started_at, completed_at, \
        duration_ms, jobs_found, jobs_saved, jobs_skipped, pages_crawled, errors, \
        entries, created_at";
}

#[async_trait]
impl CrawlLogRepository for SqliteCrawlLogRepository {
    async fn create(&self, log: &CrawlLog) -> Result<(), StorageError> {
        let errors = serde_json::to_string(&log.errors)?;
        let entries = serde_json::to_string(&log.entries)?;
        let conn = self.conn.lock().expect("crawl log repository lock poisoned");
        conn.execute(
            "INSERT INTO crawl_logs (id, site_id, status, started_at, completed_at, \
             duration_ms, jobs_found, jobs_saved, jobs_skipped, pages_crawled, errors, \
             entries, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                log.id,
                log.site_id,
                log.status.as_str(),
                log.started_at.to_rfc3339(),
                log.completed_at.map(|t| t.to_rfc3339()),
                log.duration_ms,
                log.jobs_found as i64,
                log.jobs_saved as i64,
                log.jobs_skipped as i64,
                log.pages_crawled as i64,
                errors,
                entries,
                log.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn update(&self, log: &CrawlLog) -> Result<(), StorageError> {
        let errors = serde_json::to_string(&log.errors)?;
        let entries = serde_json::to_string(&log.entries)?;
        let conn = self.conn.lock().expect("crawl log repository lock poisoned");
        let changed = conn.execute(
            "UPDATE crawl_logs SET status = ?2, completed_at = ?3, duration_ms = ?4, \
             jobs_found = ?5, jobs_saved = ?6, jobs_skipped = ?7, pages_crawled = ?8, \
             errors = ?9, entries = ?10 WHERE id = ?1",
            params![
                log.id,
                log.status.as_str(),
                log.completed_at.map(|t| t.to_rfc3339()),
                log.duration_ms,
                log.jobs_found as i64,
                log.jobs_saved as i64,
                log.jobs_skipped as i64,
                log.pages_crawled as i64,
                errors,
                entries,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("crawl log", &log.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<CrawlLog, StorageError> {
        let conn = self.conn.lock().expect("crawl log repository lock poisoned");
        let query = format!("SELECT {} FROM crawl_logs WHERE id = ?1", Self::LOG_COLUMNS);
        let mut stmt = conn.prepare(&query)?;
        stmt.query_row(params![id], Self::row_to_log)
            .optional()?
            .ok_or_else(|| StorageError::not_found("crawl log", id))
    }

    async fn find_by_site(&self, site_id: &str) -> Result<Vec<CrawlLog>, StorageError> {
        let conn = self.conn.lock().expect("crawl log repository lock poisoned");
        let query = format!(
            "SELECT {} FROM crawl_logs WHERE site_id = ?1 ORDER BY started_at DESC",
            Self::LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        let logs = stmt
            .query_map(params![site_id], Self::row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    async fn find_latest_by_site(&self, site_id: &str) -> Result<Option<CrawlLog>, StorageError> {
        let conn = self.conn.lock().expect("crawl log repository lock poisoned");
        let query = format!(
            "SELECT {} FROM crawl_logs WHERE site_id = ?1 ORDER BY started_at DESC LIMIT 1",
            Self::LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        Ok(stmt
            .query_row(params![site_id], Self::row_to_log)
            .optional()?)
    }
}
