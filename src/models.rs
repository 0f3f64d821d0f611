//! Core data structures for the jobharvest crawler
//!
//! Sites, their pagination/extraction configuration, harvested job records,
//! and crawl-run logs. Pagination and extraction configuration are stored as
//! JSON documents, so everything here round-trips through serde.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::DedupStrategy;
use crate::error::ValidationError;

/// Default user agent presented to crawled sites
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; JobCrawler/1.0)";

// ============================================================================
// Crawl Site
// ============================================================================

/// A configured crawl target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSite {
    pub id: String,
    pub name: String,
    pub base_url: String,
    /// Identifier of the owning startup on the downstream job board
    pub backend_startup_id: String,
    pub active: bool,
    /// Cron expression (six fields, seconds first)
    pub schedule: String,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub next_crawl_at: Option<DateTime<Utc>>,
    /// Informational classifier: "daily", "weekly", "custom"
    #[serde(default)]
    pub crawl_interval: String,
    pub pagination_config: PaginationConfig,
    pub extraction_rules: ExtractionRules,
    #[serde(default)]
    pub deduplication_key: DedupStrategy,
    /// Politeness delay in seconds between page fetches
    #[serde(default)]
    pub request_delay: u64,
    #[serde(default)]
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrawlSite {
    /// Validate the site configuration
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when name, base URL, or schedule is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingBaseUrl);
        }
        if self.schedule.trim().is_empty() {
            return Err(ValidationError::MissingSchedule);
        }
        Ok(())
    }

    /// User agent to present, falling back to the crawler default
    pub fn effective_user_agent(&self) -> &str {
        if self.user_agent.is_empty() {
            DEFAULT_USER_AGENT
        } else {
            &self.user_agent
        }
    }
}

// ============================================================================
// Pagination Configuration
// ============================================================================

const DEFAULT_PARAM_NAME: &str = "page";
const DEFAULT_START_PAGE: i64 = 1;
const DEFAULT_INCREMENT: i64 = 1;
const DEFAULT_MAX_PAGES: usize = 100;

/// Pagination strategy for a site
///
/// One variant per page-enumeration mechanism. Stored configurations use a
/// `type` discriminator plus optional fields; deserialization applies the
/// documented defaults up front, so every variant carries only concrete
/// values. An unknown or missing type degrades to [`Self::SinglePage`]
/// rather than failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPaginationConfig", into = "RawPaginationConfig")]
pub enum PaginationConfig {
    /// Crawl only the base URL
    SinglePage,

    /// Set a page-number query parameter on the base URL
    QueryParam {
        param_name: String,
        start_page: i64,
        increment: i64,
        max_pages: usize,
    },

    /// Substitute the page number into a path pattern with a `{page}` placeholder
    UrlPattern {
        pattern: String,
        start_page: i64,
        increment: i64,
        max_pages: usize,
    },

    /// Follow a "next" link discovered in each fetched page
    LinkFollow { next_page_selector: String },

    /// Enumerate pages of a JSON API endpoint
    Api {
        endpoint: String,
        page_param: String,
        page_size: Option<u32>,
        start_page: i64,
        increment: i64,
        max_pages: usize,
    },
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self::SinglePage
    }
}

/// Stored JSON shape of [`PaginationConfig`]: a type string plus a grab-bag
/// of optional fields, kept for lossless round-tripping of persisted
/// configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawPaginationConfig {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    param_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    increment: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_config: Option<RawApiConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawApiConfig {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    page_param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_size: Option<u32>,
    #[serde(default)]
    max_pages: Option<usize>,
}

fn non_zero_or(value: Option<i64>, default: i64) -> i64 {
    match value {
        Some(v) if v != 0 => v,
        _ => default,
    }
}

impl From<RawPaginationConfig> for PaginationConfig {
    fn from(raw: RawPaginationConfig) -> Self {
        let start_page = non_zero_or(raw.start_page, DEFAULT_START_PAGE);
        let increment = non_zero_or(raw.increment, DEFAULT_INCREMENT);
        let max_pages = match raw.max_pages {
            Some(v) if v != 0 => v,
            _ => DEFAULT_MAX_PAGES,
        };

        match raw.kind.as_str() {
            "query_param" => Self::QueryParam {
                param_name: raw
                    .param_name
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| DEFAULT_PARAM_NAME.to_string()),
                start_page,
                increment,
                max_pages,
            },
            "url_pattern" => Self::UrlPattern {
                pattern: raw.url_pattern.unwrap_or_default(),
                start_page,
                increment,
                max_pages,
            },
            "link_follow" => Self::LinkFollow {
                next_page_selector: raw.next_page_selector.unwrap_or_default(),
            },
            "api_pagination" => match raw.api_config {
                Some(api) => Self::Api {
                    endpoint: api.endpoint,
                    page_param: api.page_param,
                    page_size: api.page_size,
                    start_page,
                    increment,
                    max_pages: match api.max_pages {
                        Some(v) if v != 0 => v,
                        _ => DEFAULT_MAX_PAGES,
                    },
                },
                // api_pagination without an api_config cannot enumerate
                // anything; degrade like an unknown type
                None => Self::SinglePage,
            },
            _ => Self::SinglePage,
        }
    }
}

impl From<PaginationConfig> for RawPaginationConfig {
    fn from(config: PaginationConfig) -> Self {
        match config {
            PaginationConfig::SinglePage => RawPaginationConfig::default(),
            PaginationConfig::QueryParam {
                param_name,
                start_page,
                increment,
                max_pages,
            } => RawPaginationConfig {
                kind: "query_param".to_string(),
                param_name: Some(param_name),
                start_page: Some(start_page),
                increment: Some(increment),
                max_pages: Some(max_pages),
                ..Default::default()
            },
            PaginationConfig::UrlPattern {
                pattern,
                start_page,
                increment,
                max_pages,
            } => RawPaginationConfig {
                kind: "url_pattern".to_string(),
                url_pattern: Some(pattern),
                start_page: Some(start_page),
                increment: Some(increment),
                max_pages: Some(max_pages),
                ..Default::default()
            },
            PaginationConfig::LinkFollow { next_page_selector } => RawPaginationConfig {
                kind: "link_follow".to_string(),
                next_page_selector: Some(next_page_selector),
                ..Default::default()
            },
            PaginationConfig::Api {
                endpoint,
                page_param,
                page_size,
                start_page,
                increment,
                max_pages,
            } => RawPaginationConfig {
                kind: "api_pagination".to_string(),
                start_page: Some(start_page),
                increment: Some(increment),
                api_config: Some(RawApiConfig {
                    endpoint,
                    page_param,
                    page_size,
                    max_pages: Some(max_pages),
                }),
                ..Default::default()
            },
        }
    }
}

// ============================================================================
// Extraction Rules
// ============================================================================

/// Declarative field-extraction configuration for a site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionRules {
    /// Selector matching the repeating job-listing container
    pub job_list_selector: String,

    /// How to derive the absolute detail URL for each listing
    pub job_detail_url: JobUrlRule,

    /// Logical field name -> extraction rule; unknown names are ignored
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRule>,
}

/// How the detail-page URL is derived from a listing container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UrlRuleKind {
    /// Attribute value resolved against the page or explicit base URL
    Relative,
    /// Attribute value used as-is
    Absolute,
    /// Named attribute value used as-is
    Attribute,
    /// Unspecified: read `href` directly
    #[default]
    Href,
}

impl UrlRuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::Attribute => "attribute",
            Self::Href => "",
        }
    }
}

impl From<String> for UrlRuleKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "relative" => Self::Relative,
            "absolute" => Self::Absolute,
            "attribute" => Self::Attribute,
            _ => Self::Href,
        }
    }
}

impl From<UrlRuleKind> for String {
    fn from(kind: UrlRuleKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Rule for extracting the job detail URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUrlRule {
    #[serde(rename = "type", default)]
    pub kind: UrlRuleKind,
    pub selector: String,
    #[serde(default)]
    pub attribute: String,
    /// Explicit base for relative URLs; falls back to the page URL
    #[serde(default)]
    pub base_url: String,
}

/// Extraction type for a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    /// Trimmed element text
    #[default]
    Text,
    /// Serialized inner markup
    Html,
    /// Named attribute value
    Attribute,
    /// First capture group of a pattern applied to the element text
    Regex,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
            Self::Attribute => "attribute",
            Self::Regex => "regex",
        }
    }
}

impl From<String> for FieldKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "html" => Self::Html,
            "attribute" => Self::Attribute,
            "regex" => Self::Regex,
            _ => Self::Text,
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Rule for extracting one logical field from a listing container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldRule {
    pub selector: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub attribute: String,
    #[serde(default)]
    pub regex_pattern: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: String,
    /// Ordered string transformations: trim, lowercase, uppercase,
    /// strip_html, remove_commas. Unknown names are ignored.
    #[serde(default)]
    pub transformations: Vec<String>,
}

// ============================================================================
// Crawled Job
// ============================================================================

/// One harvested job listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawledJob {
    pub id: String,
    pub site_id: String,
    #[serde(default)]
    pub external_id: String,
    pub detail_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub job_type: String,
    #[serde(default)]
    pub location_type: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    #[serde(default)]
    pub currency: String,
    pub application_url: Option<String>,
    pub application_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Raw inner HTML of the listing container, kept for diagnostics
    #[serde(default)]
    pub raw_html: String,
    #[serde(default)]
    pub deduplication_hash: String,
    #[serde(default)]
    pub synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Crawl Log
// ============================================================================

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Running,
    Completed,
    Failed,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::str::FromStr for CrawlStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            _ => Self::Failed,
        })
    }
}

/// Severity of a crawl log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One timestamped line within a crawl log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Append-only record of one crawl run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlLog {
    pub id: String,
    pub site_id: String,
    pub status: CrawlStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub jobs_found: u64,
    pub jobs_saved: u64,
    pub jobs_skipped: u64,
    pub pages_crawled: u64,
    pub errors: Vec<String>,
    pub entries: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
}

impl CrawlLog {
    /// Start a new log in the `running` state
    pub fn start(site_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            site_id: site_id.into(),
            status: CrawlStatus::Running,
            started_at: now,
            completed_at: None,
            duration_ms: 0,
            jobs_found: 0,
            jobs_saved: 0,
            jobs_skipped: 0,
            pages_crawled: 0,
            errors: Vec::new(),
            entries: Vec::new(),
            created_at: now,
        }
    }

    /// Append a leveled log entry
    pub fn add_entry(&mut self, level: LogLevel, message: impl Into<String>) {
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
    }

    /// Record an error string and mirror it as an error-level entry
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.errors.push(message.clone());
        self.add_entry(LogLevel::Error, message);
    }

    /// Finalize the run as completed
    pub fn complete(&mut self) {
        self.finalize(CrawlStatus::Completed);
    }

    /// Finalize the run as failed, recording the terminal error
    pub fn fail(&mut self, error: impl Into<String>) {
        self.add_error(error);
        self.finalize(CrawlStatus::Failed);
    }

    fn finalize(&mut self, status: CrawlStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> CrawlSite {
        let now = Utc::now();
        CrawlSite {
            id: "site-1".to_string(),
            name: "Example Jobs".to_string(),
            base_url: "https://jobs.example.com".to_string(),
            backend_startup_id: "startup-1".to_string(),
            active: true,
            schedule: "0 0 6 * * *".to_string(),
            last_crawled_at: None,
            next_crawl_at: None,
            crawl_interval: "daily".to_string(),
            pagination_config: PaginationConfig::default(),
            extraction_rules: ExtractionRules::default(),
            deduplication_key: DedupStrategy::default(),
            request_delay: 0,
            user_agent: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn validate_rejects_empty_name() {
        let mut s = site();
        s.name = "  ".to_string();
        assert_eq!(s.validate(), Err(ValidationError::MissingName));
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut s = site();
        s.base_url = String::new();
        assert_eq!(s.validate(), Err(ValidationError::MissingBaseUrl));
    }

    #[test]
    fn validate_rejects_empty_schedule() {
        let mut s = site();
        s.schedule = String::new();
        assert_eq!(s.validate(), Err(ValidationError::MissingSchedule));
    }

    #[test]
    fn user_agent_falls_back_to_default() {
        let mut s = site();
        assert_eq!(s.effective_user_agent(), DEFAULT_USER_AGENT);
        s.user_agent = "custom/1.0".to_string();
        assert_eq!(s.effective_user_agent(), "custom/1.0");
    }

    #[test]
    fn pagination_defaults_applied_on_parse() {
        let config: PaginationConfig =
            serde_json::from_str(r#"{"type": "query_param"}"#).unwrap();
        assert_eq!(
            config,
            PaginationConfig::QueryParam {
                param_name: "page".to_string(),
                start_page: 1,
                increment: 1,
                max_pages: 100,
            }
        );
    }

    #[test]
    fn pagination_unknown_type_degrades_to_single_page() {
        let config: PaginationConfig =
            serde_json::from_str(r#"{"type": "infinite_scroll"}"#).unwrap();
        assert_eq!(config, PaginationConfig::SinglePage);

        let config: PaginationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PaginationConfig::SinglePage);
    }

    #[test]
    fn pagination_round_trips_through_json() {
        let config = PaginationConfig::UrlPattern {
            pattern: "jobs/page/{page}".to_string(),
            start_page: 2,
            increment: 2,
            max_pages: 10,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PaginationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let config = PaginationConfig::Api {
            endpoint: "https://api.example.com/jobs".to_string(),
            page_param: "p".to_string(),
            page_size: Some(25),
            start_page: 1,
            increment: 1,
            max_pages: 5,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PaginationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn api_pagination_without_config_degrades() {
        let config: PaginationConfig =
            serde_json::from_str(r#"{"type": "api_pagination"}"#).unwrap();
        assert_eq!(config, PaginationConfig::SinglePage);
    }

    #[test]
    fn extraction_rules_round_trip() {
        let json = r#"{
            "job_list_selector": "div.job-card",
            "job_detail_url": {
                "type": "relative",
                "selector": "a.job-link",
                "attribute": "href"
            },
            "fields": {
                "title": {"selector": "h2", "type": "text", "required": true},
                "salary_min": {
                    "selector": ".salary",
                    "type": "regex",
                    "regex_pattern": "from (\\d+)",
                    "transformations": ["remove_commas"]
                }
            }
        }"#;
        let rules: ExtractionRules = serde_json::from_str(json).unwrap();
        assert_eq!(rules.job_detail_url.kind, UrlRuleKind::Relative);
        assert_eq!(rules.fields["title"].kind, FieldKind::Text);
        assert!(rules.fields["title"].required);

        let round = serde_json::to_string(&rules).unwrap();
        let reparsed: ExtractionRules = serde_json::from_str(&round).unwrap();
        assert_eq!(reparsed.fields.len(), 2);
        assert_eq!(reparsed.fields["salary_min"].kind, FieldKind::Regex);
    }

    #[test]
    fn crawl_log_complete_sets_terminal_state() {
        let mut log = CrawlLog::start("site-1");
        assert_eq!(log.status, CrawlStatus::Running);
        assert!(log.completed_at.is_none());

        log.complete();
        assert_eq!(log.status, CrawlStatus::Completed);
        assert!(log.completed_at.is_some());
        assert!(log.duration_ms >= 0);
        assert!(log.status.is_terminal());
    }

    #[test]
    fn crawl_log_fail_records_error() {
        let mut log = CrawlLog::start("site-1");
        log.fail("pagination exploded");

        assert_eq!(log.status, CrawlStatus::Failed);
        assert!(log.completed_at.is_some());
        assert_eq!(log.errors, vec!["pagination exploded".to_string()]);
        assert!(log
            .entries
            .iter()
            .any(|e| e.level == LogLevel::Error && e.message == "pagination exploded"));
    }
}
