//! Configuration management for the jobharvest crawler
//!
//! Process-level settings come from environment variables; everything
//! site-specific lives in the site table.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database path
    pub db_path: PathBuf,

    /// Base URL of the downstream job board API
    pub backend_url: String,

    /// Bearer token for the downstream API
    pub api_token: String,

    /// Seconds between periodic sync passes
    pub sync_interval_secs: u64,

    /// Timeout in seconds for page fetches and sync POSTs
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let db_path = std::env::var("JOBHARVEST_DB_PATH")
            .unwrap_or_else(|_| String::from("data/jobharvest.db"))
            .into();

        let backend_url = std::env::var("JOBHARVEST_BACKEND_URL")
            .unwrap_or_else(|_| String::from("http://localhost:8080"));

        let api_token = std::env::var("JOBHARVEST_API_TOKEN").unwrap_or_default();

        let sync_interval_secs = std::env::var("JOBHARVEST_SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        let http_timeout_secs = std::env::var("JOBHARVEST_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            db_path,
            backend_url,
            api_token,
            sync_interval_secs,
            http_timeout_secs,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Fails on an empty backend URL or zero timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() {
            bail!("backend URL cannot be empty");
        }
        if self.http_timeout_secs == 0 {
            bail!("HTTP timeout must be positive");
        }
        if self.sync_interval_secs == 0 {
            bail!("sync interval must be positive");
        }
        Ok(())
    }

    /// HTTP client timeout as a duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Periodic sync interval as a duration
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config {
            db_path: "data/test.db".into(),
            backend_url: "http://localhost:8080".to_string(),
            api_token: String::new(),
            sync_interval_secs: 300,
            http_timeout_secs: 30,
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = Config {
            db_path: "data/test.db".into(),
            backend_url: "http://localhost:8080".to_string(),
            api_token: String::new(),
            sync_interval_secs: 300,
            http_timeout_secs: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_backend_url_rejected() {
        let config = Config {
            db_path: "data/test.db".into(),
            backend_url: "  ".to_string(),
            api_token: String::new(),
            sync_interval_secs: 300,
            http_timeout_secs: 30,
        };
        assert!(config.validate().is_err());
    }
}
